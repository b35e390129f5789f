//! Command engine: executes one parsed payload against the node.
//!
//! Shapes are tried in a fixed priority order (set, get, ping,
//! temperature) and the first match wins.  At most one reply is produced
//! per payload, always through the bounded-retry path of the [`Bus`].
//! Every reply, successful or not, extends the holdoff so the periodic
//! scheduler stays off the line while the requester listens.
//!
//! | Command | Reply | Budget | Holdoff |
//! |---|---|---|---|
//! | `SET_CFG` param 1 | none | | 1000 ms |
//! | `SET_CFG` bad param/value | none | | 200 ms |
//! | `gCONFIG` param 1 | `rCONFIG` | 250 ms | 500 ms |
//! | `gCONFIG` unknown param | none | | 200 ms |
//! | ping | response template | 200 ms | 1000 ms |
//! | `TMP.gSTATUS` mapped | `STATUS` | 250 ms | 1000 ms |

use log::{debug, info, warn};

use super::command::{self, Command};
use super::telegram::{self, WireTemperature};
use crate::app::events::AppEvent;
use crate::app::ports::{Clock, NodePorts, SerialPort};
use crate::bus::Bus;
use crate::config::NodeConfig;
use crate::error::BusError;
use crate::timing::Holdoff;

/// System instance this node answers on.
pub const SYS_INSTANCE: u32 = 1;

/// `SET_CFG` / `gCONFIG` parameter: network interface enabled.
pub const PARAM_NETWORK: u32 = 1;

pub const SET_HOLDOFF_MS: u64 = 1000;
pub const REJECT_HOLDOFF_MS: u64 = 200;
pub const GET_HOLDOFF_MS: u64 = 500;
pub const PING_HOLDOFF_MS: u64 = 1000;
pub const TEMPERATURE_HOLDOFF_MS: u64 = 1000;

pub const GET_BUDGET_MS: u64 = 250;
pub const PING_BUDGET_MS: u64 = 200;
pub const TEMPERATURE_BUDGET_MS: u64 = 250;

/// What happened to one payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not valid UTF-8.
    Dropped,
    /// Matched no command shape.
    Unrecognized,
    /// Addressed to another node or system instance.
    NotForUs,
    /// Recognised, but the parameter or value is not supported.
    Rejected,
    /// A configuration change was accepted (no reply by protocol).
    Applied,
    /// A reply reached the wire.
    Replied { attempts: u32 },
    /// The reply budget ran out.
    ReplyAbandoned(BusError),
    /// No probe is mapped to the requested instance.
    Unmapped,
}

/// Dispatcher state: only the holdoff deadline outlives a call.
#[derive(Debug, Default)]
pub struct CommandEngine {
    holdoff: Holdoff,
}

impl CommandEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deadline the scheduler must respect.
    pub fn holdoff(&self) -> &Holdoff {
        &self.holdoff
    }

    /// Parse and execute one payload.
    pub fn dispatch<S: SerialPort, C: Clock>(
        &mut self,
        payload: &[u8],
        bus: &mut Bus<S, C>,
        config: &mut NodeConfig,
        ports: &mut NodePorts<'_>,
    ) -> Outcome {
        if core::str::from_utf8(payload).is_err() {
            bus.stats_mut().non_utf8_drops += 1;
            debug!("RX: non-UTF-8 payload ({} bytes) dropped", payload.len());
            return Outcome::Dropped;
        }

        let Some(cmd) = command::parse(payload, &config.ping_request_template, config.device_id)
        else {
            bus.stats_mut().unrecognized += 1;
            debug!("RX: unrecognised payload {:?}", String::from_utf8_lossy(payload));
            return Outcome::Unrecognized;
        };

        let own = u32::from(config.device_id);
        let addressed = match &cmd {
            Command::SysSetConfig {
                device_id,
                sys_instance,
                ..
            }
            | Command::SysGetConfig {
                device_id,
                sys_instance,
                ..
            } => *device_id == own && *sys_instance == SYS_INSTANCE,
            Command::TemperatureQuery { device_id, .. } => *device_id == own,
            Command::PingRequest => true,
        };
        if !addressed {
            bus.stats_mut().not_for_us += 1;
            return Outcome::NotForUs;
        }

        ports.sink.emit(&AppEvent::CommandReceived(cmd.kind()));

        match cmd {
            Command::SysSetConfig { param, value, .. } => {
                self.set_config(param, &value, bus.now_us(), config, ports)
            }
            Command::SysGetConfig {
                sys_instance,
                param,
                ..
            } => self.get_config(sys_instance, param, bus, config, ports),
            Command::PingRequest => self.ping(bus, config, ports),
            Command::TemperatureQuery { instance, .. } => {
                self.temperature(instance, bus, config, ports)
            }
        }
    }

    // ── SET_CFG ───────────────────────────────────────────────

    fn set_config(
        &mut self,
        param: u32,
        value: &str,
        now_us: u64,
        config: &mut NodeConfig,
        ports: &mut NodePorts<'_>,
    ) -> Outcome {
        if param != PARAM_NETWORK {
            return self.reject(now_us, "unknown SET_CFG parameter", ports);
        }
        let enabled = match value {
            "0" => false,
            "1" => true,
            _ => return self.reject(now_us, "network value must be 0 or 1", ports),
        };

        ports.network.request_enabled(enabled, now_us / crate::timing::US_PER_MS);
        config.network_enabled = enabled;
        if let Err(e) = ports.store.save(config) {
            warn!("CFG: could not persist network state: {}", e);
        }
        self.holdoff.extend(now_us, SET_HOLDOFF_MS);
        info!("CFG: network interface requested {}", if enabled { "on" } else { "off" });
        ports.sink.emit(&AppEvent::NetworkRequested(enabled));
        Outcome::Applied
    }

    fn reject(&mut self, now_us: u64, reason: &'static str, ports: &mut NodePorts<'_>) -> Outcome {
        self.holdoff.extend(now_us, REJECT_HOLDOFF_MS);
        info!("CFG: {}", reason);
        ports.sink.emit(&AppEvent::ConfigRejected(reason));
        Outcome::Rejected
    }

    // ── gCONFIG ───────────────────────────────────────────────

    fn get_config<S: SerialPort, C: Clock>(
        &mut self,
        sys_instance: u32,
        param: u32,
        bus: &mut Bus<S, C>,
        config: &NodeConfig,
        ports: &mut NodePorts<'_>,
    ) -> Outcome {
        if param != PARAM_NETWORK {
            return self.reject(bus.now_us(), "unknown gCONFIG parameter", ports);
        }
        let actual = u8::from(ports.network.is_enabled());
        let text = telegram::config_reply(config.device_id, sys_instance, param, actual);
        self.reply("rCONFIG", &text, GET_BUDGET_MS, GET_HOLDOFF_MS, bus, ports)
    }

    // ── Ping ──────────────────────────────────────────────────

    fn ping<S: SerialPort, C: Clock>(
        &mut self,
        bus: &mut Bus<S, C>,
        config: &NodeConfig,
        ports: &mut NodePorts<'_>,
    ) -> Outcome {
        let Some(text) = telegram::render_template(&config.ping_response_template, config.device_id)
        else {
            warn!("TX: ping response template does not fit one frame");
            return Outcome::Rejected;
        };
        self.reply("rSTATUS", &text, PING_BUDGET_MS, PING_HOLDOFF_MS, bus, ports)
    }

    // ── TMP.gSTATUS ───────────────────────────────────────────

    fn temperature<S: SerialPort, C: Clock>(
        &mut self,
        instance: u32,
        bus: &mut Bus<S, C>,
        config: &NodeConfig,
        ports: &mut NodePorts<'_>,
    ) -> Outcome {
        let Some(instance) = u8::try_from(instance).ok().filter(|&i| i != 0) else {
            debug!("RX: instance {} out of range", instance);
            return Outcome::NotForUs;
        };

        ports.sensors.refresh_all();
        let store = ports.store;
        let found = ports
            .sensors
            .readings()
            .iter()
            .find(|r| store.instance_for(&r.id) == instance)
            .map(|r| r.celsius);

        let Some(celsius) = found else {
            info!("RX: no probe mapped to instance {}, not answering", instance);
            ports.sink.emit(&AppEvent::InstanceUnmapped(instance));
            return Outcome::Unmapped;
        };

        let wire = WireTemperature::from_celsius(celsius);
        let text = telegram::temperature_status(config.device_id, instance, wire);
        self.reply(
            "STATUS",
            &text,
            TEMPERATURE_BUDGET_MS,
            TEMPERATURE_HOLDOFF_MS,
            bus,
            ports,
        )
    }

    // ── Reply path ────────────────────────────────────────────

    fn reply<S: SerialPort, C: Clock>(
        &mut self,
        kind: &'static str,
        text: &str,
        budget_ms: u64,
        holdoff_ms: u64,
        bus: &mut Bus<S, C>,
        ports: &mut NodePorts<'_>,
    ) -> Outcome {
        let result = bus.send_with_retry(text.as_bytes(), budget_ms);
        self.holdoff.extend(bus.now_us(), holdoff_ms);
        match result {
            Ok(attempts) => {
                bus.stats_mut().replies_sent += 1;
                info!("TX[{}]: {} ({} attempt(s))", kind, text, attempts);
                ports.sink.emit(&AppEvent::ReplySent { kind, attempts });
                Outcome::Replied { attempts }
            }
            Err(error) => {
                bus.stats_mut().replies_abandoned += 1;
                warn!("TX[{}]: abandoned after {}ms: {}", kind, budget_ms, error);
                ports.sink.emit(&AppEvent::ReplyAbandoned { kind, error });
                Outcome::ReplyAbandoned(error)
            }
        }
    }
}
