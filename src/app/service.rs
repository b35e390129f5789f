//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the configuration, the bus, the command engine and
//! the temperature scheduler.  The main loop calls [`NodeService::tick`]
//! repeatedly; every collaborator is injected per call through
//! [`NodePorts`], so the whole service runs against mocks on the host.
//!
//! ```text
//!  SerialPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │         NodeService          │
//!  SensorPort ──▶ │  Bus · Engine · Scheduler    │ ◀─▶ SettingsStore
//!                 └──────────────────────────────┘ ──▶ NetworkPort
//! ```
//!
//! Order inside one tick:
//! 1. drain the receiver and dispatch the payloads queued so far,
//! 2. advance the network interface and the sensor conversion,
//! 3. tick the scheduler, which therefore sees any holdoff set in step 1.

use log::{debug, info, warn};

use crate::bus::Bus;
use crate::config::NodeConfig;
use crate::diagnostics::BusStats;
use crate::error::Result;
use crate::protocol::engine::CommandEngine;
use crate::scheduler::{SchedulerState, TemperatureScheduler};
use crate::sensors::SensorId;

use super::events::AppEvent;
use super::ports::{Clock, ConfigError, ConfigPort, NodePorts, SerialPort, SettingsStore};

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService<S: SerialPort, C: Clock> {
    config: NodeConfig,
    bus: Bus<S, C>,
    engine: CommandEngine,
    scheduler: TemperatureScheduler,
    tick_count: u64,
}

impl<S: SerialPort, C: Clock> NodeService<S, C> {
    /// `seed` feeds the backoff jitter.
    pub fn new(config: NodeConfig, serial: S, clock: C, seed: u64) -> Self {
        let bus = Bus::new(serial, clock, &config.serial, seed);
        Self {
            config,
            bus,
            engine: CommandEngine::new(),
            scheduler: TemperatureScheduler::new(),
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Announce the node and bring the network interface to its stored
    /// desired state.
    pub fn start(&mut self, ports: &mut NodePorts<'_>) {
        info!(
            "NodeService started: device {} at {} baud, guard {}us",
            self.config.device_id,
            self.config.serial.baud_rate,
            self.bus.guard_us()
        );
        ports.sink.emit(&AppEvent::Started {
            device_id: self.config.device_id,
            baud_rate: self.config.serial.baud_rate,
        });
        ports
            .network
            .request_enabled(self.config.network_enabled, self.bus.now_ms());
    }

    // ── Per-tick orchestration ────────────────────────────────

    pub fn tick(&mut self, ports: &mut NodePorts<'_>) {
        self.tick_count += 1;

        // 1. Receive and dispatch.  Frames completing while a reply waits
        //    for the line stay queued for the next tick.
        self.bus.poll_rx();
        let queued = self.bus.pending_payloads();
        for _ in 0..queued {
            let Some(payload) = self.bus.take_payload() else {
                break;
            };
            let outcome = self
                .engine
                .dispatch(&payload, &mut self.bus, &mut self.config, ports);
            debug!("RX: {} bytes -> {:?}", payload.len(), outcome);
        }

        // 2. Collaborator progress
        let now_ms = self.bus.now_ms();
        ports.network.poll(now_ms);
        ports.sensors.poll(now_ms);

        // 3. Periodic telegrams
        self.scheduler
            .tick(&mut self.bus, &self.config, self.engine.holdoff(), ports);
    }

    // ── Configuration ─────────────────────────────────────────

    /// Validate, persist, and apply a new configuration.
    ///
    /// Line settings only take effect after a restart.
    pub fn update_config(&mut self, config: NodeConfig, store: &dyn ConfigPort) -> Result<()> {
        config.validate()?;
        store.save(&config)?;
        if config.serial != self.config.serial {
            warn!("CFG: serial settings change applies after restart");
        }
        info!("CFG: configuration updated (device {})", config.device_id);
        self.config = config;
        Ok(())
    }

    /// Map a probe to a bus instance.
    pub fn set_instance(
        &self,
        store: &dyn SettingsStore,
        sensor: &SensorId,
        instance: u8,
    ) -> Result<()> {
        store.set_instance(sensor, instance)?;
        info!("CFG: {} -> instance {}", sensor, instance);
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Bus<S, C> {
        &self.bus
    }

    pub fn stats(&self) -> &BusStats {
        self.bus.stats()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    /// Holdoff deadline (µs).
    pub fn holdoff_until_us(&self) -> u64 {
        self.engine.holdoff().until()
    }

    /// Main-loop ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

/// Stored configuration, or defaults on first boot or a corrupt blob.
pub fn load_config(store: &dyn ConfigPort) -> NodeConfig {
    match store.load() {
        Ok(cfg) => cfg,
        Err(ConfigError::NotFound) => {
            info!("CFG: no stored configuration, using defaults");
            NodeConfig::default()
        }
        Err(e) => {
            warn!("CFG: stored configuration unusable ({}), using defaults", e);
            NodeConfig::default()
        }
    }
}
