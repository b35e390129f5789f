//! Simulated line, clock and storage for integration tests.
//!
//! The clock and the serial line share one time base: bytes scripted on
//! the line become readable only once the clock has reached their
//! timestamp, and every busy-wait inside the bus advances that clock.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use busnode::app::events::AppEvent;
use busnode::app::ports::{
    Clock, ConfigError, ConfigPort, EventSink, MappingPort, NetworkPort, NodePorts, SerialPort,
};
use busnode::app::service::NodeService;
use busnode::config::{DEFAULT_INSTANCE, InstanceMap, NodeConfig};
use busnode::protocol::codec::{FrameDecoder, encode_frame};
use busnode::sensors::{SensorId, SimSensors};

// ── SimClock ──────────────────────────────────────────────────

/// Shared manual clock.  Clones observe the same time.
#[derive(Clone)]
pub struct SimClock(Rc<Cell<u64>>);

#[allow(dead_code)]
impl SimClock {
    pub fn starting_at_ms(ms: u64) -> Self {
        Self(Rc::new(Cell::new(ms * 1000)))
    }

    pub fn advance_ms(&self, ms: u64) {
        self.0.set(self.0.get() + ms * 1000);
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }
}

impl embedded_hal::delay::DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.0.set(self.0.get() + u64::from(ns).div_ceil(1000));
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.0.get()
    }
}

// ── SimSerial ─────────────────────────────────────────────────

#[derive(Default)]
struct Line {
    rx: VecDeque<(u64, u8)>,
    tx: Vec<u8>,
}

/// Half-duplex line with time-stamped inbound traffic.
///
/// Writes are captured, not echoed back.
#[derive(Clone)]
pub struct SimSerial {
    clock: SimClock,
    line: Rc<RefCell<Line>>,
}

#[allow(dead_code)]
impl SimSerial {
    pub fn new(clock: &SimClock) -> Self {
        Self {
            clock: clock.clone(),
            line: Rc::new(RefCell::new(Line::default())),
        }
    }

    /// Frame `payload` and make it readable immediately.
    pub fn receive(&self, payload: &str) {
        let frame = encode_frame(payload.as_bytes()).expect("test payload fits");
        self.receive_bytes_at(self.clock.now(), &frame);
    }

    /// Schedule raw `bytes` to arrive at `at_us`.
    pub fn receive_bytes_at(&self, at_us: u64, bytes: &[u8]) {
        let mut line = self.line.borrow_mut();
        line.rx.extend(bytes.iter().map(|&b| (at_us, b)));
    }

    /// Payloads of every frame written so far, draining the capture.
    pub fn sent(&self) -> Vec<String> {
        let bytes = std::mem::take(&mut self.line.borrow_mut().tx);
        let mut decoder = FrameDecoder::new();
        bytes
            .into_iter()
            .filter_map(|b| decoder.ingest(b))
            .map(|p| String::from_utf8(p.to_vec()).expect("node sends text"))
            .collect()
    }
}

impl SerialPort for SimSerial {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let now = self.clock.now();
        let mut line = self.line.borrow_mut();
        let mut n = 0;
        while n < buf.len() {
            match line.rx.front() {
                Some(&(at, byte)) if at <= now => {
                    buf[n] = byte;
                    line.rx.pop_front();
                    n += 1;
                }
                _ => break,
            }
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), ()> {
        self.line.borrow_mut().tx.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ()> {
        Ok(())
    }
}

// ── MockNetwork ───────────────────────────────────────────────

/// Network interface whose requests take effect on the next poll.
#[derive(Default)]
pub struct MockNetwork {
    pub enabled: bool,
    pub requests: Vec<bool>,
    pending: Option<bool>,
}

impl MockNetwork {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }
}

impl NetworkPort for MockNetwork {
    fn request_enabled(&mut self, enabled: bool, _now_ms: u64) {
        self.requests.push(enabled);
        self.pending = Some(enabled);
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn poll(&mut self, _now_ms: u64) {
        if let Some(enabled) = self.pending.take() {
            self.enabled = enabled;
        }
    }
}

// ── MockStore ─────────────────────────────────────────────────

/// In-memory config and instance map.
#[derive(Default)]
pub struct MockStore {
    pub config: RefCell<Option<NodeConfig>>,
    pub map: RefCell<InstanceMap>,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&self, sensor: &str, instance: u8) {
        let id = SensorId::parse(sensor).expect("valid sensor id");
        self.set_instance(&id, instance).expect("map has room");
    }

    pub fn saved(&self) -> Option<NodeConfig> {
        self.config.borrow().clone()
    }
}

impl ConfigPort for MockStore {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        self.config.borrow().clone().ok_or(ConfigError::NotFound)
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.config.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

impl MappingPort for MockStore {
    fn instance_for(&self, sensor: &SensorId) -> u8 {
        if let Some(instance) = self.map.borrow().get(sensor) {
            return instance;
        }
        let _ = self.map.borrow_mut().set(sensor, DEFAULT_INSTANCE);
        DEFAULT_INSTANCE
    }

    fn set_instance(&self, sensor: &SensorId, instance: u8) -> Result<(), ConfigError> {
        self.map.borrow_mut().set(sensor, instance)
    }

    fn mappings(&self) -> InstanceMap {
        self.map.borrow().clone()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A node wired to simulated collaborators.
pub struct Rig {
    pub clock: SimClock,
    pub line: SimSerial,
    pub node: NodeService<SimSerial, SimClock>,
    pub sensors: SimSensors,
    pub network: MockNetwork,
    pub store: MockStore,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    /// Node started at `start_ms` with `config`.
    pub fn new(config: NodeConfig, start_ms: u64) -> Self {
        let clock = SimClock::starting_at_ms(start_ms);
        let line = SimSerial::new(&clock);
        let network = MockNetwork::new(config.network_enabled);
        let node = NodeService::new(config, line.clone(), clock.clone(), 0x5EED);
        let mut rig = Self {
            clock,
            line,
            node,
            sensors: SimSensors::new(),
            network,
            store: MockStore::new(),
            sink: RecordingSink::new(),
        };
        let mut ports = NodePorts {
            sensors: &mut rig.sensors,
            network: &mut rig.network,
            store: &rig.store,
            sink: &mut rig.sink,
        };
        rig.node.start(&mut ports);
        rig
    }

    pub fn tick(&mut self) {
        let mut ports = NodePorts {
            sensors: &mut self.sensors,
            network: &mut self.network,
            store: &self.store,
            sink: &mut self.sink,
        };
        self.node.tick(&mut ports);
    }

    /// Tick once per simulated millisecond.
    pub fn run_for_ms(&mut self, ms: u64) {
        for _ in 0..ms {
            self.clock.advance_ms(1);
            self.tick();
        }
    }
}

/// Config with periodic telegrams off, so only commands produce output.
#[allow(dead_code)]
pub fn quiet_config() -> NodeConfig {
    NodeConfig {
        auto_send_enabled: false,
        ..NodeConfig::default()
    }
}
