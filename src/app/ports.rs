//! Port traits: the hexagonal boundary between the protocol core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (bus · engine · scheduler)
//! ```
//!
//! Driven adapters (serial line, clock, probes, network interface,
//! storage, event sinks) implement these traits.  The core consumes them
//! through generics ([`SerialPort`], [`Clock`]) or through the
//! [`NodePorts`] bundle of trait objects, so it never touches hardware
//! directly.

use crate::config::{InstanceMap, NodeConfig};
use crate::sensors::{SensorId, SensorReading};

// ───────────────────────────────────────────────────────────────
// Serial port (driven adapter: RS485 transceiver)
// ───────────────────────────────────────────────────────────────

/// Byte-oriented half-duplex serial line.
///
/// Only [`Bus`](crate::bus::Bus) holds one; every other component goes
/// through it.
pub trait SerialPort {
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes without blocking.
    /// Returns 0 if no data is available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Queue all of `data` for transmission.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Block until every queued byte has physically left the transmitter.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

// ───────────────────────────────────────────────────────────────
// Clock (driven adapter: monotonic timer + busy-wait delay)
// ───────────────────────────────────────────────────────────────

/// Monotonic microsecond clock.
///
/// The `DelayNs` supertrait provides the short busy-waits used inside
/// bounded retry loops.  Simulated clocks advance time when delayed.
pub trait Clock: embedded_hal::delay::DelayNs {
    /// Microseconds since boot.
    fn now_us(&self) -> u64;

    fn now_ms(&self) -> u64 {
        self.now_us() / crate::timing::US_PER_MS
    }
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: probes → core)
// ───────────────────────────────────────────────────────────────

pub trait SensorPort {
    /// Ask for a fresh reading of every probe.  Implementations that
    /// convert in the background may keep reporting the previous
    /// readings until [`poll`](Self::poll) completes the new ones.
    fn refresh_all(&mut self);

    /// Advance background acquisition.  Called once per tick.
    fn poll(&mut self, _now_ms: u64) {}

    /// Most recent readings, in enumeration order.
    fn readings(&self) -> &[SensorReading];
}

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: interface lifecycle)
// ───────────────────────────────────────────────────────────────

/// The network interface is switched asynchronously: a request only
/// records intent, [`poll`](Self::poll) carries it out.
pub trait NetworkPort {
    /// Ask for the interface to be enabled or disabled.
    fn request_enabled(&mut self, enabled: bool, now_ms: u64);

    /// Actual current state (may lag behind the last request).
    fn is_enabled(&self) -> bool;

    /// Advance pending transitions.
    fn poll(&mut self, now_ms: u64);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: core → logging)
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: core ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists node configuration.
///
/// Implementations MUST validate before persisting: invalid values are
/// rejected with [`ConfigError::ValidationFailed`], never clamped.
pub trait ConfigPort {
    /// Returns [`NodeConfig::default()`] if nothing is stored yet.
    fn load(&self) -> Result<NodeConfig, ConfigError>;

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Mapping port (driven adapter: sensor id → bus instance)
// ───────────────────────────────────────────────────────────────

/// Durable sensor-identifier to instance-number mapping.
///
/// Takes `&self` so it can share a store with [`ConfigPort`];
/// implementations use interior mutability.
pub trait MappingPort {
    /// Mapped instance for `sensor`.  Unknown sensors are assigned
    /// instance 1 and the assignment is persisted.
    fn instance_for(&self, sensor: &SensorId) -> u8;

    /// Map `sensor` to `instance` (1..=255) and persist.
    fn set_instance(&self, sensor: &SensorId, instance: u8) -> Result<(), ConfigError>;

    /// Copy of the whole table.
    fn mappings(&self) -> InstanceMap;
}

/// Both halves of node storage behind one object.
pub trait SettingsStore: ConfigPort + MappingPort {}

impl<T: ConfigPort + MappingPort> SettingsStore for T {}

// ───────────────────────────────────────────────────────────────
// Port bundle
// ───────────────────────────────────────────────────────────────

/// Collaborators handed to the engine and scheduler on every tick.
pub struct NodePorts<'a> {
    pub sensors: &'a mut dyn SensorPort,
    pub network: &'a mut dyn NetworkPort,
    pub store: &'a dyn SettingsStore,
    pub sink: &'a mut dyn EventSink,
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] and [`MappingPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored blob failed deserialization.
    Corrupted,
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Storage or a bounded table is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from the raw blob storage underneath the config store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Full => Self::StorageFull,
            StorageError::IoError => Self::IoError,
        }
    }
}
