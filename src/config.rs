//! Node configuration parameters and the sensor instance map.
//!
//! Both are persisted as postcard blobs by the config store and exchanged
//! as JSON with the configuration UI.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::protocol::codec::{FRAME_END, FRAME_START};
use crate::protocol::telegram::ID_PLACEHOLDER;
use crate::sensors::SensorId;

/// Configured ping template text.
pub type Template = heapless::String<64>;

/// Entries the instance map can hold.
pub const MAX_MAPPINGS: usize = 32;

/// Instance assigned to a sensor seen for the first time.
pub const DEFAULT_INSTANCE: u8 = 1;

// ───────────────────────────────────────────────────────────────
// Serial line
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Parity {
    None,
    #[default]
    Even,
    Odd,
}

/// RS485 line settings: 8 data bits and 1 stop bit, configurable parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialSettings {
    pub baud_rate: u32,
    pub parity: Parity,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 57_600,
            parity: Parity::Even,
        }
    }
}

impl SerialSettings {
    /// Bits on the wire per character: start, 8 data, parity, stop.
    pub fn bits_per_char(&self) -> u32 {
        match self.parity {
            Parity::None => 10,
            Parity::Even | Parity::Odd => 11,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// NodeConfig
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    // --- Identity ---
    /// Address of this node on the bus (1..=9999).
    pub device_id: u16,

    // --- Line ---
    pub serial: SerialSettings,

    // --- Periodic telegrams ---
    /// Send temperature telegrams on a timer.
    pub auto_send_enabled: bool,
    /// Period between cycle starts (ms); 0 disables periodic sending.
    pub send_interval_ms: u32,
    /// Pause between two telegrams of one cycle (ms).
    pub telegram_gap_ms: u32,

    // --- Network interface ---
    /// Desired state of the network interface.
    pub network_enabled: bool,

    // --- Ping ---
    pub ping_request_template: Template,
    pub ping_response_template: Template,
}

fn template(text: &str) -> Template {
    let mut t = Template::new();
    // Defaults are short literals well under capacity.
    let _ = t.push_str(text);
    t
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            device_id: 1,
            serial: SerialSettings::default(),
            auto_send_enabled: true,
            send_interval_ms: 60_000,
            telegram_gap_ms: 100,
            network_enabled: true,
            ping_request_template: template("{ID}.OUT.210.gSTATUS"),
            ping_response_template: template("{ID}.OUT.210.rSTATUS"),
        }
    }
}

fn validate_template(t: &str, what: &'static str) -> Result<(), ConfigError> {
    if !t.contains(ID_PLACEHOLDER) {
        return Err(ConfigError::ValidationFailed(what));
    }
    if t.bytes()
        .any(|b| b == FRAME_START || b == FRAME_END || !(0x20..=0x7E).contains(&b))
    {
        return Err(ConfigError::ValidationFailed(what));
    }
    Ok(())
}

impl NodeConfig {
    /// Range-check every field.  Called before anything is persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=9999).contains(&self.device_id) {
            return Err(ConfigError::ValidationFailed("device_id must be 1–9999"));
        }
        if !(1200..=1_000_000).contains(&self.serial.baud_rate) {
            return Err(ConfigError::ValidationFailed(
                "serial.baud_rate must be 1200–1000000",
            ));
        }
        if self.send_interval_ms != 0 && self.send_interval_ms < 1000 {
            return Err(ConfigError::ValidationFailed(
                "send_interval_ms must be 0 or at least 1000",
            ));
        }
        if self.telegram_gap_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "telegram_gap_ms must be 0–10000",
            ));
        }
        validate_template(
            &self.ping_request_template,
            "ping_request_template must contain {ID} and printable ASCII only",
        )?;
        validate_template(
            &self.ping_response_template,
            "ping_response_template must contain {ID} and printable ASCII only",
        )?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|_| ConfigError::Corrupted)
    }

    /// Parse and validate a config document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        Ok(cfg)
    }
}

// ───────────────────────────────────────────────────────────────
// InstanceMap
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub sensor: SensorId,
    pub instance: u8,
}

/// Sensor identifier → bus instance, keyed by the full identifier.
///
/// Instances need not be unique; lookups by instance take the first
/// probe in enumeration order.  Entries are never removed automatically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMap {
    entries: heapless::Vec<MappingEntry, MAX_MAPPINGS>,
}

impl InstanceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, sensor: &SensorId) -> Option<u8> {
        self.entries
            .iter()
            .find(|e| &e.sensor == sensor)
            .map(|e| e.instance)
    }

    /// Insert or update a mapping.
    pub fn set(&mut self, sensor: &SensorId, instance: u8) -> Result<(), ConfigError> {
        if instance == 0 {
            return Err(ConfigError::ValidationFailed("instance must be 1–255"));
        }
        if let Some(entry) = self.entries.iter_mut().find(|e| &e.sensor == sensor) {
            entry.instance = instance;
            return Ok(());
        }
        self.entries
            .push(MappingEntry {
                sensor: sensor.clone(),
                instance,
            })
            .map_err(|_| ConfigError::StorageFull)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string(self).map_err(|_| ConfigError::Corrupted)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let map: Self = serde_json::from_str(json).map_err(|_| ConfigError::Corrupted)?;
        if map.entries.iter().any(|e| e.instance == 0) {
            return Err(ConfigError::ValidationFailed("instance must be 1–255"));
        }
        Ok(map)
    }
}
