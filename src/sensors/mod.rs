//! Temperature sensor subsystem: identifiers, readings and the
//! aggregating [`SensorHub`].
//!
//! The hub owns a 1-Wire bus and converts in the background: every
//! [`poll`](SensorPort::poll) advances one step of a cycle (start
//! conversion, wait, read one probe per step), so the main loop never
//! blocks for the ~750 ms a conversion takes.  A refresh request
//! re-enumerates the bus at the start of the next cycle so hot-plugged
//! probes appear without a restart.  Readings stay in enumeration (ROM
//! search) order and are at most one cycle old.
//!
//! Host builds use [`SimSensors`], an injectable reading table.

pub mod ds18b20;
pub mod onewire;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::app::ports::SensorPort;
use onewire::{OneWireBus, Rom};

/// Most probes a hub keeps per refresh.
pub const MAX_SENSORS: usize = 32;

/// Hex digits in a rendered [`SensorId`].
pub const SENSOR_ID_LEN: usize = 16;

/// Hardware identifier of a probe: its 64-bit ROM as 16 uppercase hex
/// digits, family code first.  Deserializing goes through
/// [`SensorId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "heapless::String<SENSOR_ID_LEN>")]
pub struct SensorId(heapless::String<SENSOR_ID_LEN>);

impl SensorId {
    pub fn from_rom(rom: &Rom) -> Self {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let mut text = heapless::String::new();
        for &b in rom {
            // 8 bytes render to exactly SENSOR_ID_LEN characters.
            let _ = text.push(char::from(HEX[usize::from(b >> 4)]));
            let _ = text.push(char::from(HEX[usize::from(b & 0x0F)]));
        }
        Self(text)
    }

    /// Accept exactly 16 hex digits in either case; store uppercase.
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() != SENSOR_ID_LEN || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let mut id = heapless::String::new();
        for c in text.chars() {
            id.push(c.to_ascii_uppercase()).ok()?;
        }
        Some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<heapless::String<SENSOR_ID_LEN>> for SensorId {
    type Error = &'static str;

    fn try_from(text: heapless::String<SENSOR_ID_LEN>) -> Result<Self, Self::Error> {
        Self::parse(&text).ok_or("sensor id must be 16 hex digits")
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Last reading of one probe.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub id: SensorId,
    pub celsius: f32,
}

// ───────────────────────────────────────────────────────────────
// SensorHub (1-Wire DS18B20 chain)
// ───────────────────────────────────────────────────────────────

/// Give up waiting for a conversion after this long (750 ms at 12 bits).
const CONVERSION_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acquisition {
    Idle,
    Converting { since_ms: u64 },
    /// Reading scratchpads; `next` indexes `roms`.
    Collecting { next: usize },
}

pub struct SensorHub<B: OneWireBus> {
    bus: B,
    roms: heapless::Vec<Rom, MAX_SENSORS>,
    readings: heapless::Vec<SensorReading, MAX_SENSORS>,
    staged: heapless::Vec<SensorReading, MAX_SENSORS>,
    state: Acquisition,
    rescan: bool,
}

impl<B: OneWireBus> SensorHub<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            roms: heapless::Vec::new(),
            readings: heapless::Vec::new(),
            staged: heapless::Vec::new(),
            state: Acquisition::Idle,
            rescan: true,
        }
    }

    /// Number of probes found by the last enumeration.
    pub fn count(&self) -> usize {
        self.roms.len()
    }

    /// Blocking first acquisition, run once before the main loop.
    pub fn prime(&mut self) {
        self.rescan = false;
        self.enumerate();
        match ds18b20::convert_all(&mut self.bus) {
            Ok(true) => {}
            Ok(false) => log::debug!("Sensors: conversion not confirmed"),
            Err(e) => log::warn!("Sensors: convert failed ({:?})", e),
        }
        self.staged.clear();
        for index in 0..self.roms.len() {
            self.read_one(index);
        }
        self.publish();
    }

    fn enumerate(&mut self) {
        match onewire::search::<_, MAX_SENSORS>(&mut self.bus) {
            Ok(roms) => {
                if roms.len() != self.roms.len() {
                    log::info!("Sensors: {} probe(s) on the 1-Wire bus", roms.len());
                }
                self.roms = roms
                    .into_iter()
                    .filter(|rom| rom[0] == ds18b20::FAMILY_CODE)
                    .collect();
            }
            Err(e) => {
                log::warn!("Sensors: ROM search failed ({:?}), keeping previous list", e);
            }
        }
    }

    fn start_cycle(&mut self, now_ms: u64) {
        if core::mem::take(&mut self.rescan) {
            self.enumerate();
        }
        if self.roms.is_empty() {
            self.readings.clear();
            return;
        }
        match ds18b20::start_conversion(&mut self.bus) {
            Ok(true) => {
                self.staged.clear();
                self.state = Acquisition::Converting { since_ms: now_ms };
            }
            Ok(false) => {
                log::warn!("Sensors: no presence pulse, rescanning");
                self.rescan = true;
            }
            Err(e) => log::warn!("Sensors: convert failed ({:?})", e),
        }
    }

    fn read_one(&mut self, index: usize) {
        let Some(rom) = self.roms.get(index) else {
            return;
        };
        let celsius = ds18b20::read_temperature(&mut self.bus, rom);
        // Capacities match: at most one reading per ROM.
        let _ = self.staged.push(SensorReading {
            id: SensorId::from_rom(rom),
            celsius,
        });
    }

    fn publish(&mut self) {
        self.readings = core::mem::take(&mut self.staged);
        self.state = Acquisition::Idle;
    }
}

impl<B: OneWireBus> SensorPort for SensorHub<B> {
    /// Re-enumerate at the start of the next cycle.  Readings keep
    /// reporting the last completed cycle until then.
    fn refresh_all(&mut self) {
        self.rescan = true;
    }

    fn poll(&mut self, now_ms: u64) {
        match self.state {
            Acquisition::Idle => self.start_cycle(now_ms),
            Acquisition::Converting { since_ms } => match ds18b20::conversion_done(&mut self.bus) {
                Ok(true) => self.state = Acquisition::Collecting { next: 0 },
                Ok(false) if now_ms.saturating_sub(since_ms) >= CONVERSION_TIMEOUT_MS => {
                    log::debug!("Sensors: conversion not confirmed");
                    self.state = Acquisition::Collecting { next: 0 };
                }
                Ok(false) => {}
                Err(e) => {
                    log::warn!("Sensors: conversion poll failed ({:?})", e);
                    self.state = Acquisition::Idle;
                }
            },
            Acquisition::Collecting { next } if next < self.roms.len() => {
                self.read_one(next);
                self.state = Acquisition::Collecting { next: next + 1 };
            }
            Acquisition::Collecting { .. } => self.publish(),
        }
    }

    fn readings(&self) -> &[SensorReading] {
        &self.readings
    }
}

// ───────────────────────────────────────────────────────────────
// Host simulation
// ───────────────────────────────────────────────────────────────

/// Injectable reading table standing in for a probe chain.
#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
pub struct SimSensors {
    table: Vec<SensorReading>,
    visible: Vec<SensorReading>,
    refreshes: u32,
}

#[cfg(not(target_os = "espidf"))]
impl SimSensors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a probe or update its reading.  Visible after the next refresh.
    pub fn set(&mut self, id: &str, celsius: f32) {
        let Some(id) = SensorId::parse(id) else {
            log::warn!("SimSensors: ignoring malformed id '{}'", id);
            return;
        };
        match self.table.iter_mut().find(|r| r.id == id) {
            Some(r) => r.celsius = celsius,
            None => self.table.push(SensorReading { id, celsius }),
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.table.retain(|r| r.id.as_str() != id);
    }

    /// How many times `refresh_all` ran.
    pub fn refreshes(&self) -> u32 {
        self.refreshes
    }
}

#[cfg(not(target_os = "espidf"))]
impl SensorPort for SimSensors {
    fn refresh_all(&mut self) {
        self.refreshes += 1;
        self.visible.clone_from(&self.table);
    }

    fn readings(&self) -> &[SensorReading] {
        &self.visible
    }
}
