//! DS18B20 digital thermometer.
//!
//! ```text
//! scratchpad: [T_LSB, T_MSB, TH, TL, CONFIG, FF, rsvd, 10h, CRC]
//! ```
//!
//! The temperature register is a signed 16-bit value in 1/16 °C steps
//! (12-bit resolution).  A scratchpad whose CRC does not match yields
//! [`FAULT_CELSIUS`], which the wire encoding turns into the fault pair.

use super::onewire::{CMD_SKIP_ROM, OneWireBus, Rom, crc8};

/// Family code shared by every DS18B20.
pub const FAMILY_CODE: u8 = 0x28;

const CMD_CONVERT_T: u8 = 0x44;
const CMD_READ_SCRATCHPAD: u8 = 0xBE;

/// Reported when a device cannot be read.
pub const FAULT_CELSIUS: f32 = -127.0;

/// Power-on reset value of the temperature register (85 °C).
const POWER_ON_RAW: i16 = 0x0550;

/// Upper bound on conversion-complete polls (one bit slot each, ~70 µs).
const MAX_CONVERSION_POLLS: u32 = 15_000;

/// Decode a scratchpad into °C.
///
/// Returns `None` on CRC mismatch or an all-ones (disconnected) read.
pub fn decode_scratchpad(scratchpad: &[u8; 9]) -> Option<f32> {
    if scratchpad.iter().all(|&b| b == 0xFF) || crc8(scratchpad) != 0 {
        return None;
    }
    let raw = i16::from_le_bytes([scratchpad[0], scratchpad[1]]);
    Some(f32::from(raw) / 16.0)
}

/// Broadcast CONVERT T to every device.
///
/// Returns `false` if no device answered the reset.
pub fn start_conversion<B: OneWireBus>(bus: &mut B) -> Result<bool, B::Error> {
    if !bus.reset()? {
        return Ok(false);
    }
    bus.write_byte(CMD_SKIP_ROM)?;
    bus.write_byte(CMD_CONVERT_T)?;
    Ok(true)
}

/// One read slot after [`start_conversion`]: devices hold the line low
/// until every conversion has finished.
pub fn conversion_done<B: OneWireBus>(bus: &mut B) -> Result<bool, B::Error> {
    bus.read_bit()
}

/// Start a conversion on every device and wait for it to finish.
///
/// Returns `false` if no device is present or the conversion never
/// signalled completion.
pub fn convert_all<B: OneWireBus>(bus: &mut B) -> Result<bool, B::Error> {
    if !start_conversion(bus)? {
        return Ok(false);
    }
    for _ in 0..MAX_CONVERSION_POLLS {
        if conversion_done(bus)? {
            return Ok(true);
        }
    }
    Ok(false)
}

fn read_scratchpad<B: OneWireBus>(bus: &mut B, rom: &Rom) -> Result<Option<[u8; 9]>, B::Error> {
    if !bus.select(rom)? {
        return Ok(None);
    }
    bus.write_byte(CMD_READ_SCRATCHPAD)?;
    let mut scratchpad = [0u8; 9];
    for b in &mut scratchpad {
        *b = bus.read_byte()?;
    }
    Ok(Some(scratchpad))
}

/// Read one device's temperature.  Any failure yields [`FAULT_CELSIUS`].
pub fn read_temperature<B: OneWireBus>(bus: &mut B, rom: &Rom) -> f32 {
    match read_scratchpad(bus, rom) {
        Ok(Some(scratchpad)) => match decode_scratchpad(&scratchpad) {
            Some(c) => {
                if i16::from_le_bytes([scratchpad[0], scratchpad[1]]) == POWER_ON_RAW {
                    log::debug!("DS18B20: power-on value, conversion may not have run");
                }
                c
            }
            None => {
                log::warn!("DS18B20: scratchpad CRC mismatch");
                FAULT_CELSIUS
            }
        },
        Ok(None) => FAULT_CELSIUS,
        Err(e) => {
            log::warn!("DS18B20: bus error {:?}", e);
            FAULT_CELSIUS
        }
    }
}
