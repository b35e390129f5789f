//! Dallas/Maxim 1-Wire primitives: the bus trait, CRC-8 and ROM search.
//!
//! The search follows the classic binary-tree walk: each pass reads the
//! id bit and its complement for all 64 ROM bits, resolving discrepancies
//! by taking the 0 branch first and revisiting the deepest untried 1
//! branch on the next pass.

use core::fmt;

/// 64-bit device ROM: family code, 48-bit serial, CRC.
pub type Rom = [u8; 8];

/// `SEARCH ROM` command.
pub const CMD_SEARCH_ROM: u8 = 0xF0;
/// `MATCH ROM` command.
pub const CMD_MATCH_ROM: u8 = 0x55;
/// `SKIP ROM` command (address every device).
pub const CMD_SKIP_ROM: u8 = 0xCC;

/// Bit-level access to a 1-Wire bus.
pub trait OneWireBus {
    type Error: fmt::Debug;

    /// Issue a reset pulse.  Returns `true` if any device answered with a
    /// presence pulse.
    fn reset(&mut self) -> Result<bool, Self::Error>;

    fn write_bit(&mut self, bit: bool) -> Result<(), Self::Error>;

    fn read_bit(&mut self) -> Result<bool, Self::Error>;

    /// Write a byte, least significant bit first.
    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        for i in 0..8 {
            self.write_bit(byte & (1 << i) != 0)?;
        }
        Ok(())
    }

    /// Read a byte, least significant bit first.
    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = 0u8;
        for i in 0..8 {
            if self.read_bit()? {
                byte |= 1 << i;
            }
        }
        Ok(byte)
    }

    /// Reset and address a single device.
    fn select(&mut self, rom: &Rom) -> Result<bool, Self::Error> {
        if !self.reset()? {
            return Ok(false);
        }
        self.write_byte(CMD_MATCH_ROM)?;
        for &b in rom {
            self.write_byte(b)?;
        }
        Ok(true)
    }
}

/// Dallas/Maxim CRC-8 (polynomial x^8 + x^5 + x^4 + 1, reflected).
///
/// Running it over data followed by its CRC byte yields zero.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        let mut b = byte;
        for _ in 0..8 {
            let mix = (crc ^ b) & 0x01;
            crc >>= 1;
            if mix != 0 {
                crc ^= 0x8C;
            }
            b >>= 1;
        }
    }
    crc
}

/// Enumerate every device ROM on the bus, in search order.
///
/// ROMs failing their CRC are skipped.  Enumeration stops quietly once
/// `N` devices were found.
pub fn search<B: OneWireBus, const N: usize>(
    bus: &mut B,
) -> Result<heapless::Vec<Rom, N>, B::Error> {
    let mut found = heapless::Vec::new();
    let mut rom: Rom = [0; 8];
    // 1-based bit index of the last unresolved 0 branch; 0 = none left.
    let mut last_discrepancy = 0u8;

    loop {
        if !bus.reset()? {
            break;
        }
        bus.write_byte(CMD_SEARCH_ROM)?;

        let mut last_zero = 0u8;
        for bit_number in 1..=64u8 {
            let id_bit = bus.read_bit()?;
            let cmp_bit = bus.read_bit()?;
            let idx = usize::from((bit_number - 1) / 8);
            let mask = 1u8 << ((bit_number - 1) % 8);

            let direction = match (id_bit, cmp_bit) {
                // Nobody answered this bit.
                (true, true) => return Ok(found),
                (false, true) => false,
                (true, false) => true,
                (false, false) => {
                    let dir = match bit_number.cmp(&last_discrepancy) {
                        core::cmp::Ordering::Less => rom[idx] & mask != 0,
                        core::cmp::Ordering::Equal => true,
                        core::cmp::Ordering::Greater => false,
                    };
                    if !dir {
                        last_zero = bit_number;
                    }
                    dir
                }
            };

            if direction {
                rom[idx] |= mask;
            } else {
                rom[idx] &= !mask;
            }
            bus.write_bit(direction)?;
        }

        if crc8(&rom) == 0 {
            if found.push(rom).is_err() {
                break;
            }
        } else {
            log::debug!("1-Wire: ROM CRC mismatch {:02X?}", rom);
        }

        last_discrepancy = last_zero;
        if last_discrepancy == 0 {
            break;
        }
    }
    Ok(found)
}
