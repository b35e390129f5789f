//! GPIO / peripheral assignments for the bus node board.
//!
//! Single source of truth: every driver references this module rather
//! than hard-coding pin numbers.

// ---------------------------------------------------------------------------
// RS485 transceiver (auto-direction, no DE/RE line)
// ---------------------------------------------------------------------------

/// UART peripheral wired to the transceiver.
pub const RS485_UART_PORT: i32 = 1;
/// UART TX → transceiver DI.
pub const RS485_TX_GPIO: i32 = 17;
/// UART RX ← transceiver RO.
pub const RS485_RX_GPIO: i32 = 18;

/// Driver-side receive ring buffer (bytes).  Covers the longest stretch
/// the loop spends away from the UART (a full 1-Wire ROM search) at
/// 115200 baud.
pub const RS485_RX_BUFFER: i32 = 4096;

// ---------------------------------------------------------------------------
// 1-Wire probe bus
// ---------------------------------------------------------------------------

/// Open-drain data line with a 4.7 kΩ external pull-up.
pub const ONEWIRE_GPIO: i32 = 4;
