//! Line timing for soft arbitration.

use crate::config::SerialSettings;

/// Silence (in character times) after which the bus counts as idle.
pub const GUARD_CHARS: u64 = 6;

/// Random backoff window before a write, inclusive (ms).
pub const BACKOFF_MIN_MS: u64 = 2;
pub const BACKOFF_MAX_MS: u64 = 20;

/// Pause between two attempts of a bounded-retry send (ms).
pub const RETRY_PAUSE_MS: u64 = 5;

/// Busy-wait step while polling the receiver (µs).
pub const POLL_STEP_US: u32 = 100;

/// Guard interval in µs, rounded up.
pub fn guard_interval_us(settings: &SerialSettings) -> u64 {
    let bits = GUARD_CHARS * u64::from(settings.bits_per_char()) * 1_000_000;
    bits.div_ceil(u64::from(settings.baud_rate.max(1)))
}
