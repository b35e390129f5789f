//! Bus counters and runtime diagnostics.
//!
//! [`BusStats`] is owned by the [`Bus`](crate::bus::Bus) and bumped by
//! the receive path, the arbitration layer, the command engine and the
//! scheduler.  The firmware logs a one-line summary periodically.
//!
//! Runtime metrics (heap, uptime) are collected on demand.

use core::fmt;

use serde::Serialize;

/// Interval between diagnostic summaries in the main loop.
pub const SUMMARY_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Monotonic event counters for the RS485 line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Bytes taken off the serial line.
    pub bytes_received: u64,
    /// Complete frames delivered by the decoder.
    pub frames_received: u32,
    /// Frames abandoned for exceeding the payload cap.
    pub oversize_drops: u32,
    /// Payloads that were not valid UTF-8.
    pub non_utf8_drops: u32,
    /// Payloads lost because the inbox was full.
    pub inbox_overflows: u32,
    /// Payloads matching no command shape.
    pub unrecognized: u32,
    /// Commands addressed to another node.
    pub not_for_us: u32,
    /// Send attempts aborted by traffic during backoff.
    pub contention_aborts: u32,
    /// Send attempts that never saw an idle bus.
    pub idle_timeouts: u32,
    /// Periodic temperature telegrams written.
    pub telegrams_sent: u32,
    /// Command replies written.
    pub replies_sent: u32,
    /// Replies given up after the retry budget.
    pub replies_abandoned: u32,
}

impl fmt::Display for BusStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rx={}B/{}fr drop(oversize={} utf8={} inbox={}) unrec={} other={} \
             contention={} idle_timeout={} tx(telegram={} reply={} abandoned={})",
            self.bytes_received,
            self.frames_received,
            self.oversize_drops,
            self.non_utf8_drops,
            self.inbox_overflows,
            self.unrecognized,
            self.not_for_us,
            self.contention_aborts,
            self.idle_timeouts,
            self.telegrams_sent,
            self.replies_sent,
            self.replies_abandoned,
        )
    }
}

/// Runtime diagnostics snapshot collected on-demand.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeMetrics {
    pub uptime_secs: u64,
    pub heap_free: u32,
    pub heap_min_free: u32,
}

impl RuntimeMetrics {
    #[cfg(target_os = "espidf")]
    pub fn collect(uptime_secs: u64) -> Self {
        use esp_idf_svc::sys::*;
        // SAFETY: plain reads of allocator statistics.
        let heap_free = unsafe { esp_get_free_heap_size() };
        let heap_min_free = unsafe { esp_get_minimum_free_heap_size() };
        Self {
            uptime_secs,
            heap_free,
            heap_min_free,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn collect(uptime_secs: u64) -> Self {
        // Synthetic values so simulation paths exercise the same
        // formatting as real hardware.
        let heap_free: u32 = 307_200;
        Self {
            uptime_secs,
            heap_free,
            heap_min_free: (heap_free as f32 * 0.85) as u32,
        }
    }
}

/// Log one summary line for the bus and the runtime.
pub fn log_summary(stats: &BusStats, metrics: &RuntimeMetrics) {
    log::info!(
        "DIAG | up={}s heap={}/{}B | {}",
        metrics.uptime_secs,
        metrics.heap_free,
        metrics.heap_min_free,
        stats
    );
}
