//! Monotonic timestamps shared between the dispatcher, the bus, and the
//! temperature scheduler.
//!
//! Both shared scalars (the bus activity clock and the holdoff deadline)
//! are plain `u64` microsecond marks on the node's monotonic clock.  They
//! are stored in atomics with a single writer each; readers only ever need
//! the latest value of one field, so `Relaxed` ordering is sufficient.
//!
//! ```text
//!   FrameDecoder ingest ──store──▶ activity ──load──▶ Bus::is_idle
//!   CommandEngine reply ──max────▶ holdoff  ──load──▶ TemperatureScheduler
//! ```

use core::sync::atomic::{AtomicU64, Ordering};

/// Microseconds per millisecond.
pub const US_PER_MS: u64 = 1_000;

/// Convert a millisecond duration into microseconds.
pub const fn ms(millis: u64) -> u64 {
    millis * US_PER_MS
}

/// A monotonic timestamp (µs) held in an atomic scalar.
#[derive(Debug, Default)]
pub struct MonotonicStamp(AtomicU64);

impl MonotonicStamp {
    pub const fn new(initial_us: u64) -> Self {
        Self(AtomicU64::new(initial_us))
    }

    /// Latest recorded value.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Overwrite with a newer reading of the monotonic clock.
    pub fn record(&self, now_us: u64) {
        self.0.store(now_us, Ordering::Relaxed);
    }

    /// Move the mark forward to `at_us`; earlier values are ignored.
    pub fn advance_to(&self, at_us: u64) {
        self.0.fetch_max(at_us, Ordering::Relaxed);
    }

    /// Microseconds elapsed since the mark (saturating at zero).
    pub fn elapsed(&self, now_us: u64) -> u64 {
        now_us.saturating_sub(self.get())
    }
}

/// Deadline before which the periodic scheduler must not transmit.
///
/// Set by the command engine after every reply; never moves backward.
#[derive(Debug, Default)]
pub struct Holdoff(MonotonicStamp);

impl Holdoff {
    pub const fn new() -> Self {
        Self(MonotonicStamp::new(0))
    }

    /// Extend the holdoff to at least `now_us + duration_ms`.
    pub fn extend(&self, now_us: u64, duration_ms: u64) {
        self.0.advance_to(now_us.saturating_add(ms(duration_ms)));
    }

    /// Absolute deadline in µs.
    pub fn until(&self) -> u64 {
        self.0.get()
    }

    /// `true` while `now_us` is still inside the holdoff window.
    pub fn is_active(&self, now_us: u64) -> bool {
        now_us < self.until()
    }
}
