//! Soft bus arbitration on a shared half-duplex RS485 line.
//!
//! [`Bus`] is the only owner of the serial port.  Every byte read passes
//! through the frame decoder and stamps the activity clock; every byte
//! written goes through [`Bus::attempt_send`] (optimistic, aborts on
//! contention) or [`Bus::transmit`] (direct, for callers that have just
//! confirmed the line is idle).
//!
//! ```text
//!  attempt_send:
//!    wait ≤ max_wait for idle ──no──▶ IdleTimeout
//!            │ yes
//!    random backoff 2..=20 ms, still draining RX
//!            │ byte arrived ─────────▶ Contention
//!    idle re-check ──busy───────────▶ Contention
//!            │
//!    write frame + flush
//! ```
//!
//! There is no echo check: a simultaneous transmitter that started inside
//! the same guard window goes undetected.

pub mod timing;

use log::{debug, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::app::ports::{Clock, SerialPort};
use crate::config::SerialSettings;
use crate::diagnostics::BusStats;
use crate::error::BusError;
use crate::protocol::codec::{Frame, FrameDecoder, Ingest, Payload, encode_frame};
use crate::timing::{MonotonicStamp, US_PER_MS, ms};
use timing::{BACKOFF_MAX_MS, BACKOFF_MIN_MS, POLL_STEP_US, RETRY_PAUSE_MS};

/// Completed payloads buffered between two dispatches.
pub const INBOX_CAPACITY: usize = 4;

const RX_CHUNK: usize = 64;

pub struct Bus<S: SerialPort, C: Clock> {
    serial: S,
    clock: C,
    decoder: FrameDecoder,
    /// Time of the last received byte (µs).
    activity: MonotonicStamp,
    inbox: heapless::Deque<Payload, INBOX_CAPACITY>,
    guard_us: u64,
    rng: SmallRng,
    stats: BusStats,
}

impl<S: SerialPort, C: Clock> Bus<S, C> {
    /// `seed` drives the backoff jitter; give each node a different one.
    pub fn new(serial: S, clock: C, settings: &SerialSettings, seed: u64) -> Self {
        Self {
            serial,
            clock,
            decoder: FrameDecoder::new(),
            activity: MonotonicStamp::new(0),
            inbox: heapless::Deque::new(),
            guard_us: timing::guard_interval_us(settings),
            rng: SmallRng::seed_from_u64(seed),
            stats: BusStats::default(),
        }
    }

    // ── Time ──────────────────────────────────────────────────

    pub fn now_us(&self) -> u64 {
        self.clock.now_us()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn guard_us(&self) -> u64 {
        self.guard_us
    }

    /// Time of the last received byte (µs).
    pub fn last_activity_us(&self) -> u64 {
        self.activity.get()
    }

    pub fn stats(&self) -> &BusStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut BusStats {
        &mut self.stats
    }

    // ── Receive path ──────────────────────────────────────────

    /// Drain every byte currently available from the serial port.
    ///
    /// Completed frames are queued in the inbox.  Returns the number of
    /// bytes read.
    pub fn poll_rx(&mut self) -> usize {
        let mut buf = [0u8; RX_CHUNK];
        let mut total = 0usize;
        loop {
            let n = match self.serial.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    debug!("BUS: read error {:?}", e);
                    break;
                }
            };
            let now = self.clock.now_us();
            for &byte in &buf[..n] {
                self.activity.record(now);
                self.ingest(byte);
            }
            total += n;
        }
        self.stats.bytes_received += total as u64;
        total
    }

    fn ingest(&mut self, byte: u8) {
        match self.decoder.ingest_detailed(byte) {
            Ingest::Pending => {}
            Ingest::Overflow => {
                self.stats.oversize_drops += 1;
                debug!("BUS: oversize frame dropped");
            }
            Ingest::Complete(payload) => {
                self.stats.frames_received += 1;
                if self.inbox.push_back(payload).is_err() {
                    self.stats.inbox_overflows += 1;
                    warn!("BUS: inbox full, frame dropped");
                }
            }
        }
    }

    /// Oldest completed payload not yet dispatched.
    pub fn take_payload(&mut self) -> Option<Payload> {
        self.inbox.pop_front()
    }

    pub fn pending_payloads(&self) -> usize {
        self.inbox.len()
    }

    // ── Arbitration ───────────────────────────────────────────

    /// `true` once the line has been silent for the guard interval.
    pub fn is_idle(&self) -> bool {
        self.activity.elapsed(self.clock.now_us()) >= self.guard_us
    }

    /// Busy-wait for `duration_ms` while draining the receiver.
    pub fn pause(&mut self, duration_ms: u64) {
        let until = self.clock.now_us().saturating_add(ms(duration_ms));
        while self.clock.now_us() < until {
            self.clock.delay_us(POLL_STEP_US);
            self.poll_rx();
        }
    }

    fn wait_for_idle(&mut self, max_wait_ms: u64) -> bool {
        let start = self.clock.now_us();
        let limit = ms(max_wait_ms);
        loop {
            self.poll_rx();
            if self.is_idle() {
                return true;
            }
            if self.clock.now_us().saturating_sub(start) >= limit {
                return false;
            }
            self.clock.delay_us(POLL_STEP_US);
        }
    }

    /// One optimistic send: wait for idle, back off randomly, write only if
    /// the line stayed quiet.  Never retries.
    pub fn attempt_send(&mut self, payload: &[u8], max_wait_ms: u64) -> Result<(), BusError> {
        let frame = encode_frame(payload)?;

        if !self.wait_for_idle(max_wait_ms) {
            self.stats.idle_timeouts += 1;
            return Err(BusError::IdleTimeout);
        }

        let backoff_ms = self.rng.gen_range(BACKOFF_MIN_MS..=BACKOFF_MAX_MS);
        let until = self.clock.now_us().saturating_add(ms(backoff_ms));
        while self.clock.now_us() < until {
            self.clock.delay_us(POLL_STEP_US);
            self.poll_rx();
            if !self.is_idle() {
                self.stats.contention_aborts += 1;
                return Err(BusError::Contention);
            }
        }

        self.poll_rx();
        if !self.is_idle() {
            self.stats.contention_aborts += 1;
            return Err(BusError::Contention);
        }
        self.write_frame(&frame)
    }

    /// Repeat [`attempt_send`](Self::attempt_send) until it succeeds or
    /// `budget_ms` of wall-clock time is used up.
    ///
    /// Returns the number of attempts on success.  Framing and serial
    /// errors end the loop immediately.
    pub fn send_with_retry(&mut self, payload: &[u8], budget_ms: u64) -> Result<u32, BusError> {
        let start = self.clock.now_us();
        let budget = ms(budget_ms);
        let mut attempts = 0u32;
        loop {
            let used = self.clock.now_us().saturating_sub(start);
            let remaining_ms = budget.saturating_sub(used) / US_PER_MS;
            attempts += 1;
            match self.attempt_send(payload, remaining_ms) {
                Ok(()) => return Ok(attempts),
                Err(e) if !e.is_transient() => return Err(e),
                Err(e) => {
                    let used = self.clock.now_us().saturating_sub(start);
                    if used.saturating_add(ms(RETRY_PAUSE_MS)) >= budget {
                        debug!("BUS: retry budget {}ms spent after {} attempt(s)", budget_ms, attempts);
                        return Err(e);
                    }
                    self.pause(RETRY_PAUSE_MS);
                }
            }
        }
    }

    /// Frame and write `payload` without arbitration.
    ///
    /// Only for callers that checked [`is_idle`](Self::is_idle) in the
    /// same tick.
    pub fn transmit(&mut self, payload: &[u8]) -> Result<(), BusError> {
        let frame = encode_frame(payload)?;
        self.write_frame(&frame)
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), BusError> {
        self.serial.write(frame).map_err(|e| {
            warn!("BUS: write failed {:?}", e);
            BusError::Serial
        })?;
        self.serial.flush().map_err(|e| {
            warn!("BUS: flush failed {:?}", e);
            BusError::Serial
        })
    }
}
