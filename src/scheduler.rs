//! Periodic temperature telegrams.
//!
//! A cooperative state machine driven once per main-loop tick.  It never
//! blocks: every wait is a deadline compared against the caller's clock.
//!
//! ```text
//!            interval elapsed, bus idle
//!   ┌──────┐ ─────────────────────────▶ ┌──────────────┐
//!   │ Idle │                            │ PrepareCycle │ capture snapshot
//!   └──────┘ ◀── no probes / busy 1 s ─ └──────┬───────┘
//!      ▲                                       │
//!      │ snapshot drained                      ▼
//!      │                                ┌──────────────┐  transmit one
//!      └─────────────────────────────── │   SendOne    │ ─────────────┐
//!                                       └──────────────┘              │
//!                                              ▲                      ▼
//!                                              │ gap elapsed    ┌──────────┐
//!                                              └─────────────── │ WaitGap  │
//!                                                               └──────────┘
//! ```
//!
//! [`TemperatureScheduler::step`] is the pure transition function;
//! [`TemperatureScheduler::tick`] performs the effects it asks for.

use log::{debug, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, NodePorts, SerialPort};
use crate::bus::Bus;
use crate::config::NodeConfig;
use crate::protocol::telegram::{self, WireTemperature};
use crate::sensors::SensorId;
use crate::timing::{Holdoff, US_PER_MS};

/// Probes captured per cycle.
pub const SNAPSHOT_CAPACITY: usize = 16;

/// Delay before re-checking a busy bus from `Idle` (ms).
pub const SHORT_RETRY_MS: u64 = 50;

/// Longest `PrepareCycle` waits for the bus before giving up (ms).
pub const PREPARE_TIMEOUT_MS: u64 = 1000;

// ═══════════════════════════════════════════════════════════════
//  State and inputs
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    PrepareCycle { since_ms: u64 },
    SendOne,
    WaitGap { until_ms: u64 },
}

/// Everything [`TemperatureScheduler::step`] looks at besides its own state.
#[derive(Debug, Clone, Copy)]
pub struct StepInput {
    pub now_ms: u64,
    pub bus_idle: bool,
    pub holdoff_active: bool,
    pub auto_send: bool,
    pub interval_ms: u64,
    pub gap_ms: u64,
}

/// Work requested by a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// Refresh the probes and call [`TemperatureScheduler::load_snapshot`].
    Capture,
    /// Send snapshot entry `n`, then call [`TemperatureScheduler::complete_send`].
    Transmit(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotEntry {
    pub sensor: SensorId,
    pub instance: u8,
    pub celsius: f32,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
pub struct TemperatureScheduler {
    state: SchedulerState,
    last_cycle_start_ms: u64,
    retry_at_ms: u64,
    snapshot: heapless::Vec<SnapshotEntry, SNAPSHOT_CAPACITY>,
    cursor: usize,
    sent: usize,
}

impl Default for TemperatureScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TemperatureScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle,
            last_cycle_start_ms: 0,
            retry_at_ms: 0,
            snapshot: heapless::Vec::new(),
            cursor: 0,
            sent: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn snapshot(&self) -> &[SnapshotEntry] {
        &self.snapshot
    }

    pub fn last_cycle_start_ms(&self) -> u64 {
        self.last_cycle_start_ms
    }

    /// Advance the machine as far as it can go without doing I/O.
    pub fn step(&mut self, input: &StepInput) -> Effect {
        let now = input.now_ms;
        loop {
            match self.state {
                SchedulerState::Idle => {
                    if !input.auto_send || input.interval_ms == 0 || input.holdoff_active {
                        return Effect::None;
                    }
                    if now.saturating_sub(self.last_cycle_start_ms) < input.interval_ms
                        || now < self.retry_at_ms
                    {
                        return Effect::None;
                    }
                    if !input.bus_idle {
                        self.retry_at_ms = now + SHORT_RETRY_MS;
                        return Effect::None;
                    }
                    self.state = SchedulerState::PrepareCycle { since_ms: now };
                }
                SchedulerState::PrepareCycle { since_ms } => {
                    if input.bus_idle {
                        return Effect::Capture;
                    }
                    if now.saturating_sub(since_ms) > PREPARE_TIMEOUT_MS {
                        debug!("CYCLE: bus busy for {}ms, postponing", PREPARE_TIMEOUT_MS);
                        self.state = SchedulerState::Idle;
                        self.retry_at_ms = now + SHORT_RETRY_MS;
                    }
                    return Effect::None;
                }
                SchedulerState::SendOne => {
                    if self.cursor >= self.snapshot.len() {
                        self.state = SchedulerState::Idle;
                        return Effect::None;
                    }
                    if input.holdoff_active || !input.bus_idle {
                        return Effect::None;
                    }
                    return Effect::Transmit(self.cursor);
                }
                SchedulerState::WaitGap { until_ms } => {
                    if now < until_ms {
                        return Effect::None;
                    }
                    self.state = SchedulerState::SendOne;
                }
            }
        }
    }

    /// Replace the snapshot and start a cycle at `now_ms`.
    ///
    /// Entries beyond [`SNAPSHOT_CAPACITY`] are ignored.  Returns the
    /// number captured.
    pub fn load_snapshot(
        &mut self,
        entries: impl IntoIterator<Item = SnapshotEntry>,
        now_ms: u64,
    ) -> usize {
        self.snapshot.clear();
        for entry in entries.into_iter().take(SNAPSHOT_CAPACITY) {
            // Bounded by take() above.
            let _ = self.snapshot.push(entry);
        }
        self.last_cycle_start_ms = now_ms;
        self.cursor = 0;
        self.sent = 0;
        self.state = if self.snapshot.is_empty() {
            SchedulerState::Idle
        } else {
            SchedulerState::SendOne
        };
        self.snapshot.len()
    }

    /// Move past the current entry, whether or not it went out.
    ///
    /// Returns `true` when the cycle is finished.
    pub fn complete_send(&mut self, sent: bool, now_ms: u64, gap_ms: u64) -> bool {
        self.cursor += 1;
        if sent {
            self.sent += 1;
        }
        if self.cursor < self.snapshot.len() {
            self.state = SchedulerState::WaitGap {
                until_ms: now_ms + gap_ms,
            };
            false
        } else {
            self.state = SchedulerState::Idle;
            true
        }
    }

    // ── Effects ───────────────────────────────────────────────

    /// One main-loop tick: step, then carry out the effect.
    pub fn tick<S: SerialPort, C: Clock>(
        &mut self,
        bus: &mut Bus<S, C>,
        config: &NodeConfig,
        holdoff: &Holdoff,
        ports: &mut NodePorts<'_>,
    ) {
        let now_us = bus.now_us();
        let input = StepInput {
            now_ms: now_us / US_PER_MS,
            bus_idle: bus.is_idle(),
            holdoff_active: holdoff.is_active(now_us),
            auto_send: config.auto_send_enabled,
            interval_ms: u64::from(config.send_interval_ms),
            gap_ms: u64::from(config.telegram_gap_ms),
        };

        match self.step(&input) {
            Effect::None => {}
            Effect::Capture => {
                ports.sensors.refresh_all();
                let store = ports.store;
                let entries = ports.sensors.readings().iter().map(|r| SnapshotEntry {
                    sensor: r.id.clone(),
                    instance: store.instance_for(&r.id),
                    celsius: r.celsius,
                });
                let count = self.load_snapshot(entries, input.now_ms);
                if count == 0 {
                    debug!("CYCLE: no probes found");
                } else {
                    ports.sink.emit(&AppEvent::CycleStarted { sensors: count });
                }
            }
            Effect::Transmit(index) => {
                let Some(entry) = self.snapshot.get(index) else {
                    self.state = SchedulerState::Idle;
                    return;
                };
                let instance = entry.instance;
                let wire = WireTemperature::from_celsius(entry.celsius);
                let text = telegram::temperature_status(config.device_id, instance, wire);
                let sent = match bus.transmit(text.as_bytes()) {
                    Ok(()) => {
                        bus.stats_mut().telegrams_sent += 1;
                        ports.sink.emit(&AppEvent::TelegramSent {
                            instance,
                            temperature: wire,
                        });
                        true
                    }
                    Err(e) => {
                        warn!("CYCLE: telegram for instance {} not sent: {}", instance, e);
                        false
                    }
                };
                if self.complete_send(sent, input.now_ms, input.gap_ms) {
                    ports.sink.emit(&AppEvent::CycleFinished { sent: self.sent });
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
