//! WiFi interface lifecycle adapter.
//!
//! Implements [`NetworkPort`]: the core asks for the interface to be on or
//! off, this adapter carries the request out from the main loop.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation backend for host-side tests.
//!
//! ## Transition policy
//!
//! Requests are debounced for [`DEBOUNCE_MS`]: every new request restarts
//! the window and only the last one is applied.  A rapid `0, 1, 0` burst
//! on the bus therefore costs a single transition.
//!
//! ```text
//!   Disabled ──▶ Enabling ──▶ Enabled ──▶ Disabling ──▶ Disabled
//!                   │ start failed                │ stop failed
//!                   └──────▶ Disabled   Enabled ◀─┘
//! ```

use log::{info, warn};

use crate::app::ports::NetworkPort;
use crate::error::NetworkError;

/// Quiet period before a request is acted upon (ms).
pub const DEBOUNCE_MS: u64 = 300;

// ───────────────────────────────────────────────────────────────
// Interface state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetState {
    Disabled,
    Enabling,
    Enabled,
    Disabling,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    enabled: bool,
    requested_at_ms: u64,
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: NetState,
    pending: Option<Pending>,
    #[cfg(target_os = "espidf")]
    driver: Option<esp_idf_svc::wifi::EspWifi<'static>>,
    /// Simulation: make the next start attempt fail.
    #[cfg(not(target_os = "espidf"))]
    sim_fail_start: bool,
    /// Simulation: driver start/stop calls.
    #[cfg(not(target_os = "espidf"))]
    sim_calls: (u32, u32),
}

impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            state: NetState::Disabled,
            pending: None,
            #[cfg(target_os = "espidf")]
            driver: None,
            #[cfg(not(target_os = "espidf"))]
            sim_fail_start: false,
            #[cfg(not(target_os = "espidf"))]
            sim_calls: (0, 0),
        }
    }

    /// Attach the station driver created in `main`.
    #[cfg(target_os = "espidf")]
    pub fn with_driver(driver: esp_idf_svc::wifi::EspWifi<'static>) -> Self {
        Self {
            driver: Some(driver),
            ..Self::new()
        }
    }

    pub fn state(&self) -> NetState {
        self.state
    }

    /// `true` while a request is waiting out the debounce window.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), NetworkError> {
        let driver = self.driver.as_mut().ok_or(NetworkError::NotInitialised)?;
        driver.start().map_err(|e| {
            warn!("WiFi(espidf): start failed: {}", e);
            NetworkError::StartFailed
        })
    }

    #[cfg(target_os = "espidf")]
    fn platform_stop(&mut self) -> Result<(), NetworkError> {
        let driver = self.driver.as_mut().ok_or(NetworkError::NotInitialised)?;
        driver.stop().map_err(|e| {
            warn!("WiFi(espidf): stop failed: {}", e);
            NetworkError::StopFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), NetworkError> {
        self.sim_calls.0 += 1;
        if core::mem::take(&mut self.sim_fail_start) {
            return Err(NetworkError::StartFailed);
        }
        info!("WiFi(sim): interface up");
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_stop(&mut self) -> Result<(), NetworkError> {
        self.sim_calls.1 += 1;
        info!("WiFi(sim): interface down");
        Ok(())
    }

    /// Simulation: fail the next driver start.
    #[cfg(not(target_os = "espidf"))]
    pub fn fail_next_start(&mut self) {
        self.sim_fail_start = true;
    }

    /// Simulation: `(starts, stops)` issued to the driver.
    #[cfg(not(target_os = "espidf"))]
    pub fn driver_calls(&self) -> (u32, u32) {
        self.sim_calls
    }

    // ── Transitions ───────────────────────────────────────────

    fn apply(&mut self, enabled: bool) {
        self.state = match (enabled, self.state) {
            (true, NetState::Disabled | NetState::Disabling) => NetState::Enabling,
            (false, NetState::Enabled | NetState::Enabling) => NetState::Disabling,
            (_, state) => state,
        };
    }

    fn advance(&mut self) {
        match self.state {
            NetState::Enabling => match self.platform_start() {
                Ok(()) => {
                    self.state = NetState::Enabled;
                    info!("WiFi: interface enabled");
                }
                Err(e) => {
                    self.state = NetState::Disabled;
                    warn!("WiFi: enable failed: {}", e);
                }
            },
            NetState::Disabling => match self.platform_stop() {
                Ok(()) => {
                    self.state = NetState::Disabled;
                    info!("WiFi: interface disabled");
                }
                Err(e) => {
                    self.state = NetState::Enabled;
                    warn!("WiFi: disable failed: {}", e);
                }
            },
            NetState::Enabled | NetState::Disabled => {}
        }
    }
}

// ───────────────────────────────────────────────────────────────
// NetworkPort
// ───────────────────────────────────────────────────────────────

impl NetworkPort for WifiAdapter {
    fn request_enabled(&mut self, enabled: bool, now_ms: u64) {
        self.pending = Some(Pending {
            enabled,
            requested_at_ms: now_ms,
        });
    }

    fn is_enabled(&self) -> bool {
        matches!(self.state, NetState::Enabled | NetState::Disabling)
    }

    fn poll(&mut self, now_ms: u64) {
        let due = self
            .pending
            .filter(|p| now_ms.saturating_sub(p.requested_at_ms) >= DEBOUNCE_MS);
        if let Some(p) = due {
            self.pending = None;
            self.apply(p.enabled);
        }
        self.advance();
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
