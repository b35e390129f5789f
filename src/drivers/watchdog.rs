//! Task Watchdog Timer (TWDT) driver.
//!
//! Resets the node if the main loop stops ticking.  The longest blocking
//! section in a tick is a reply's retry budget (a few hundred ms), far
//! below [`TIMEOUT_MS`].

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

/// Time without a feed before the TWDT panics the node.
pub const TIMEOUT_MS: u32 = 5_000;

pub struct Watchdog {
    subscribed: bool,
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::subscribe()
    }
}

impl Watchdog {
    /// Configure the TWDT and subscribe the calling task.
    #[cfg(target_os = "espidf")]
    pub fn subscribe() -> Self {
        let cfg = esp_task_wdt_config_t {
            timeout_ms: TIMEOUT_MS,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: called once from the main task during boot.
        let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
        if ret != ESP_OK {
            log::warn!("Watchdog: reconfigure returned {} (may already be configured)", ret);
        }

        let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
        let subscribed = ret == ESP_OK;
        if subscribed {
            info!("Watchdog: subscribed ({}ms timeout)", TIMEOUT_MS);
        } else {
            log::warn!("Watchdog: failed to subscribe ({})", ret);
        }
        Self { subscribed }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn subscribe() -> Self {
        info!("Watchdog(sim): no-op");
        Self { subscribed: false }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Call once per main-loop iteration.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: resets the TWDT entry of the calling (subscribed) task.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}
