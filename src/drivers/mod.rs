//! Peripheral drivers below the adapter layer.

#[cfg(target_os = "espidf")]
pub mod onewire_gpio;
pub mod watchdog;
