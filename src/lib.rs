//! RS485 temperature bus node.
//!
//! Exposes the protocol engine and its ports for integration testing and
//! for the firmware binary.  All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod bus;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod protocol;
pub mod scheduler;
pub mod sensors;
pub mod timing;

// Each adapter carries a host simulation backend next to the real one.
pub mod adapters;
pub mod drivers;
pub mod pins;
