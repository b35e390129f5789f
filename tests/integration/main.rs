//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below drives a complete [`NodeService`] over the simulated
//! line in `mock_hw`.  All tests run on the host (x86_64) with no real
//! hardware required.
//!
//! [`NodeService`]: busnode::app::service::NodeService

#![cfg(not(target_os = "espidf"))]

mod arbitration_tests;
mod dispatch_tests;
mod mock_hw;
mod scheduler_tests;
mod service_tests;
