//! Application core: protocol orchestration with zero direct I/O.
//!
//! The service ties the bus, the command engine and the temperature
//! scheduler together.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
