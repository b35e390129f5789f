//! RS485 line protocol: framing, command grammar, wire payloads, and the
//! command engine that ties them to the bus.
//!
//! ```text
//!   serial bytes ─▶ codec ─▶ payload ─▶ engine ─▶ command ─▶ reply ─▶ Bus
//! ```

pub mod codec;
pub mod command;
pub mod engine;
pub mod telegram;
