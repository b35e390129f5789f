//! Error types for the bus node firmware.
//!
//! [`Error`] is what the service's configuration calls return.  The
//! per-tick paths never propagate errors upward: bus contention and
//! malformed input are logged and the node returns to its idle state.
//! All variants are `Copy`.

use core::fmt;

use crate::app::ports::ConfigError;
use crate::protocol::codec::FrameError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A transmission on the RS485 bus failed.
    Bus(BusError),
    /// Configuration is invalid or could not be loaded/stored.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Bus errors
// ---------------------------------------------------------------------------

/// Why a transmission did not reach the wire.
///
/// Only [`IdleTimeout`](Self::IdleTimeout) and
/// [`Contention`](Self::Contention) are worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The bus never went idle within the allowed wait.
    IdleTimeout,
    /// Another node started talking during the random backoff.
    Contention,
    /// The payload cannot be framed.
    Frame(FrameError),
    /// The serial driver reported a write or flush failure.
    Serial,
}

impl BusError {
    /// `true` for errors caused by other traffic on the bus.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IdleTimeout | Self::Contention)
    }
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IdleTimeout => write!(f, "bus never idle"),
            Self::Contention => write!(f, "bus contention during backoff"),
            Self::Frame(e) => write!(f, "{e}"),
            Self::Serial => write!(f, "serial write failed"),
        }
    }
}

impl From<FrameError> for BusError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Network errors
// ---------------------------------------------------------------------------

/// Why the network interface did not change state.  Logged by the
/// adapter, which retries on its own schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// The driver refused to start the interface.
    StartFailed,
    /// The driver refused to stop the interface.
    StopFailed,
    /// The interface was never initialised.
    NotInitialised,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StartFailed => write!(f, "interface start failed"),
            Self::StopFailed => write!(f, "interface stop failed"),
            Self::NotInitialised => write!(f, "interface not initialised"),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
