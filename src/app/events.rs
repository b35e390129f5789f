//! Outbound application events.
//!
//! The engine and the scheduler emit these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, count them, forward
//! them to the configuration UI.

use crate::error::BusError;
use crate::protocol::telegram::WireTemperature;

/// Structured events emitted by the node core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started.
    Started { device_id: u16, baud_rate: u32 },

    /// A command addressed to this node was recognised.
    CommandReceived(&'static str),

    /// A reply reached the wire.
    ReplySent { kind: &'static str, attempts: u32 },

    /// A reply was given up after its retry budget.
    ReplyAbandoned {
        kind: &'static str,
        error: BusError,
    },

    /// A periodic telegram was written.
    TelegramSent {
        instance: u8,
        temperature: WireTemperature,
    },

    /// A send cycle captured `sensors` readings.
    CycleStarted { sensors: usize },

    /// The cycle snapshot is drained.
    CycleFinished { sent: usize },

    /// The network interface was asked to change state.
    NetworkRequested(bool),

    /// A configuration command carried an unsupported parameter or value.
    ConfigRejected(&'static str),

    /// A temperature query named an instance no probe is mapped to.
    InstanceUnmapped(u8),
}
