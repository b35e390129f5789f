//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured node events to the
//! ESP-IDF logger (which goes to the USB-CDC console in production, never
//! to the RS485 UART).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] as one `TAG | key=value` line.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started {
                device_id,
                baud_rate,
            } => {
                info!("BUS | started device={} baud={}", device_id, baud_rate);
            }
            AppEvent::CommandReceived(kind) => {
                info!("RX | command={}", kind);
            }
            AppEvent::ReplySent { kind, attempts } => {
                info!("TX | reply={} attempts={}", kind, attempts);
            }
            AppEvent::ReplyAbandoned { kind, error } => {
                warn!("TX | reply={} abandoned error=\"{}\"", kind, error);
            }
            AppEvent::TelegramSent {
                instance,
                temperature,
            } => {
                info!(
                    "CYCLE | telegram instance={} value={}.{}{}",
                    instance,
                    temperature.whole,
                    temperature.fraction,
                    if temperature.is_fault() { " (fault)" } else { "" }
                );
            }
            AppEvent::CycleStarted { sensors } => {
                info!("CYCLE | started sensors={}", sensors);
            }
            AppEvent::CycleFinished { sent } => {
                info!("CYCLE | finished sent={}", sent);
            }
            AppEvent::NetworkRequested(enabled) => {
                info!("NET | requested enabled={}", enabled);
            }
            AppEvent::ConfigRejected(reason) => {
                info!("CFG | rejected reason=\"{}\"", reason);
            }
            AppEvent::InstanceUnmapped(instance) => {
                info!("RX | unmapped instance={}", instance);
            }
        }
    }
}
