//! Event rendering through `log`

use fpgalink_core::link::{EventSink, LinkEvent, LinkStatus};
use fpgalink_core::Error;

/// Sink that reports link events through the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::ResetStarted => log::info!("Resetting peripheral..."),
            LinkEvent::ResetResult(LinkStatus::Configured) => {
                log::info!("Peripheral configured")
            }
            LinkEvent::ResetResult(status) => {
                log::warn!("Peripheral not configured after reset ({})", status)
            }
            LinkEvent::StatusLost => log::warn!("Peripheral lost its configuration"),
            LinkEvent::CommandFailed {
                opcode: Some(opcode),
                reason: Error::LinkNotReady,
            } => log::warn!("{}: link not ready, reset the peripheral first", opcode),
            LinkEvent::CommandFailed {
                opcode: Some(opcode),
                reason,
            } => log::error!("{} failed: {}", opcode, reason),
            LinkEvent::CommandFailed {
                opcode: None,
                reason,
            } => log::error!("Reset failed: {}", reason),
        }
    }
}
