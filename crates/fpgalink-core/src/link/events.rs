//! Structured link events
//!
//! The link reports what happened; rendering is up to the sink.

use super::LinkStatus;
use crate::error::Error;
use crate::protocol::Opcode;

/// Something worth reporting about the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// A reset sequence is starting
    ResetStarted,
    /// A reset sequence finished with this status
    ResetResult(LinkStatus),
    /// A poll found the peripheral no longer configured
    StatusLost,
    /// A verb failed
    CommandFailed {
        /// Opcode of the failed transaction, `None` for reset
        opcode: Option<Opcode>,
        /// Why it failed
        reason: Error,
    },
}

/// Receiver for [`LinkEvent`]s
pub trait EventSink {
    /// Handle one event
    fn emit(&mut self, event: LinkEvent);
}

/// Sink that drops everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: LinkEvent) {}
}

#[cfg(feature = "alloc")]
impl EventSink for alloc::vec::Vec<LinkEvent> {
    fn emit(&mut self, event: LinkEvent) {
        self.push(event);
    }
}

impl<S: EventSink + ?Sized> EventSink for &mut S {
    fn emit(&mut self, event: LinkEvent) {
        (**self).emit(event);
    }
}
