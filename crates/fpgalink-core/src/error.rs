//! Error types for fpgalink-core
//!
//! This module provides a no_std compatible error type that is shared by the
//! transports, the link state machine and the framer. None of these errors
//! is retried inside the core; retry policy belongs to the caller.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Bus errors
    /// The serial bus could not be claimed; no bytes were exchanged
    BusBusy,
    /// The bus was claimed but the exchange itself failed
    TransferFailed,

    // Link errors
    /// A verb was attempted while the peripheral is not configured
    LinkNotReady,
    /// A bounded wait expired
    Timeout,

    // Caller errors
    /// The request does not match its opcode's frame layout
    MalformedRequest,
    /// Configuration was rejected at construction
    InvalidConfig,

    // Line errors
    /// A select, reset or status line could not be driven or sampled
    PinFault,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BusBusy => write!(f, "serial bus is busy"),
            Self::TransferFailed => write!(f, "serial transfer failed"),
            Self::LinkNotReady => write!(f, "FPGA link not ready (peripheral not configured)"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::MalformedRequest => write!(f, "malformed request for opcode"),
            Self::InvalidConfig => write!(f, "invalid link configuration"),
            Self::PinFault => write!(f, "control line fault"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
