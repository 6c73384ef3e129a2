//! Error types for the Linux GPIO backend

use thiserror::Error;

/// Linux GPIO specific errors
#[derive(Debug, Error)]
pub enum LinuxGpioError {
    /// Failed to request GPIO lines
    #[error("Failed to request GPIO lines on '{path}': {source}")]
    LineRequestFailed {
        path: String,
        #[source]
        source: gpiocdev::Error,
    },

    /// GPIO chip or device not specified
    #[error("No GPIO chip specified. Use dev=/dev/gpiochipN or gpiochip=N")]
    NoDevice,

    /// The same line was given for two functions
    #[error("GPIO line {0} is assigned more than once")]
    DuplicateLine(u32),

    /// The link rejected its configuration or failed to initialise
    #[error("Link setup failed: {0}")]
    Link(#[from] fpgalink_core::Error),
}

/// Result type for Linux GPIO operations
pub type Result<T> = std::result::Result<T, LinuxGpioError>;
