//! fpgalink-linux-spi - Linux spidev link support
//!
//! This crate runs the link over a hardware SPI controller through the
//! Linux spidev interface (`/dev/spidevX.Y`). The kernel handles chip
//! select; the reset and status lines still come from a GPIO chip.
//!
//! # Usage with fpgalink CLI
//!
//! ```bash
//! # Basic usage
//! fpgalink id -p linux_spi:dev=/dev/spidev0.0,gpiochip=0,reset=24,status=25
//!
//! # With clock speed (in kHz) and mode
//! fpgalink read-reg 0x05 -p linux_spi:dev=/dev/spidev0.0,gpiochip=0,reset=24,status=absent,spispeed=1000,mode=3
//! ```
//!
//! # System Requirements
//!
//! - Linux kernel with spidev support
//! - Access to `/dev/spidevX.Y` and `/dev/gpiochipN` (may require root or udev rules)

pub mod device;
pub mod error;

use fpgalink_core::config::toml::BoardConfig;
use fpgalink_core::link::{EventSink, LinkDevice};

// Re-exports
pub use device::{open, parse_options, LinuxSpi, LinuxSpiConfig, LinuxSpiLink};
pub use error::{LinuxSpiError, Result};

/// Open a spidev link and return it boxed
///
/// This is a convenience function for use in the CLI backend dispatch.
/// See [`parse_options`] for the recognised options.
pub fn open_linux_spi<S>(
    options: &[(&str, &str)],
    board: Option<&BoardConfig>,
    sink: S,
) -> std::result::Result<Box<dyn LinkDevice + Send>, Box<dyn std::error::Error>>
where
    S: EventSink + Send + 'static,
{
    let config = parse_options(options, board)?;
    let link = open(&config)?;
    Ok(Box::new(link.with_sink(sink)))
}
