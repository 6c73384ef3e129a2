//! fpgalink-linux-gpio - Linux GPIO link support
//!
//! This crate drives an FPGA link from plain GPIO lines using the Linux
//! character device interface (gpiocdev). It provides two things:
//!
//! - a complete bit-banged link: chip select, clock and data lines through
//!   the core's `BitbangTransport`, plus reset and status
//! - reset and status lines alone, for backends that have a hardware SPI
//!   controller but still need GPIO for the control lines
//!
//! # Usage with fpgalink CLI
//!
//! ```bash
//! # All lines given on the command line
//! fpgalink id -p linux_gpio:gpiochip=0,cs=8,sck=11,mosi=10,miso=9,reset=24,status=25
//!
//! # Board without a status line, slower clock (kHz)
//! fpgalink reset -p linux_gpio:dev=/dev/gpiochip0,cs=8,sck=11,mosi=10,miso=9,reset=24,status=absent,spispeed=500
//!
//! # Lines from a board file, one of them overridden
//! fpgalink pattern 0x0F -p linux_gpio:reset=17 --board upduino.toml
//! ```
//!
//! # GPIO Pin Wiring
//!
//! | FPGA side        | Direction | Description                        |
//! |------------------|-----------|------------------------------------|
//! | SPI_SS           | output    | Chip select, active low            |
//! | SPI_SCK          | output    | Serial clock                       |
//! | SPI_SI           | output    | Controller data out                |
//! | SPI_SO           | input     | Controller data in                 |
//! | CRESET_B         | output    | Reset, active low by default       |
//! | CDONE            | input     | Configuration done, optional       |
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

use fpgalink_core::config::toml::BoardConfig;
use fpgalink_core::link::{EventSink, LinkDevice};

// Re-exports
pub use device::{
    apply_link_option, open, open_control_lines, parse_options, parse_status_option,
    resolve_device, ControlLines, GpioLine, LineError, LinuxGpioConfig, LinuxGpioLink,
};
pub use error::{LinuxGpioError, Result};

/// Open a GPIO link and return it boxed
///
/// This is a convenience function for use in the CLI backend dispatch.
/// See [`parse_options`] for the recognised options.
pub fn open_linux_gpio<S>(
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
