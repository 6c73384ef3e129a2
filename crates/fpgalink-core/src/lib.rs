//! fpgalink-core - Core library for a controller-to-FPGA command link
//!
//! This crate provides the protocol layer between a host controller and a
//! configurable peripheral (an FPGA) sharing a synchronous serial bus with
//! auxiliary reset and configuration-status lines. It is designed to be
//! `no_std` compatible for use on the microcontroller side of such boards.
//!
//! The pieces, leaf-first:
//!
//! - [`transport`] - chip-select bracketed full-duplex byte exchange
//! - [`link::LinkState`] - reset sequencing and configuration tracking
//! - [`protocol::CommandFramer`] - opcode table and byte-level framing
//! - [`link::FpgaLink`] - the owning composition with gated verbs
//!
//! # Features
//!
//! - `std` - Enable standard library support (includes `alloc`), TOML board
//!   files and a sleeping delay provider
//! - `alloc` - Enable boxed trait objects for transports and devices
//!
//! # Example
//!
//! ```ignore
//! use fpgalink_core::link::{FpgaLink, LinkState, StatusInput};
//! use fpgalink_core::config::LinkConfig;
//!
//! let config = LinkConfig::default();
//! let state = LinkState::new(reset_pin, StatusInput::Wired(cdone_pin), delay, &config)?;
//! let mut link = FpgaLink::open(&config, transport, state);
//!
//! link.reset_peripheral()?;
//! let id = link.read_id()?;
//! link.write_register(0x05, 0xAA)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod config;
pub mod error;
pub mod link;
pub mod protocol;
pub mod transport;

#[cfg(feature = "std")]
pub mod delay;

#[cfg(test)]
#[allow(dead_code)]
mod mock;

pub use error::{Error, Result};
pub use link::{FpgaLink, LinkDevice, LinkState, LinkStatus, StatusInput};
pub use protocol::{CommandFramer, Opcode, Request, Response};
pub use transport::Transport;
