//! Object-safe view of a link

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use super::events::EventSink;
use super::fpga::FpgaLink;
use super::state::LinkStatus;
use crate::error::Result;
use crate::protocol::{Request, Response};
use crate::transport::Transport;

/// The verb set of [`FpgaLink`] without its type parameters
///
/// Lets hosts hold links built from different backends behind one
/// `Box<dyn LinkDevice>`.
pub trait LinkDevice {
    /// Cached status
    fn status(&self) -> LinkStatus;

    /// Whether the board has a status line
    fn has_status_line(&self) -> bool;

    /// Reset the peripheral and sample its status once
    fn reset_peripheral(&mut self) -> Result<LinkStatus>;

    /// Reset the peripheral and wait up to `timeout` for it to configure
    fn reset_and_await(&mut self, timeout: Duration) -> Result<LinkStatus>;

    /// Sample the status line
    fn poll_status(&mut self) -> Result<LinkStatus>;

    /// Run one gated transaction
    fn transact(&mut self, request: &Request) -> Result<Response>;

    /// Read the identification byte
    fn read_id(&mut self) -> Result<u8>;

    /// Read one register
    fn read_register(&mut self, address: u8) -> Result<u8>;

    /// Write one register
    fn write_register(&mut self, address: u8, value: u8) -> Result<()>;

    /// Set the output pattern
    fn set_output_pattern(&mut self, value: u8) -> Result<()>;

    /// Send a no-op frame
    fn nop(&mut self) -> Result<()>;
}

impl<T, RST, STS, D, S> LinkDevice for FpgaLink<T, RST, STS, D, S>
where
    T: Transport,
    RST: OutputPin,
    STS: InputPin,
    D: DelayNs,
    S: EventSink,
{
    fn status(&self) -> LinkStatus {
        FpgaLink::status(self)
    }

    fn has_status_line(&self) -> bool {
        FpgaLink::has_status_line(self)
    }

    fn reset_peripheral(&mut self) -> Result<LinkStatus> {
        FpgaLink::reset_peripheral(self)
    }

    fn reset_and_await(&mut self, timeout: Duration) -> Result<LinkStatus> {
        FpgaLink::reset_and_await(self, timeout)
    }

    fn poll_status(&mut self) -> Result<LinkStatus> {
        FpgaLink::poll_status(self)
    }

    fn transact(&mut self, request: &Request) -> Result<Response> {
        FpgaLink::transact(self, request)
    }

    fn read_id(&mut self) -> Result<u8> {
        FpgaLink::read_id(self)
    }

    fn read_register(&mut self, address: u8) -> Result<u8> {
        FpgaLink::read_register(self, address)
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        FpgaLink::write_register(self, address, value)
    }

    fn set_output_pattern(&mut self, value: u8) -> Result<()> {
        FpgaLink::set_output_pattern(self, value)
    }

    fn nop(&mut self) -> Result<()> {
        FpgaLink::nop(self)
    }
}

#[cfg(feature = "alloc")]
impl<L: LinkDevice + ?Sized> LinkDevice for alloc::boxed::Box<L> {
    fn status(&self) -> LinkStatus {
        (**self).status()
    }

    fn has_status_line(&self) -> bool {
        (**self).has_status_line()
    }

    fn reset_peripheral(&mut self) -> Result<LinkStatus> {
        (**self).reset_peripheral()
    }

    fn reset_and_await(&mut self, timeout: Duration) -> Result<LinkStatus> {
        (**self).reset_and_await(timeout)
    }

    fn poll_status(&mut self) -> Result<LinkStatus> {
        (**self).poll_status()
    }

    fn transact(&mut self, request: &Request) -> Result<Response> {
        (**self).transact(request)
    }

    fn read_id(&mut self) -> Result<u8> {
        (**self).read_id()
    }

    fn read_register(&mut self, address: u8) -> Result<u8> {
        (**self).read_register(address)
    }

    fn write_register(&mut self, address: u8, value: u8) -> Result<()> {
        (**self).write_register(address, value)
    }

    fn set_output_pattern(&mut self, value: u8) -> Result<()> {
        (**self).set_output_pattern(value)
    }

    fn nop(&mut self) -> Result<()> {
        (**self).nop()
    }
}
