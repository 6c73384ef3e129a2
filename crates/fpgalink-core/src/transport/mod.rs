//! Chip-select bracketed byte exchange
//!
//! A [`Transport`] performs one full-duplex exchange per call: assert
//! select, clock `N` bytes out MSB-first while clocking `N` bytes in,
//! deassert select. The select bracket covers the whole frame on every exit
//! path; implementations get that from the [`ChipSelect`] guard.
//!
//! Implementations in this crate:
//!
//! - [`BitbangTransport`] - four `embedded-hal` pins, any SPI mode
//! - [`SpiBusTransport`] - a shared `embedded_hal::spi::SpiBus` plus a CS pin

mod bitbang;
mod select;
mod spi_bus;

pub use bitbang::{BitbangPins, BitbangTransport, BusClaim, Exclusive};
pub use select::ChipSelect;
pub use spi_bus::SpiBusTransport;

use crate::error::{Error, Result};

/// Raw synchronous serial exchange
///
/// The caller owns the transport exclusively for the duration of a call.
/// On [`Error::BusBusy`] no bytes were exchanged; any other error may have
/// happened mid-frame, but select is deasserted either way.
pub trait Transport {
    /// Clock `write` out while filling `read` with the bytes clocked in
    ///
    /// Both slices must have the same, non-zero length.
    fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        (**self).exchange(write, read)
    }
}

#[cfg(feature = "alloc")]
impl<T: Transport + ?Sized> Transport for alloc::boxed::Box<T> {
    fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        (**self).exchange(write, read)
    }
}

/// Validate an exchange's buffers
///
/// Shared by every implementation so that none of them touches the select
/// line for a request that could never be a valid frame.
pub fn check_frame(write: &[u8], read: &[u8]) -> Result<()> {
    if write.is_empty() || write.len() != read.len() {
        return Err(Error::MalformedRequest);
    }
    Ok(())
}

/// Map a HAL pin error to [`Error::PinFault`]
pub(crate) fn pin_fault<E: core::fmt::Debug>(line: &'static str) -> impl FnOnce(E) -> Error {
    move |e| {
        log::error!("{} line fault: {:?}", line, e);
        Error::PinFault
    }
}
