//! Transport over a shared hardware SPI bus

use core::cell::RefCell;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use super::select::ChipSelect;
use super::{check_frame, pin_fault, Transport};
use crate::config::LinkConfig;
use crate::error::{Error, Result};

/// Hardware SPI transport with a GPIO chip select
///
/// The bus is shared through a `RefCell` with whatever else lives on it.
/// If the bus is already borrowed when a frame starts, the exchange fails
/// with [`Error::BusBusy`] before CS is touched. Clock rate and mode are
/// properties of the bus and must be configured by the caller.
pub struct SpiBusTransport<'a, B, CS, D> {
    bus: &'a RefCell<B>,
    cs: CS,
    delay: D,
    settle_ns: u32,
}

impl<'a, B, CS, D> SpiBusTransport<'a, B, CS, D>
where
    B: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    /// Bind a bus and a chip-select line, driving CS inactive
    pub fn new(bus: &'a RefCell<B>, mut cs: CS, delay: D, config: &LinkConfig) -> Result<Self> {
        cs.set_high().map_err(pin_fault("chip-select"))?;
        Ok(Self {
            bus,
            cs,
            delay,
            settle_ns: config.select_settle_ns,
        })
    }
}

impl<B, CS, D> Transport for SpiBusTransport<'_, B, CS, D>
where
    B: SpiBus,
    CS: OutputPin,
    D: DelayNs,
{
    fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        check_frame(write, read)?;
        let mut bus = self.bus.try_borrow_mut().map_err(|_| {
            log::debug!("SPI bus already in use");
            Error::BusBusy
        })?;

        // Dropped before `bus`, so CS rises while the bus is still held
        let _select = ChipSelect::assert(&mut self.cs, &mut self.delay, self.settle_ns)?;
        bus.transfer(read, write).map_err(|e| {
            log::error!("SPI transfer failed: {:?}", e);
            Error::TransferFailed
        })?;
        bus.flush().map_err(|e| {
            log::error!("SPI flush failed: {:?}", e);
            Error::TransferFailed
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockOutput, Trace};
    use embedded_hal::spi::{ErrorKind, ErrorType};
    use std::vec::Vec;

    #[derive(Debug)]
    struct BusError;

    impl embedded_hal::spi::Error for BusError {
        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    /// Bus that answers every byte with its bitwise inverse
    #[derive(Default)]
    struct InvertingBus {
        written: Vec<u8>,
        fail: bool,
    }

    impl ErrorType for InvertingBus {
        type Error = BusError;
    }

    impl SpiBus for InvertingBus {
        fn read(&mut self, words: &mut [u8]) -> core::result::Result<(), BusError> {
            words.fill(0xFF);
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> core::result::Result<(), BusError> {
            self.written.extend_from_slice(words);
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> core::result::Result<(), BusError> {
            if self.fail {
                return Err(BusError);
            }
            self.written.extend_from_slice(write);
            for (r, w) in read.iter_mut().zip(write) {
                *r = !w;
            }
            Ok(())
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> core::result::Result<(), BusError> {
            for w in words.iter_mut() {
                *w = !*w;
            }
            Ok(())
        }

        fn flush(&mut self) -> core::result::Result<(), BusError> {
            Ok(())
        }
    }

    #[test]
    fn test_exchange_full_duplex() {
        let trace = Trace::default();
        let bus = RefCell::new(InvertingBus::default());
        let cs = MockOutput::new("cs", &trace, true);
        let mut t = SpiBusTransport::new(&bus, cs, MockDelay::new(&trace), &LinkConfig::default())
            .unwrap();

        let mut read = [0u8; 2];
        t.exchange(&[0x10, 0x0F], &mut read).unwrap();
        assert_eq!(read, [0xEF, 0xF0]);
        assert_eq!(bus.borrow().written, [0x10, 0x0F]);
        assert_eq!(trace.sets("cs"), [true, false, true]);
    }

    #[test]
    fn test_borrowed_bus_is_busy() {
        let trace = Trace::default();
        let bus = RefCell::new(InvertingBus::default());
        let cs = MockOutput::new("cs", &trace, true);
        let mut t = SpiBusTransport::new(&bus, cs, MockDelay::new(&trace), &LinkConfig::default())
            .unwrap();
        trace.clear();

        let _held = bus.borrow_mut();
        let mut read = [0u8; 1];
        assert_eq!(t.exchange(&[0x01], &mut read), Err(Error::BusBusy));
        assert!(trace.sets("cs").is_empty());
    }

    #[test]
    fn test_transfer_failure_deasserts() {
        let trace = Trace::default();
        let bus = RefCell::new(InvertingBus {
            fail: true,
            ..Default::default()
        });
        let cs = MockOutput::new("cs", &trace, true);
        let level = cs.level.clone();
        let mut t = SpiBusTransport::new(&bus, cs, MockDelay::new(&trace), &LinkConfig::default())
            .unwrap();
        trace.clear();

        let mut read = [0u8; 1];
        assert_eq!(t.exchange(&[0x01], &mut read), Err(Error::TransferFailed));
        assert_eq!(trace.sets("cs"), [false, true]);
        assert!(level.get());
    }
}
