//! Scoped chip-select assertion

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use super::pin_fault;
use crate::error::Result;

/// Asserted chip select (active low)
///
/// Creating the guard drives CS low and waits the settle time. Dropping it
/// waits the settle time, drives CS high and waits again, so the frame is
/// closed on every exit path including early `?` returns. The guard also
/// lends out the delay provider for clocking in between.
pub struct ChipSelect<'a, CS: OutputPin, D: DelayNs> {
    cs: &'a mut CS,
    delay: &'a mut D,
    settle_ns: u32,
}

impl<'a, CS: OutputPin, D: DelayNs> ChipSelect<'a, CS, D> {
    /// Assert CS and wait `settle_ns`
    pub fn assert(cs: &'a mut CS, delay: &'a mut D, settle_ns: u32) -> Result<Self> {
        if let Err(e) = cs.set_low() {
            // Half-driven is worse than idle
            let _ = cs.set_high();
            return Err(pin_fault("chip-select")(e));
        }
        delay.delay_ns(settle_ns);
        Ok(Self {
            cs,
            delay,
            settle_ns,
        })
    }

    /// Delay provider, for use while the frame is open
    pub fn delay(&mut self) -> &mut D {
        self.delay
    }
}

impl<CS: OutputPin, D: DelayNs> Drop for ChipSelect<'_, CS, D> {
    fn drop(&mut self) {
        self.delay.delay_ns(self.settle_ns);
        if let Err(e) = self.cs.set_high() {
            log::error!("failed to deassert chip-select: {:?}", e);
        }
        self.delay.delay_ns(self.settle_ns);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::mock::{Event, MockDelay, MockOutput, Trace};

    fn body(guard: &mut ChipSelect<'_, MockOutput, MockDelay>, fail: bool) -> Result<()> {
        guard.delay().delay_ns(7);
        if fail {
            return Err(Error::TransferFailed);
        }
        Ok(())
    }

    #[test]
    fn test_brackets_with_settle() {
        let trace = Trace::default();
        let mut cs = MockOutput::new("cs", &trace, true);
        let mut delay = MockDelay::new(&trace);
        {
            let mut guard = ChipSelect::assert(&mut cs, &mut delay, 1000).unwrap();
            body(&mut guard, false).unwrap();
        }
        assert_eq!(
            trace.events(),
            [
                Event::Set("cs", false),
                Event::Delay(1000),
                Event::Delay(7),
                Event::Delay(1000),
                Event::Set("cs", true),
                Event::Delay(1000),
            ]
        );
    }

    #[test]
    fn test_deasserts_on_error_path() {
        let trace = Trace::default();
        let mut cs = MockOutput::new("cs", &trace, true);
        let level = cs.level.clone();
        let mut delay = MockDelay::new(&trace);

        let result = (|| {
            let mut guard = ChipSelect::assert(&mut cs, &mut delay, 10)?;
            body(&mut guard, true)
        })();
        assert_eq!(result, Err(Error::TransferFailed));
        assert!(level.get());
        assert_eq!(trace.sets("cs"), [false, true]);
    }

    #[test]
    fn test_assert_failure_is_pin_fault() {
        let trace = Trace::default();
        let mut cs = MockOutput::new("cs", &trace, true);
        cs.fail.set(true);
        let mut delay = MockDelay::new(&trace);
        assert!(matches!(
            ChipSelect::assert(&mut cs, &mut delay, 10),
            Err(Error::PinFault)
        ));
        assert!(trace.events().is_empty());
    }
}
