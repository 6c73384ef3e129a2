//! Bit-banged transport over four GPIO lines
//!
//! Clocks MSB-first in any of the four SPI modes. The half period is
//! derived from the configured clock rate; at the default 10 MHz it is
//! 50 ns, which most GPIO backends cannot actually reach, so the effective
//! rate is whatever the pins allow.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::{Mode, Phase, Polarity};

use super::select::ChipSelect;
use super::{check_frame, pin_fault, Transport};
use crate::config::LinkConfig;
use crate::error::{Error, Result};

/// Optional bus arbitration hook
///
/// Boards that share the data lines with another master implement this to
/// request and hand back the bus around each frame.
pub trait BusClaim {
    /// Claim the bus, or fail with [`Error::BusBusy`] without side effects
    fn claim(&mut self) -> Result<()>;

    /// Hand the bus back
    fn release(&mut self) {}
}

/// Default claim: the bus is never contended
#[derive(Debug, Clone, Copy, Default)]
pub struct Exclusive;

impl BusClaim for Exclusive {
    fn claim(&mut self) -> Result<()> {
        Ok(())
    }
}

/// The four serial lines
#[derive(Debug)]
pub struct BitbangPins<CS, SCK, MOSI, MISO> {
    /// Chip select (active low)
    pub cs: CS,
    /// Clock
    pub sck: SCK,
    /// Controller data out
    pub mosi: MOSI,
    /// Controller data in
    pub miso: MISO,
}

/// Software SPI transport
pub struct BitbangTransport<CS, SCK, MOSI, MISO, D, C = Exclusive> {
    cs: CS,
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
    delay: D,
    claim: C,
    mode: Mode,
    half_period_ns: u32,
    settle_ns: u32,
}

impl<CS, SCK, MOSI, MISO, D> BitbangTransport<CS, SCK, MOSI, MISO, D, Exclusive>
where
    CS: OutputPin,
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
{
    /// Build a transport from its lines and the link configuration
    ///
    /// Drives CS inactive and SCK to its idle level. Fails with
    /// [`Error::InvalidConfig`] for a zero clock rate.
    pub fn new(pins: BitbangPins<CS, SCK, MOSI, MISO>, delay: D, config: &LinkConfig) -> Result<Self> {
        if config.clock_hz == 0 {
            log::error!("bitbang transport needs a non-zero clock rate");
            return Err(Error::InvalidConfig);
        }
        let BitbangPins {
            mut cs,
            mut sck,
            mosi,
            miso,
        } = pins;

        cs.set_high().map_err(pin_fault("chip-select"))?;
        drive(&mut sck, config.mode.polarity == Polarity::IdleHigh, "clock")?;

        Ok(Self {
            cs,
            sck,
            mosi,
            miso,
            delay,
            claim: Exclusive,
            mode: config.mode,
            half_period_ns: (500_000_000 / config.clock_hz).max(1),
            settle_ns: config.select_settle_ns,
        })
    }
}

impl<CS, SCK, MOSI, MISO, D, C> BitbangTransport<CS, SCK, MOSI, MISO, D, C>
where
    CS: OutputPin,
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
    C: BusClaim,
{
    /// Replace the bus-claim hook
    pub fn with_claim<C2: BusClaim>(self, claim: C2) -> BitbangTransport<CS, SCK, MOSI, MISO, D, C2> {
        BitbangTransport {
            cs: self.cs,
            sck: self.sck,
            mosi: self.mosi,
            miso: self.miso,
            delay: self.delay,
            claim,
            mode: self.mode,
            half_period_ns: self.half_period_ns,
            settle_ns: self.settle_ns,
        }
    }

    fn clock_frame(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        let Self {
            cs,
            sck,
            mosi,
            miso,
            delay,
            mode,
            half_period_ns,
            settle_ns,
            ..
        } = self;

        drive(sck, mode.polarity == Polarity::IdleHigh, "clock")?;
        let mut select = ChipSelect::assert(cs, delay, *settle_ns)?;
        for (out, slot) in write.iter().zip(read.iter_mut()) {
            *slot = shift_byte(sck, mosi, miso, select.delay(), *out, *mode, *half_period_ns)?;
        }
        Ok(())
    }
}

impl<CS, SCK, MOSI, MISO, D, C> Transport for BitbangTransport<CS, SCK, MOSI, MISO, D, C>
where
    CS: OutputPin,
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
    C: BusClaim,
{
    fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        check_frame(write, read)?;
        self.claim.claim()?;
        let result = self.clock_frame(write, read);
        self.claim.release();
        result
    }
}

fn drive<P: OutputPin>(pin: &mut P, high: bool, line: &'static str) -> Result<()> {
    if high {
        pin.set_high().map_err(pin_fault(line))
    } else {
        pin.set_low().map_err(pin_fault(line))
    }
}

/// Shift one byte out and one byte in, MSB first
///
/// CPHA=0: data is set up half a period before the leading edge and sampled
/// on it. CPHA=1: data changes on the leading edge and is sampled on the
/// trailing edge. SCK is back at its idle level when this returns.
fn shift_byte<SCK, MOSI, MISO, D>(
    sck: &mut SCK,
    mosi: &mut MOSI,
    miso: &mut MISO,
    delay: &mut D,
    out: u8,
    mode: Mode,
    half_period_ns: u32,
) -> Result<u8>
where
    SCK: OutputPin,
    MOSI: OutputPin,
    MISO: InputPin,
    D: DelayNs,
{
    let idle = mode.polarity == Polarity::IdleHigh;
    let mut value = 0u8;

    for bit in (0..8).rev() {
        let out_bit = out & (1 << bit) != 0;
        let sampled = match mode.phase {
            Phase::CaptureOnFirstTransition => {
                drive(mosi, out_bit, "data-out")?;
                delay.delay_ns(half_period_ns);
                drive(sck, !idle, "clock")?;
                let sampled = miso.is_high().map_err(pin_fault("data-in"))?;
                delay.delay_ns(half_period_ns);
                drive(sck, idle, "clock")?;
                sampled
            }
            Phase::CaptureOnSecondTransition => {
                drive(sck, !idle, "clock")?;
                drive(mosi, out_bit, "data-out")?;
                delay.delay_ns(half_period_ns);
                drive(sck, idle, "clock")?;
                let sampled = miso.is_high().map_err(pin_fault("data-in"))?;
                delay.delay_ns(half_period_ns);
                sampled
            }
        };
        value = (value << 1) | sampled as u8;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Event, MockDelay, MockInput, MockOutput, Trace};
    use embedded_hal::spi::{MODE_0, MODE_1, MODE_2, MODE_3};
    use std::vec::Vec;

    type Mock = BitbangTransport<MockOutput, MockOutput, MockOutput, MockInput, MockDelay>;

    impl<CS, SCK, MOSI, MISO, D, C> BitbangTransport<CS, SCK, MOSI, MISO, D, C> {
        fn half_period_ns(&self) -> u32 {
            self.half_period_ns
        }
    }

    fn transport(trace: &Trace, mode: Mode) -> (Mock, MockInput) {
        let miso = MockInput::default();
        let pins = BitbangPins {
            cs: MockOutput::new("cs", trace, true),
            sck: MockOutput::new("sck", trace, false),
            mosi: MockOutput::new("mosi", trace, false),
            miso: miso.clone(),
        };
        let config = LinkConfig {
            mode,
            ..LinkConfig::default()
        };
        let t = BitbangTransport::new(pins, MockDelay::new(trace), &config).unwrap();
        trace.clear();
        (t, miso)
    }

    /// Reassemble the byte seen on MOSI at each leading (CPHA=0) or trailing
    /// (CPHA=1) clock edge
    fn sampled_mosi(trace: &Trace, mode: Mode) -> Vec<u8> {
        let idle = mode.polarity == Polarity::IdleHigh;
        let sample_level = match mode.phase {
            Phase::CaptureOnFirstTransition => !idle,
            Phase::CaptureOnSecondTransition => idle,
        };
        let mut mosi = false;
        let mut selected = false;
        let mut bits = Vec::new();
        for event in trace.events() {
            match event {
                Event::Set("cs", level) => selected = !level,
                Event::Set("mosi", level) => mosi = level,
                Event::Set("sck", level) if selected && level == sample_level => bits.push(mosi),
                _ => {}
            }
        }
        bits.chunks(8)
            .map(|c| c.iter().fold(0u8, |acc, b| (acc << 1) | *b as u8))
            .collect()
    }

    #[test]
    fn test_half_period_from_clock() {
        let trace = Trace::default();
        let (t, _) = transport(&trace, MODE_0);
        assert_eq!(t.half_period_ns(), 50);
    }

    #[test]
    fn test_zero_clock_rejected() {
        let trace = Trace::default();
        let pins = BitbangPins {
            cs: MockOutput::new("cs", &trace, true),
            sck: MockOutput::new("sck", &trace, false),
            mosi: MockOutput::new("mosi", &trace, false),
            miso: MockInput::default(),
        };
        let config = LinkConfig {
            clock_hz: 0,
            ..LinkConfig::default()
        };
        assert!(matches!(
            BitbangTransport::new(pins, MockDelay::new(&trace), &config),
            Err(Error::InvalidConfig)
        ));
    }

    #[test]
    fn test_all_modes_clock_msb_first() {
        for mode in [MODE_0, MODE_1, MODE_2, MODE_3] {
            let trace = Trace::default();
            let (mut t, miso) = transport(&trace, mode);
            miso.queue_byte(0xC3);
            miso.queue_byte(0x5A);

            let mut read = [0u8; 2];
            t.exchange(&[0x02, 0x81], &mut read).unwrap();

            assert_eq!(read, [0xC3, 0x5A], "{:?}", mode);
            assert_eq!(sampled_mosi(&trace, mode), [0x02, 0x81], "{:?}", mode);

            // Clock idles at the polarity level after the frame
            let idle = mode.polarity == Polarity::IdleHigh;
            assert_eq!(trace.sets("sck").last(), Some(&idle));
        }
    }

    #[test]
    fn test_select_brackets_whole_frame() {
        let trace = Trace::default();
        let (mut t, _) = transport(&trace, MODE_0);
        let mut read = [0u8; 3];
        t.exchange(&[0x03, 0x00, 0x00], &mut read).unwrap();

        let events = trace.events();
        let first_cs = events.iter().position(|e| *e == Event::Set("cs", false));
        let last_cs = events.iter().rposition(|e| *e == Event::Set("cs", true));
        let first_clk = events.iter().position(|e| matches!(e, Event::Set("sck", true)));
        let last_clk = events.iter().rposition(|e| matches!(e, Event::Set("sck", _)));
        assert!(first_cs < first_clk);
        assert!(last_clk < last_cs);
        assert_eq!(trace.sets("cs"), [false, true]);
    }

    #[test]
    fn test_miso_fault_still_deasserts() {
        let trace = Trace::default();
        let (mut t, miso) = transport(&trace, MODE_0);
        miso.fail.set(true);
        let mut read = [0u8; 1];
        assert_eq!(t.exchange(&[0x01], &mut read), Err(Error::PinFault));
        assert_eq!(trace.sets("cs"), [false, true]);
    }

    struct Busy;

    impl BusClaim for Busy {
        fn claim(&mut self) -> Result<()> {
            Err(Error::BusBusy)
        }
    }

    #[test]
    fn test_busy_claim_never_selects() {
        let trace = Trace::default();
        let (t, _) = transport(&trace, MODE_0);
        let mut t = t.with_claim(Busy);
        let mut read = [0u8; 1];
        assert_eq!(t.exchange(&[0x01], &mut read), Err(Error::BusBusy));
        assert!(trace.events().is_empty());
    }
}
