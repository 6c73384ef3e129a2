//! Peripheral lifecycle: reset sequencing and configuration tracking

use core::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};

use crate::config::{ControlLevels, LinkConfig, LinkTiming};
use crate::error::{Error, Result};
use crate::transport::pin_fault;

/// Lifecycle of the peripheral as seen by the controller
///
/// ```text
///                 reset()
/// Unconfigured ─────────────► Resetting ──► Configured ──poll()──► Lost
///      ▲                          │              │                   │
///      └──────────────────────────┘              └───── reset() ◄────┘
/// ```
///
/// `Resetting` only exists while a reset sequence runs. `Lost` stays until
/// the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// Not configured, or never reset
    Unconfigured,
    /// Reset sequence in progress
    Resetting,
    /// Status line reports a loaded configuration
    Configured,
    /// Was configured, status line has since dropped
    Lost,
}

impl core::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Unconfigured => "unconfigured",
            Self::Resetting => "resetting",
            Self::Configured => "configured",
            Self::Lost => "lost configuration",
        })
    }
}

/// The configuration-status input, or its explicit absence
///
/// With `Absent` every sample reads as configured.
#[derive(Debug)]
pub enum StatusInput<P> {
    /// Status line present
    Wired(P),
    /// No status line on this board
    Absent,
}

/// Reset output, status input and the delays between them
pub struct LinkState<RST, STS, D> {
    reset: RST,
    status_in: StatusInput<STS>,
    delay: D,
    timing: LinkTiming,
    levels: ControlLevels,
    status: LinkStatus,
}

impl<RST, STS, D> LinkState<RST, STS, D>
where
    RST: OutputPin,
    STS: InputPin,
    D: DelayNs,
{
    /// Bind the control lines and drive reset inactive
    pub fn new(reset: RST, status_in: StatusInput<STS>, delay: D, config: &LinkConfig) -> Result<Self> {
        let mut state = Self {
            reset,
            status_in,
            delay,
            timing: config.timing,
            levels: config.levels,
            status: LinkStatus::Unconfigured,
        };
        state.drive_reset(false)?;
        Ok(state)
    }

    /// Last known status, without touching any line
    pub fn status(&self) -> LinkStatus {
        self.status
    }

    /// Whether a status line is wired
    pub fn has_status_line(&self) -> bool {
        matches!(self.status_in, StatusInput::Wired(_))
    }

    /// Run the reset sequence and sample the status line once
    ///
    /// Reset is always released before this returns, whatever happens in
    /// between. A line fault leaves the link `Unconfigured`.
    pub fn reset(&mut self) -> Result<LinkStatus> {
        self.pulse()?;
        let configured = self.sample().inspect_err(|_| {
            self.status = LinkStatus::Unconfigured;
        })?;
        self.status = if configured {
            LinkStatus::Configured
        } else {
            LinkStatus::Unconfigured
        };
        log::debug!("reset complete: {}", self.status);
        Ok(self.status)
    }

    /// Run the reset sequence, then wait up to `timeout` for the status line
    ///
    /// The line is sampled after the settle time and then every
    /// `ready_poll` interval. Fails with [`Error::Timeout`], leaving the link
    /// `Unconfigured`, if it never reads active.
    pub fn reset_with_timeout(&mut self, timeout: Duration) -> Result<LinkStatus> {
        self.pulse()?;
        let mut waited = Duration::ZERO;
        loop {
            let configured = self.sample().inspect_err(|_| {
                self.status = LinkStatus::Unconfigured;
            })?;
            if configured {
                self.status = LinkStatus::Configured;
                log::debug!("configured {:?} after reset release", self.timing.reset_settle + waited);
                return Ok(self.status);
            }
            if waited >= timeout {
                self.status = LinkStatus::Unconfigured;
                log::debug!("not configured within {:?}", timeout);
                return Err(Error::Timeout);
            }
            let step = self.timing.ready_poll.min(timeout - waited).max(Duration::from_micros(1));
            wait(&mut self.delay, step);
            waited += step;
        }
    }

    /// Sample the status line without touching reset
    ///
    /// Only `Configured` can change here, to `Lost`. A sampling fault is
    /// returned as [`Error::PinFault`] and leaves the status alone.
    pub fn poll(&mut self) -> Result<LinkStatus> {
        if self.status == LinkStatus::Configured && !self.sample()? {
            log::warn!("peripheral lost its configuration");
            self.status = LinkStatus::Lost;
        }
        Ok(self.status)
    }

    /// Read the status line level, mapped through its polarity
    ///
    /// Always `true` without a status line.
    pub fn sample(&mut self) -> Result<bool> {
        match &mut self.status_in {
            StatusInput::Absent => Ok(true),
            StatusInput::Wired(pin) => {
                let high = pin.is_high().map_err(pin_fault("status"))?;
                Ok(high == self.levels.status_active_high)
            }
        }
    }

    /// Assert, hold, release, settle
    fn pulse(&mut self) -> Result<()> {
        self.status = LinkStatus::Resetting;
        log::debug!("asserting reset for {:?}", self.timing.reset_hold);

        let asserted = self.drive_reset(true);
        if asserted.is_ok() {
            wait(&mut self.delay, self.timing.reset_hold);
        }
        let released = self.drive_reset(false);
        if let Err(e) = asserted.and(released) {
            self.status = LinkStatus::Unconfigured;
            return Err(e);
        }

        wait(&mut self.delay, self.timing.reset_settle);
        Ok(())
    }

    fn drive_reset(&mut self, active: bool) -> Result<()> {
        let high = active != self.levels.reset_active_low;
        let result = if high {
            self.reset.set_high()
        } else {
            self.reset.set_low()
        };
        result.map_err(pin_fault("reset"))
    }
}

/// Wait for `d` with the best resolution the delay offers
pub(crate) fn wait<D: DelayNs>(delay: &mut D, d: Duration) {
    let us = d.as_micros();
    if us == 0 {
        delay.delay_ns(d.subsec_nanos());
    } else {
        delay.delay_us(u32::try_from(us).unwrap_or(u32::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockDelay, MockInput, MockOutput, Trace};

    type State = LinkState<MockOutput, MockInput, MockDelay>;

    fn state(trace: &Trace, status: Option<&MockInput>) -> State {
        let input = match status {
            Some(pin) => StatusInput::Wired(pin.clone()),
            None => StatusInput::Absent,
        };
        let st = LinkState::new(
            MockOutput::new("reset", trace, false),
            input,
            MockDelay::new(trace),
            &LinkConfig::default(),
        )
        .unwrap();
        trace.clear();
        st
    }

    #[test]
    fn test_new_releases_reset() {
        let trace = Trace::default();
        let pin = MockOutput::new("reset", &trace, false);
        let level = pin.level.clone();
        let st: State =
            LinkState::new(pin, StatusInput::Absent, MockDelay::new(&trace), &LinkConfig::default())
                .unwrap();
        assert!(level.get());
        assert_eq!(st.status(), LinkStatus::Unconfigured);
    }

    #[test]
    fn test_reset_configured() {
        let trace = Trace::default();
        let status = MockInput::with_level(true);
        let mut st = state(&trace, Some(&status));

        assert_eq!(st.reset(), Ok(LinkStatus::Configured));
        assert_eq!(st.status(), LinkStatus::Configured);
        // Active low: assert then release
        assert_eq!(trace.sets("reset"), [false, true]);
    }

    #[test]
    fn test_reset_always_releases() {
        for level in [true, false] {
            let trace = Trace::default();
            let status = MockInput::with_level(level);
            let mut st = state(&trace, Some(&status));
            st.reset().unwrap();
            assert_eq!(trace.sets("reset").last(), Some(&true));
        }
    }

    #[test]
    fn test_reset_timing_order() {
        use crate::mock::Event;

        let trace = Trace::default();
        let status = MockInput::with_level(true);
        let mut st = state(&trace, Some(&status));
        st.reset().unwrap();
        assert_eq!(
            trace.events(),
            [
                Event::Set("reset", false),
                Event::Delay(10_000_000),
                Event::Set("reset", true),
                Event::Delay(100_000_000),
            ]
        );
        assert_eq!(status.samples.get(), 1);
    }

    #[test]
    fn test_reset_unconfigured() {
        let trace = Trace::default();
        let status = MockInput::with_level(false);
        let mut st = state(&trace, Some(&status));
        assert_eq!(st.reset(), Ok(LinkStatus::Unconfigured));
    }

    #[test]
    fn test_reset_line_fault() {
        let trace = Trace::default();
        let mut st = state(&trace, None);
        st.reset.fail.set(true);
        assert_eq!(st.reset(), Err(Error::PinFault));
        assert_eq!(st.status(), LinkStatus::Unconfigured);
    }

    #[test]
    fn test_status_fault_leaves_unconfigured() {
        let trace = Trace::default();
        let status = MockInput::with_level(true);
        let mut st = state(&trace, Some(&status));
        status.fail.set(true);
        assert_eq!(st.reset(), Err(Error::PinFault));
        assert_eq!(st.status(), LinkStatus::Unconfigured);
        assert_eq!(trace.sets("reset"), [false, true]);
    }

    #[test]
    fn test_poll_detects_loss_and_sticks() {
        let trace = Trace::default();
        let status = MockInput::with_level(true);
        let mut st = state(&trace, Some(&status));
        st.reset().unwrap();

        assert_eq!(st.poll(), Ok(LinkStatus::Configured));
        status.level.set(false);
        assert_eq!(st.poll(), Ok(LinkStatus::Lost));

        // Line coming back does not revive the link
        status.level.set(true);
        assert_eq!(st.poll(), Ok(LinkStatus::Lost));
        assert_eq!(st.reset(), Ok(LinkStatus::Configured));
    }

    #[test]
    fn test_poll_unconfigured_stays() {
        let trace = Trace::default();
        let status = MockInput::with_level(true);
        let mut st = state(&trace, Some(&status));
        assert_eq!(st.poll(), Ok(LinkStatus::Unconfigured));
        assert_eq!(status.samples.get(), 0);
    }

    #[test]
    fn test_absent_status_reads_configured() {
        let trace = Trace::default();
        let mut st = state(&trace, None);
        assert!(!st.has_status_line());
        assert_eq!(st.reset(), Ok(LinkStatus::Configured));
        assert_eq!(st.poll(), Ok(LinkStatus::Configured));
    }

    #[test]
    fn test_inverted_polarity() {
        let trace = Trace::default();
        let status = MockInput::with_level(false);
        let mut config = LinkConfig::default();
        config.levels = ControlLevels {
            reset_active_low: false,
            status_active_high: false,
        };
        let mut st = LinkState::new(
            MockOutput::new("reset", &trace, true),
            StatusInput::Wired(status.clone()),
            MockDelay::new(&trace),
            &config,
        )
        .unwrap();
        assert_eq!(st.reset(), Ok(LinkStatus::Configured));
        // Active high: idle low, pulse high
        assert_eq!(trace.sets("reset"), [false, true, false]);
    }

    #[test]
    fn test_reset_with_timeout_waits_for_line() {
        let trace = Trace::default();
        let status = MockInput::default();
        // Low for three samples, then high
        status.bits.borrow_mut().extend([false, false, false]);
        status.level.set(true);
        let mut st = state(&trace, Some(&status));

        assert_eq!(
            st.reset_with_timeout(Duration::from_millis(100)),
            Ok(LinkStatus::Configured)
        );
        assert_eq!(status.samples.get(), 4);
    }

    #[test]
    fn test_reset_with_timeout_expires() {
        let trace = Trace::default();
        let status = MockInput::with_level(false);
        let mut st = state(&trace, Some(&status));

        assert_eq!(
            st.reset_with_timeout(Duration::from_millis(35)),
            Err(Error::Timeout)
        );
        assert_eq!(st.status(), LinkStatus::Unconfigured);
        // After settle: t=0, 10, 20, 30, 35
        assert_eq!(status.samples.get(), 5);
    }
}
