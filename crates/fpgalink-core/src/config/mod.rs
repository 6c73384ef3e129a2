//! Link configuration
//!
//! Everything here is supplied by the board, never discovered: pin numbers,
//! clock rate and mode, timing and opcode numbering. Different boards for
//! the same hardware disagree on all of these, so none of it is a protocol
//! constant.

#[cfg(feature = "std")]
pub mod toml;

use core::time::Duration;

use embedded_hal::spi::{Mode, MODE_0, MODE_1, MODE_2, MODE_3};

use crate::protocol::OpcodeTable;

/// Default serial clock (10 MHz)
pub const DEFAULT_CLOCK_HZ: u32 = 10_000_000;

/// Default guard time around chip-select edges (1 µs)
pub const DEFAULT_SELECT_SETTLE_NS: u32 = 1_000;

/// Default time reset is held active
pub const DEFAULT_RESET_HOLD: Duration = Duration::from_millis(10);

/// Default wait between releasing reset and sampling status
pub const DEFAULT_RESET_SETTLE: Duration = Duration::from_millis(100);

/// Default interval between status samples while waiting for readiness
pub const DEFAULT_READY_POLL: Duration = Duration::from_millis(10);

/// Reset sequencing delays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTiming {
    /// How long reset is held active
    pub reset_hold: Duration,
    /// Wait after releasing reset before the status line is sampled
    pub reset_settle: Duration,
    /// Sample interval for bounded readiness waits
    pub ready_poll: Duration,
}

impl Default for LinkTiming {
    fn default() -> Self {
        Self {
            reset_hold: DEFAULT_RESET_HOLD,
            reset_settle: DEFAULT_RESET_SETTLE,
            ready_poll: DEFAULT_READY_POLL,
        }
    }
}

/// Electrical polarity of the control lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlLevels {
    /// Reset is asserted by driving the line low
    pub reset_active_low: bool,
    /// Configured is signalled by the status line reading high
    pub status_active_high: bool,
}

impl Default for ControlLevels {
    fn default() -> Self {
        Self {
            reset_active_low: true,
            status_active_high: true,
        }
    }
}

/// Protocol-level link configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    /// Serial clock in Hz
    pub clock_hz: u32,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Guard time applied before and after each chip-select edge
    pub select_settle_ns: u32,
    /// Reset sequencing delays
    pub timing: LinkTiming,
    /// Control line polarity
    pub levels: ControlLevels,
    /// Opcode numbering
    pub opcodes: OpcodeTable,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            mode: MODE_0,
            select_settle_ns: DEFAULT_SELECT_SETTLE_NS,
            timing: LinkTiming::default(),
            levels: ControlLevels::default(),
            opcodes: OpcodeTable::default(),
        }
    }
}

/// Whether the board routes the configuration-status line
///
/// There is no default. A board without the line must say so, and then the
/// link treats the peripheral as always configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusPin {
    /// Status line on this GPIO offset
    Wired(u32),
    /// No status line
    Absent,
}

/// GPIO line offsets for one board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinMap {
    /// Chip select
    pub cs: u32,
    /// Serial clock
    pub sck: u32,
    /// Controller data out
    pub mosi: u32,
    /// Controller data in
    pub miso: u32,
    /// Peripheral reset
    pub reset: u32,
    /// Configuration status
    pub status: StatusPin,
}

/// Map the conventional 0..=3 mode number to an `embedded-hal` mode
pub fn mode_from_number(n: u8) -> Option<Mode> {
    match n {
        0 => Some(MODE_0),
        1 => Some(MODE_1),
        2 => Some(MODE_2),
        3 => Some(MODE_3),
        _ => None,
    }
}

/// Conventional mode number for an `embedded-hal` mode
pub fn mode_number(mode: Mode) -> u8 {
    use embedded_hal::spi::{Phase, Polarity};

    let cpol = matches!(mode.polarity, Polarity::IdleHigh) as u8;
    let cpha = matches!(mode.phase, Phase::CaptureOnSecondTransition) as u8;
    (cpol << 1) | cpha
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.clock_hz, 10_000_000);
        assert_eq!(config.mode, MODE_0);
        assert_eq!(config.timing.reset_hold, Duration::from_millis(10));
        assert!(config.levels.reset_active_low);
        assert!(config.levels.status_active_high);
    }

    #[test]
    fn test_mode_numbers() {
        for n in 0..4 {
            assert_eq!(mode_number(mode_from_number(n).unwrap()), n);
        }
        assert_eq!(mode_from_number(4), None);
    }
}
