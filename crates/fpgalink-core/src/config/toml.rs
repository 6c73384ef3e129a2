//! TOML board files
//!
//! A board file names the devices and line offsets of one board and may
//! override any link setting:
//!
//! ```toml
//! [board]
//! name = "upduino-pi"
//! gpiochip = "/dev/gpiochip0"
//! spidev = "/dev/spidev0.0"
//!
//! [pins]
//! cs = 8
//! sck = 11
//! mosi = 10
//! miso = 9
//! reset = 24
//! status = 25          # or "absent"; the key is required
//!
//! [link]
//! clock_hz = 10_000_000
//! mode = 0
//! select_settle_ns = 1000
//! reset_hold_ms = 10
//! reset_settle_ms = 100
//! ready_poll_ms = 10
//! reset_active_low = true
//! status_active_high = true
//!
//! [opcodes]
//! set_output = 0x20
//! ```
//!
//! Numbers may be written as integers or as `"0x.."` strings.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::string::{String, ToString};
use std::format;

use core::time::Duration;

use serde::Deserialize;

use super::{mode_from_number, LinkConfig, PinMap, StatusPin};
use crate::protocol::{Opcode, OpcodeTable};

/// Errors loading a board file
#[derive(Debug, thiserror::Error)]
pub enum BoardFileError {
    /// The file could not be read
    #[error("failed to read board file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for a board
    #[error("failed to parse board file: {0}")]
    Parse(#[from] ::toml::de::Error),

    /// The file parsed but a value is out of range or inconsistent
    #[error("invalid board file: {0}")]
    Invalid(String),
}

/// Line offsets from a board file
///
/// Every serial line is optional because hardware-SPI boards only route
/// reset and status through GPIO. The status entry is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardPins {
    /// Chip select
    pub cs: Option<u32>,
    /// Serial clock
    pub sck: Option<u32>,
    /// Controller data out
    pub mosi: Option<u32>,
    /// Controller data in
    pub miso: Option<u32>,
    /// Peripheral reset
    pub reset: Option<u32>,
    /// Configuration status
    pub status: StatusPin,
}

impl BoardPins {
    /// Full bit-bang pin map, if every line is given
    pub fn pin_map(&self) -> Result<PinMap, BoardFileError> {
        let need = |v: Option<u32>, name: &str| {
            v.ok_or_else(|| BoardFileError::Invalid(format!("missing pin '{}'", name)))
        };
        Ok(PinMap {
            cs: need(self.cs, "cs")?,
            sck: need(self.sck, "sck")?,
            mosi: need(self.mosi, "mosi")?,
            miso: need(self.miso, "miso")?,
            reset: need(self.reset, "reset")?,
            status: self.status,
        })
    }
}

/// A parsed board file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Human-readable board name
    pub name: Option<String>,
    /// GPIO character device
    pub gpiochip: Option<String>,
    /// spidev node
    pub spidev: Option<String>,
    /// Line offsets
    pub pins: BoardPins,
    /// Link settings, defaults overridden by the file
    pub link: LinkConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBoardFile {
    #[serde(default)]
    board: TomlBoard,
    pins: TomlPins,
    #[serde(default)]
    link: TomlLink,
    #[serde(default)]
    opcodes: BTreeMap<String, Number>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlBoard {
    name: Option<String>,
    gpiochip: Option<String>,
    spidev: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlPins {
    cs: Option<Number>,
    sck: Option<Number>,
    mosi: Option<Number>,
    miso: Option<Number>,
    reset: Option<Number>,
    status: Number,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlLink {
    clock_hz: Option<Number>,
    mode: Option<Number>,
    select_settle_ns: Option<Number>,
    reset_hold_ms: Option<Number>,
    reset_settle_ms: Option<Number>,
    ready_poll_ms: Option<Number>,
    reset_active_low: Option<bool>,
    status_active_high: Option<bool>,
}

/// A number written as an integer or a (possibly hex) string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Number {
    Int(u64),
    Str(String),
}

impl Number {
    fn value(&self, key: &str) -> Result<u64, BoardFileError> {
        match self {
            Number::Int(n) => Ok(*n),
            Number::Str(s) => parse_number(s)
                .map_err(|e| BoardFileError::Invalid(format!("{}: {}", key, e))),
        }
    }

    fn narrow<T: TryFrom<u64>>(&self, key: &str) -> Result<T, BoardFileError> {
        let v = self.value(key)?;
        T::try_from(v).map_err(|_| BoardFileError::Invalid(format!("{}: {} out of range", key, v)))
    }
}

/// Parse a number that can be hex (0x...) or decimal
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim().replace('_', "");
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16).map_err(|e| format!("invalid hex: {}", e))
    } else {
        s.parse().map_err(|e| format!("invalid number: {}", e))
    }
}

/// Parse a status entry: a line offset or `absent`
pub fn parse_status(s: &str) -> Result<StatusPin, String> {
    if s.trim().eq_ignore_ascii_case("absent") || s.trim().eq_ignore_ascii_case("none") {
        return Ok(StatusPin::Absent);
    }
    let n = parse_number(s)?;
    u32::try_from(n)
        .map(StatusPin::Wired)
        .map_err(|_| format!("status line {} out of range", n))
}

impl BoardConfig {
    /// Load a board from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, BoardFileError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse a board from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, BoardFileError> {
        let file: TomlBoardFile = ::toml::from_str(content)?;

        let status = match &file.pins.status {
            Number::Int(n) => u32::try_from(*n)
                .map(StatusPin::Wired)
                .map_err(|_| BoardFileError::Invalid(format!("pins.status: {} out of range", n)))?,
            Number::Str(s) => parse_status(s)
                .map_err(|e| BoardFileError::Invalid(format!("pins.status: {}", e)))?,
        };
        let pin = |v: &Option<Number>, key: &str| -> Result<Option<u32>, BoardFileError> {
            v.as_ref().map(|n| n.narrow(key)).transpose()
        };
        let pins = BoardPins {
            cs: pin(&file.pins.cs, "pins.cs")?,
            sck: pin(&file.pins.sck, "pins.sck")?,
            mosi: pin(&file.pins.mosi, "pins.mosi")?,
            miso: pin(&file.pins.miso, "pins.miso")?,
            reset: pin(&file.pins.reset, "pins.reset")?,
            status,
        };

        let mut link = LinkConfig::default();
        let l = &file.link;
        if let Some(n) = &l.clock_hz {
            link.clock_hz = n.narrow("link.clock_hz")?;
            if link.clock_hz == 0 {
                return Err(BoardFileError::Invalid("link.clock_hz must be non-zero".into()));
            }
        }
        if let Some(n) = &l.mode {
            let n: u8 = n.narrow("link.mode")?;
            link.mode = mode_from_number(n)
                .ok_or_else(|| BoardFileError::Invalid(format!("link.mode: {} is not 0..=3", n)))?;
        }
        if let Some(n) = &l.select_settle_ns {
            link.select_settle_ns = n.narrow("link.select_settle_ns")?;
        }
        if let Some(n) = &l.reset_hold_ms {
            link.timing.reset_hold = Duration::from_millis(n.value("link.reset_hold_ms")?);
        }
        if let Some(n) = &l.reset_settle_ms {
            link.timing.reset_settle = Duration::from_millis(n.value("link.reset_settle_ms")?);
        }
        if let Some(n) = &l.ready_poll_ms {
            link.timing.ready_poll = Duration::from_millis(n.value("link.ready_poll_ms")?);
        }
        if let Some(v) = l.reset_active_low {
            link.levels.reset_active_low = v;
        }
        if let Some(v) = l.status_active_high {
            link.levels.status_active_high = v;
        }

        let mut overrides = BTreeMap::new();
        for (name, code) in &file.opcodes {
            let opcode = Opcode::ALL
                .into_iter()
                .find(|op| op.name() == name.as_str())
                .ok_or_else(|| BoardFileError::Invalid(format!("unknown opcode '{}'", name)))?;
            let code: u8 = code.narrow(&format!("opcodes.{}", name))?;
            overrides.insert(opcode.name(), code);
        }
        link.opcodes = OpcodeTable::from_fn(|op| {
            overrides
                .get(op.name())
                .copied()
                .unwrap_or_else(|| op.default_code())
        })
        .map_err(|_| BoardFileError::Invalid("duplicate opcode codes".to_string()))?;

        Ok(Self {
            name: file.board.name,
            gpiochip: file.board.gpiochip,
            spidev: file.board.spidev,
            pins,
            link,
        })
    }
}
