//! GPIO character device lines and the bit-banged link built from them
//!
//! All lines of a link are requested together in one gpiocdev request and
//! handed out as [`GpioLine`]s, which implement the `embedded-hal` pin
//! traits the core expects. Serial lines go into a
//! [`BitbangTransport`]; reset and status go into a [`LinkState`].

use std::sync::Arc;

use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use embedded_hal::spi::Polarity;

use fpgalink_core::config::toml::{parse_status, BoardConfig};
use fpgalink_core::config::{mode_from_number, ControlLevels, LinkConfig, PinMap, StatusPin};
use fpgalink_core::delay::StdDelay;
use fpgalink_core::link::{FpgaLink, LinkState, StatusInput};
use fpgalink_core::transport::{BitbangPins, BitbangTransport};

use crate::error::{LinuxGpioError, Result};

/// Consumer label shown by `gpioinfo`
const CONSUMER: &str = "fpgalink";

/// One requested GPIO line
#[derive(Clone)]
pub struct GpioLine {
    request: Arc<Request>,
    offset: Offset,
}

/// Error from a GPIO line operation
#[derive(Debug)]
pub struct LineError(pub gpiocdev::Error);

impl digital::Error for LineError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl ErrorType for GpioLine {
    type Error = LineError;
}

impl OutputPin for GpioLine {
    fn set_low(&mut self) -> std::result::Result<(), LineError> {
        self.request
            .set_value(self.offset, Value::Inactive)
            .map_err(LineError)
    }

    fn set_high(&mut self) -> std::result::Result<(), LineError> {
        self.request
            .set_value(self.offset, Value::Active)
            .map_err(LineError)
    }
}

impl InputPin for GpioLine {
    fn is_high(&mut self) -> std::result::Result<bool, LineError> {
        self.request
            .value(self.offset)
            .map(|v| v == Value::Active)
            .map_err(LineError)
    }

    fn is_low(&mut self) -> std::result::Result<bool, LineError> {
        self.is_high().map(|h| !h)
    }
}

/// Bit-banged transport over GPIO lines
pub type LinuxGpioTransport = BitbangTransport<GpioLine, GpioLine, GpioLine, GpioLine, StdDelay>;

/// Link built entirely from GPIO lines
pub type LinuxGpioLink = FpgaLink<LinuxGpioTransport, GpioLine, GpioLine, StdDelay>;

/// Reset and status lines for a link whose transport lives elsewhere
pub type ControlLines = LinkState<GpioLine, GpioLine, StdDelay>;

/// Configuration for a GPIO link
#[derive(Debug, Clone)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Line offsets
    pub pins: PinMap,
    /// Link settings
    pub link: LinkConfig,
}

fn level(high: bool) -> Value {
    if high {
        Value::Active
    } else {
        Value::Inactive
    }
}

fn request_lines(device: &str, outputs: &[(Offset, bool)], inputs: &[Offset]) -> Result<Arc<Request>> {
    if device.is_empty() {
        return Err(LinuxGpioError::NoDevice);
    }

    let mut seen: Vec<Offset> = Vec::new();
    for offset in outputs.iter().map(|(o, _)| *o).chain(inputs.iter().copied()) {
        if seen.contains(&offset) {
            return Err(LinuxGpioError::DuplicateLine(offset));
        }
        seen.push(offset);
    }

    let mut config = Config::default();
    for (offset, high) in outputs {
        config.with_line(*offset).as_output(level(*high));
    }
    for offset in inputs {
        config.with_line(*offset).as_input();
    }

    let request = Request::from_config(config)
        .on_chip(device)
        .with_consumer(CONSUMER)
        .request()
        .map_err(|source| LinuxGpioError::LineRequestFailed {
            path: device.to_string(),
            source,
        })?;
    Ok(Arc::new(request))
}

fn line(request: &Arc<Request>, offset: Offset) -> GpioLine {
    GpioLine {
        request: request.clone(),
        offset,
    }
}

fn status_input(request: &Arc<Request>, status: StatusPin) -> StatusInput<GpioLine> {
    match status {
        StatusPin::Wired(offset) => StatusInput::Wired(line(request, offset)),
        StatusPin::Absent => StatusInput::Absent,
    }
}

/// Idle level of the reset line
fn reset_idle_high(levels: &ControlLevels) -> bool {
    levels.reset_active_low
}

/// Open a complete bit-banged link
pub fn open(config: &LinuxGpioConfig) -> Result<LinuxGpioLink> {
    let pins = &config.pins;
    let link = &config.link;
    let sck_idle = link.mode.polarity == Polarity::IdleHigh;

    let mut inputs = vec![pins.miso];
    if let StatusPin::Wired(offset) = pins.status {
        inputs.push(offset);
    }
    let request = request_lines(
        &config.device,
        &[
            (pins.cs, true),
            (pins.sck, sck_idle),
            (pins.mosi, false),
            (pins.reset, reset_idle_high(&link.levels)),
        ],
        &inputs,
    )?;

    log::info!(
        "linux_gpio: Opened {} (cs={}, sck={}, mosi={}, miso={}, reset={}, status={:?})",
        config.device,
        pins.cs,
        pins.sck,
        pins.mosi,
        pins.miso,
        pins.reset,
        pins.status
    );

    let transport = BitbangTransport::new(
        BitbangPins {
            cs: line(&request, pins.cs),
            sck: line(&request, pins.sck),
            mosi: line(&request, pins.mosi),
            miso: line(&request, pins.miso),
        },
        StdDelay,
        link,
    )?;
    let state = LinkState::new(
        line(&request, pins.reset),
        status_input(&request, pins.status),
        StdDelay,
        link,
    )?;
    Ok(FpgaLink::open(link, transport, state))
}

/// Request only the reset and status lines
///
/// For backends whose serial lines are driven by other hardware.
pub fn open_control_lines(
    device: &str,
    reset: Offset,
    status: StatusPin,
    link: &LinkConfig,
) -> Result<ControlLines> {
    let inputs: Vec<Offset> = match status {
        StatusPin::Wired(offset) => vec![offset],
        StatusPin::Absent => Vec::new(),
    };
    let request = request_lines(device, &[(reset, reset_idle_high(&link.levels))], &inputs)?;
    log::debug!(
        "linux_gpio: control lines on {} (reset={}, status={:?})",
        device,
        reset,
        status
    );
    Ok(LinkState::new(
        line(&request, reset),
        status_input(&request, status),
        StdDelay,
        link,
    )?)
}

/// Build a device path from `dev=` or `gpiochip=` options
pub fn resolve_device(dev: Option<String>, gpiochip: Option<u32>) -> std::result::Result<Option<String>, String> {
    match (dev, gpiochip) {
        (Some(_), Some(_)) => Err("Only one of 'dev' or 'gpiochip' can be specified".to_string()),
        (Some(dev), None) => Ok(Some(dev)),
        (None, Some(n)) => Ok(Some(format!("/dev/gpiochip{}", n))),
        (None, None) => Ok(None),
    }
}

fn parse_offset(key: &str, value: &str) -> std::result::Result<Offset, String> {
    value
        .parse()
        .map_err(|_| format!("Invalid {} value: {}", key, value))
}

/// Apply the `spispeed=` (kHz) and `mode=` options shared by both backends
pub fn apply_link_option(link: &mut LinkConfig, key: &str, value: &str) -> std::result::Result<bool, String> {
    match key {
        "spispeed" => {
            let khz: u32 = value
                .parse()
                .map_err(|_| format!("Invalid spispeed value: {}", value))?;
            if khz == 0 {
                return Err("spispeed must be non-zero".to_string());
            }
            link.clock_hz = khz.saturating_mul(1000);
            Ok(true)
        }
        "mode" => {
            link.mode = value
                .parse()
                .ok()
                .and_then(mode_from_number)
                .ok_or_else(|| format!("Invalid mode value: {} (expected 0-3)", value))?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Parse the status option: a line offset or `absent`
pub fn parse_status_option(value: &str) -> std::result::Result<StatusPin, String> {
    parse_status(value).map_err(|e| format!("Invalid status value: {}", e))
}

/// Parse `linux_gpio` options, starting from an optional board file
///
/// Options override the board. Recognised keys:
///
/// - `dev=/dev/gpiochipN` or `gpiochip=N`
/// - `cs`, `sck`, `mosi`/`io0`, `miso`/`io1`, `reset` - line offsets
/// - `status=N` or `status=absent` - required, here or in the board file
/// - `spispeed` - clock in kHz
/// - `mode` - SPI mode 0-3
pub fn parse_options(
    options: &[(&str, &str)],
    board: Option<&BoardConfig>,
) -> std::result::Result<LinuxGpioConfig, String> {
    let mut dev = None;
    let mut gpiochip = None;
    let mut cs = board.and_then(|b| b.pins.cs);
    let mut sck = board.and_then(|b| b.pins.sck);
    let mut mosi = board.and_then(|b| b.pins.mosi);
    let mut miso = board.and_then(|b| b.pins.miso);
    let mut reset = board.and_then(|b| b.pins.reset);
    let mut status = board.map(|b| b.pins.status);
    let mut link = board.map(|b| b.link).unwrap_or_default();

    for (key, value) in options {
        if apply_link_option(&mut link, key, value)? {
            continue;
        }
        match *key {
            "dev" => dev = Some(value.to_string()),
            "gpiochip" => {
                gpiochip = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid gpiochip value: {}", value))?,
                )
            }
            "cs" => cs = Some(parse_offset(key, value)?),
            "sck" => sck = Some(parse_offset(key, value)?),
            "mosi" | "io0" => mosi = Some(parse_offset(key, value)?),
            "miso" | "io1" => miso = Some(parse_offset(key, value)?),
            "reset" => reset = Some(parse_offset(key, value)?),
            "status" => status = Some(parse_status_option(value)?),
            _ => log::warn!("linux_gpio: Unknown option: {}={}", key, value),
        }
    }

    let device = resolve_device(dev, gpiochip)?
        .or_else(|| board.and_then(|b| b.gpiochip.clone()))
        .ok_or_else(|| {
            "Either 'dev' or 'gpiochip' must be specified.\n\
             e.g. linux_gpio:gpiochip=0,cs=8,sck=11,mosi=10,miso=9,reset=24,status=25"
                .to_string()
        })?;

    let need = |v: Option<Offset>, name: &str| v.ok_or_else(|| format!("Missing required parameter: {}", name));
    let pins = PinMap {
        cs: need(cs, "cs")?,
        sck: need(sck, "sck")?,
        mosi: need(mosi, "mosi (or io0)")?,
        miso: need(miso, "miso (or io1)")?,
        reset: need(reset, "reset")?,
        status: status.ok_or_else(|| {
            "Missing required parameter: status (a line offset, or 'absent')".to_string()
        })?,
    };

    Ok(LinuxGpioConfig { device, pins, link })
}
