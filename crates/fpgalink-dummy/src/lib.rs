//! fpgalink-dummy - In-memory FPGA peripheral emulator for testing
//!
//! [`DummyFpga`] models the peripheral end of a link: a reset input, a
//! configuration-status output, and a command decoder with a register file
//! and an output latch. It hands out a transport, control lines and a
//! delay provider that all act on the same model, so a real
//! [`FpgaLink`] can be driven against it without hardware.
//!
//! The model clocks full-duplex like the real thing: byte 0 of every reply
//! is the id byte preloaded at select, later bytes can only depend on bytes
//! already received, and positions with nothing to say return `0xA5`.

use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use fpgalink_core::config::{ControlLevels, LinkConfig};
use fpgalink_core::error::{Error, Result};
use fpgalink_core::link::{FpgaLink, LinkState, StatusInput};
use fpgalink_core::protocol::{Opcode, OpcodeTable};
use fpgalink_core::transport::{check_frame, ChipSelect, Transport};

/// Reply byte on positions that carry no data
pub const FILLER: u8 = 0xA5;

/// Reply byte on every position while the peripheral is unconfigured
pub const UNCONFIGURED_BYTE: u8 = 0xFF;

/// Emulator settings
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Identification byte
    pub id: u8,
    /// Whether a bitstream is available to load after reset
    pub bitstream: bool,
    /// Time from reset release to the status line going active
    pub load_time: Duration,
    /// Whether the board routes the status line
    pub status_line: bool,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            id: 0x5A,
            bitstream: true,
            load_time: Duration::from_millis(50),
            status_line: true,
        }
    }
}

/// A fault to inject into the next exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Refuse the bus before chip select moves
    BusBusy,
    /// Fail after chip select was asserted
    TransferFailed,
}

/// One completed or failed exchange, as seen on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Bytes the controller sent
    pub write: Vec<u8>,
    /// Bytes the peripheral returned (empty if the transfer failed)
    pub read: Vec<u8>,
}

#[derive(Debug)]
struct Model {
    config: DummyConfig,
    opcodes: OpcodeTable,
    levels: ControlLevels,
    registers: [u8; 256],
    pattern: u8,
    configured: bool,
    reset_asserted: bool,
    released_at_ns: Option<u64>,
    now_ns: u64,
    selected: bool,
    exchanges: Vec<Exchange>,
    faults: Vec<Fault>,
}

impl Model {
    fn new(config: DummyConfig) -> Self {
        Self {
            config,
            opcodes: OpcodeTable::default(),
            levels: ControlLevels::default(),
            registers: [0; 256],
            pattern: 0,
            configured: false,
            reset_asserted: false,
            released_at_ns: None,
            now_ns: 0,
            selected: false,
            exchanges: Vec::new(),
            faults: Vec::new(),
        }
    }

    /// Advance configuration loading to the current time
    fn update(&mut self) {
        if self.configured || self.reset_asserted || !self.config.bitstream {
            return;
        }
        if let Some(released) = self.released_at_ns {
            let load_ns = self.config.load_time.as_nanos() as u64;
            if self.now_ns >= released.saturating_add(load_ns) {
                log::trace!("dummy: configuration loaded");
                self.configured = true;
            }
        }
    }

    fn set_reset_line(&mut self, high: bool) {
        let asserted = high != self.levels.reset_active_low;
        if asserted && !self.reset_asserted {
            log::trace!("dummy: reset asserted");
            self.configured = false;
            self.registers = [0; 256];
            self.pattern = 0;
            self.released_at_ns = None;
        } else if !asserted && self.reset_asserted {
            log::trace!("dummy: reset released");
            self.released_at_ns = Some(self.now_ns);
        }
        self.reset_asserted = asserted;
    }

    fn status_line(&mut self) -> bool {
        self.update();
        self.configured == self.levels.status_active_high
    }

    fn take_fault(&mut self, fault: Fault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(i) => {
                self.faults.remove(i);
                true
            }
            None => false,
        }
    }

    /// Produce the full-duplex reply to `write`
    fn respond(&mut self, write: &[u8], read: &mut [u8]) {
        self.update();
        if !self.configured {
            read.fill(UNCONFIGURED_BYTE);
            return;
        }

        read.fill(FILLER);
        read[0] = self.config.id;

        let arg = |i: usize| write.get(i).copied();
        match self.opcodes.opcode_for(write[0]) {
            Some(Opcode::ReadReg) => {
                if let (Some(addr), Some(slot)) = (arg(1), read.get_mut(2)) {
                    *slot = self.registers[addr as usize];
                }
            }
            Some(Opcode::WriteReg) => {
                if let (Some(addr), Some(value)) = (arg(1), arg(2)) {
                    self.registers[addr as usize] = value;
                }
            }
            Some(Opcode::SetOutput) => {
                if let Some(value) = arg(1) {
                    // The new value is still arriving; reply with the latch
                    read[1] = self.pattern;
                    self.pattern = value;
                }
            }
            Some(Opcode::Nop) | Some(Opcode::ReadId) => {}
            None => log::debug!("dummy: unknown opcode 0x{:02X}", write[0]),
        }
    }
}

/// Emulated FPGA peripheral
///
/// Cloning gives another handle on the same peripheral.
#[derive(Debug, Clone)]
pub struct DummyFpga {
    model: Arc<Mutex<Model>>,
}

/// The link type produced by [`DummyFpga::link`]
pub type DummyLink = FpgaLink<DummyTransport, DummyResetPin, DummyStatusPin, DummyDelay>;

impl Default for DummyFpga {
    fn default() -> Self {
        Self::new(DummyConfig::default())
    }
}

impl DummyFpga {
    /// Create an emulator, powered up and unconfigured with reset released
    pub fn new(config: DummyConfig) -> Self {
        let mut model = Model::new(config);
        // Power-on is a reset release at t=0
        model.released_at_ns = Some(0);
        Self {
            model: Arc::new(Mutex::new(model)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Model> {
        self.model.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A transport into this peripheral
    pub fn transport(&self, config: &LinkConfig) -> Result<DummyTransport> {
        let mut cs = DummyCsPin {
            model: self.model.clone(),
        };
        cs.set_high().map_err(|_| Error::PinFault)?;
        Ok(DummyTransport {
            model: self.model.clone(),
            cs,
            delay: self.delay(),
            settle_ns: config.select_settle_ns,
        })
    }

    /// The reset input, as an output pin for the controller
    pub fn reset_pin(&self) -> DummyResetPin {
        DummyResetPin {
            model: self.model.clone(),
        }
    }

    /// The status output, as an input pin for the controller
    pub fn status_pin(&self) -> DummyStatusPin {
        DummyStatusPin {
            model: self.model.clone(),
        }
    }

    /// A delay provider that advances the emulator clock
    pub fn delay(&self) -> DummyDelay {
        DummyDelay {
            model: self.model.clone(),
        }
    }

    /// Build a complete link to this peripheral
    ///
    /// The emulated board is wired to match `config`: same opcode numbering
    /// and line polarity.
    pub fn link(&self, config: &LinkConfig) -> Result<DummyLink> {
        {
            let mut model = self.lock();
            model.opcodes = config.opcodes;
            model.levels = config.levels;
        }
        let status = if self.lock().config.status_line {
            StatusInput::Wired(self.status_pin())
        } else {
            StatusInput::Absent
        };
        let state = LinkState::new(self.reset_pin(), status, self.delay(), config)?;
        Ok(FpgaLink::open(config, self.transport(config)?, state))
    }

    /// Every exchange so far
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.lock().exchanges.clone()
    }

    /// Number of exchanges so far, including failed ones
    pub fn exchange_count(&self) -> usize {
        self.lock().exchanges.len()
    }

    /// Current register value
    pub fn register(&self, address: u8) -> u8 {
        self.lock().registers[address as usize]
    }

    /// Current output latch
    pub fn pattern(&self) -> u8 {
        self.lock().pattern
    }

    /// Whether chip select is asserted right now
    pub fn is_selected(&self) -> bool {
        self.lock().selected
    }

    /// Whether reset is asserted right now
    pub fn reset_asserted(&self) -> bool {
        self.lock().reset_asserted
    }

    /// Whether the peripheral holds a configuration
    pub fn is_configured(&self) -> bool {
        let mut model = self.lock();
        model.update();
        model.configured
    }

    /// Emulator time since creation
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.lock().now_ns)
    }

    /// Drop the configuration, as an upset or a configuration reload would
    pub fn lose_configuration(&self) {
        let mut model = self.lock();
        model.configured = false;
        model.released_at_ns = None;
    }

    /// Make a bitstream available (or not) for the next reset
    pub fn set_bitstream(&self, present: bool) {
        self.lock().config.bitstream = present;
    }

    /// Fail the next exchange matching this fault
    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push(fault);
    }
}

/// Transport into a [`DummyFpga`]
#[derive(Debug)]
pub struct DummyTransport {
    model: Arc<Mutex<Model>>,
    cs: DummyCsPin,
    delay: DummyDelay,
    settle_ns: u32,
}

impl DummyTransport {
    fn lock(&self) -> MutexGuard<'_, Model> {
        self.model.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Transport for DummyTransport {
    fn exchange(&mut self, write: &[u8], read: &mut [u8]) -> Result<()> {
        check_frame(write, read)?;
        if self.lock().take_fault(Fault::BusBusy) {
            log::debug!("dummy: injected bus busy");
            return Err(Error::BusBusy);
        }

        let model = self.model.clone();
        let _select = ChipSelect::assert(&mut self.cs, &mut self.delay, self.settle_ns)?;
        let mut model = model.lock().unwrap_or_else(|e| e.into_inner());
        if model.take_fault(Fault::TransferFailed) {
            log::debug!("dummy: injected transfer failure");
            model.exchanges.push(Exchange {
                write: write.to_vec(),
                read: Vec::new(),
            });
            return Err(Error::TransferFailed);
        }
        model.respond(write, read);
        model.exchanges.push(Exchange {
            write: write.to_vec(),
            read: read.to_vec(),
        });
        Ok(())
    }
}

#[derive(Debug)]
struct DummyCsPin {
    model: Arc<Mutex<Model>>,
}

impl ErrorType for DummyCsPin {
    type Error = Infallible;
}

impl OutputPin for DummyCsPin {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        lock(&self.model).selected = true;
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        lock(&self.model).selected = false;
        Ok(())
    }
}

/// Controller side of the reset input
#[derive(Debug)]
pub struct DummyResetPin {
    model: Arc<Mutex<Model>>,
}

impl ErrorType for DummyResetPin {
    type Error = Infallible;
}

impl OutputPin for DummyResetPin {
    fn set_low(&mut self) -> core::result::Result<(), Infallible> {
        lock(&self.model).set_reset_line(false);
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Infallible> {
        lock(&self.model).set_reset_line(true);
        Ok(())
    }
}

/// Controller side of the status output
#[derive(Debug)]
pub struct DummyStatusPin {
    model: Arc<Mutex<Model>>,
}

impl ErrorType for DummyStatusPin {
    type Error = Infallible;
}

impl InputPin for DummyStatusPin {
    fn is_high(&mut self) -> core::result::Result<bool, Infallible> {
        Ok(lock(&self.model).status_line())
    }

    fn is_low(&mut self) -> core::result::Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

/// Delay that advances the emulator clock instead of sleeping
#[derive(Debug, Clone)]
pub struct DummyDelay {
    model: Arc<Mutex<Model>>,
}

impl DelayNs for DummyDelay {
    fn delay_ns(&mut self, ns: u32) {
        let mut model = lock(&self.model);
        model.now_ns = model.now_ns.saturating_add(u64::from(ns));
    }
}

fn lock(model: &Mutex<Model>) -> MutexGuard<'_, Model> {
    model.lock().unwrap_or_else(|e| e.into_inner())
}

fn parse_flag(key: &str, value: &str) -> std::result::Result<bool, String> {
    match value {
        "1" | "yes" | "on" | "true" => Ok(true),
        "0" | "no" | "off" | "false" => Ok(false),
        _ => Err(format!("Invalid {} value: {} (expected yes/no)", key, value)),
    }
}

/// Parse `dummy` backend options
///
/// Recognised keys:
///
/// - `id` - identification byte, decimal or `0x` hex
/// - `bitstream=yes|no` - whether the peripheral configures after reset
/// - `load_ms` - time from reset release to configured
/// - `status=wired|absent` - whether the status line is routed
pub fn parse_options(options: &[(&str, &str)]) -> std::result::Result<DummyConfig, String> {
    let mut config = DummyConfig::default();

    for (key, value) in options {
        match *key {
            "id" => {
                let id = fpgalink_core::config::toml::parse_number(value)
                    .map_err(|e| format!("Invalid id value: {}", e))?;
                config.id = u8::try_from(id).map_err(|_| format!("id {:#x} does not fit a byte", id))?;
            }
            "bitstream" => config.bitstream = parse_flag(key, value)?,
            "load_ms" => {
                let ms = value
                    .parse()
                    .map_err(|_| format!("Invalid load_ms value: {}", value))?;
                config.load_time = Duration::from_millis(ms);
            }
            "status" => {
                config.status_line = match *value {
                    "wired" | "present" => true,
                    "absent" | "none" => false,
                    _ => return Err(format!("Invalid status value: {} (expected wired/absent)", value)),
                }
            }
            _ => log::warn!("dummy: Unknown option: {}={}", key, value),
        }
    }

    Ok(config)
}
