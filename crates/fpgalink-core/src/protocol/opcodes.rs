//! Link opcodes and their frame layouts
//!
//! Every opcode has a fixed frame: the code byte, then an address byte and a
//! payload byte when the opcode defines them, then filler bytes that only
//! exist to clock a reply in. The peripheral answers full-duplex, so reply
//! byte `i` can depend only on request bytes before `i`. The meaningful
//! reply byte is always the last one clocked in; every earlier position is
//! don't-care and is discarded by the framer.
//!
//! | Opcode       | code | request bytes          | reply byte |
//! |--------------|------|------------------------|------------|
//! | `Nop`        | 0x00 | `[code]`               | none       |
//! | `ReadId`     | 0x01 | `[code]`               | 0          |
//! | `WriteReg`   | 0x02 | `[code, addr, value]`  | none       |
//! | `ReadReg`    | 0x03 | `[code, addr, 0x00]`   | 2          |
//! | `SetOutput`  | 0x10 | `[code, value]`        | 1 (echo)   |

use crate::error::{Error, Result};

// ============================================================================
// Default wire codes
// ============================================================================

/// No operation
pub const NOP: u8 = 0x00;
/// Read the peripheral's identification byte
pub const READ_ID: u8 = 0x01;
/// Write one register
pub const WRITE_REG: u8 = 0x02;
/// Read one register
pub const READ_REG: u8 = 0x03;
/// Set the output pattern (LEDs on the reference boards)
pub const SET_OUTPUT: u8 = 0x10;

/// Value clocked out on filler positions
pub const FILLER: u8 = 0x00;

/// Command opcode understood by the peripheral
///
/// This is a closed set. Adding a variant (with its layout and default code)
/// is the only supported extension point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// No operation
    Nop,
    /// Read identification byte
    ReadId,
    /// Write register
    WriteReg,
    /// Read register
    ReadReg,
    /// Set output pattern
    SetOutput,
}

impl Opcode {
    /// Number of opcodes
    pub const COUNT: usize = 5;

    /// All opcodes, in table order
    pub const ALL: [Opcode; Self::COUNT] = [
        Opcode::Nop,
        Opcode::ReadId,
        Opcode::WriteReg,
        Opcode::ReadReg,
        Opcode::SetOutput,
    ];

    /// Default wire code for this opcode
    pub const fn default_code(self) -> u8 {
        match self {
            Self::Nop => NOP,
            Self::ReadId => READ_ID,
            Self::WriteReg => WRITE_REG,
            Self::ReadReg => READ_REG,
            Self::SetOutput => SET_OUTPUT,
        }
    }

    /// Frame layout for this opcode
    pub const fn layout(self) -> FrameLayout {
        match self {
            Self::Nop => FrameLayout::new(false, false, 0, None),
            Self::ReadId => FrameLayout::new(false, false, 0, Some(0)),
            Self::WriteReg => FrameLayout::new(true, true, 0, None),
            Self::ReadReg => FrameLayout::new(true, false, 1, Some(2)),
            Self::SetOutput => FrameLayout::new(false, true, 0, Some(1)),
        }
    }

    /// Frame length in bytes (opcode-determined, never request-determined)
    pub const fn frame_len(self) -> usize {
        self.layout().len()
    }

    /// Short lowercase name, also used as the board-file key
    pub const fn name(self) -> &'static str {
        match self {
            Self::Nop => "nop",
            Self::ReadId => "read_id",
            Self::WriteReg => "write_reg",
            Self::ReadReg => "read_reg",
            Self::SetOutput => "set_output",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Nop => 0,
            Self::ReadId => 1,
            Self::WriteReg => 2,
            Self::ReadReg => 3,
            Self::SetOutput => 4,
        }
    }
}

impl core::fmt::Display for Opcode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Byte layout of one opcode's frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    /// An address byte follows the code
    pub address: bool,
    /// A payload byte follows the code (and the address, if any)
    pub payload: bool,
    /// Number of trailing filler bytes
    pub filler: u8,
    /// Index of the meaningful reply byte, if the opcode has one
    pub reply: Option<usize>,
}

impl FrameLayout {
    const fn new(address: bool, payload: bool, filler: u8, reply: Option<usize>) -> Self {
        Self {
            address,
            payload,
            filler,
            reply,
        }
    }

    /// Total frame length in bytes
    pub const fn len(&self) -> usize {
        1 + self.address as usize + self.payload as usize + self.filler as usize
    }

    /// Whether the inbound byte at `index` carries data
    pub fn is_meaningful(&self, index: usize) -> bool {
        self.reply == Some(index)
    }
}

/// Opcode to wire-code mapping
///
/// Boards in the field disagree on numbering for the same hardware, so the
/// numbering is configuration. The defaults are the codes in the module
/// table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeTable {
    codes: [u8; Opcode::COUNT],
}

impl Default for OpcodeTable {
    fn default() -> Self {
        let mut codes = [0u8; Opcode::COUNT];
        for op in Opcode::ALL {
            codes[op.index()] = op.default_code();
        }
        Self { codes }
    }
}

impl OpcodeTable {
    /// Build a complete numbering in one step
    ///
    /// Unlike chained [`with_code`](Self::with_code) calls this allows codes
    /// to be swapped between opcodes. Duplicate codes are
    /// [`Error::InvalidConfig`].
    pub fn from_fn(mut code_of: impl FnMut(Opcode) -> u8) -> Result<Self> {
        let mut codes = [0u8; Opcode::COUNT];
        for op in Opcode::ALL {
            let code = code_of(op);
            if let Some(other) = Opcode::ALL[..op.index()]
                .iter()
                .find(|o| codes[o.index()] == code)
            {
                log::error!("opcode code 0x{:02X} used by both {} and {}", code, other, op);
                return Err(Error::InvalidConfig);
            }
            codes[op.index()] = code;
        }
        Ok(Self { codes })
    }

    /// Wire code for an opcode
    pub const fn code(&self, opcode: Opcode) -> u8 {
        self.codes[opcode.index()]
    }

    /// Override the wire code for one opcode
    ///
    /// Fails with [`Error::InvalidConfig`] if another opcode already uses
    /// `code`.
    pub fn with_code(mut self, opcode: Opcode, code: u8) -> Result<Self> {
        if let Some(other) = self.opcode_for(code) {
            if other != opcode {
                log::error!("opcode code 0x{:02X} already used by {}", code, other);
                return Err(Error::InvalidConfig);
            }
        }
        self.codes[opcode.index()] = code;
        Ok(self)
    }

    /// Reverse lookup from a wire code
    pub fn opcode_for(&self, code: u8) -> Option<Opcode> {
        Opcode::ALL.into_iter().find(|op| self.code(*op) == code)
    }
}
