//! Command protocol: opcodes, frame layouts and the framer
//!
//! This is the only module that knows byte-level framing.

mod frame;
pub mod opcodes;

pub use frame::{CommandFramer, Frame, Request, Response, MAX_FRAME_LEN};
pub use opcodes::{FrameLayout, Opcode, OpcodeTable};
