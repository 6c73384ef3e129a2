//! Request/response types and the byte-level framer

use heapless::Vec;

use super::opcodes::{Opcode, OpcodeTable, FILLER};
use crate::error::{Error, Result};

/// Longest frame any opcode defines
pub const MAX_FRAME_LEN: usize = 3;

/// One encoded frame, ready for [`Transport::exchange`](crate::Transport::exchange)
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

/// A typed request
///
/// Use the constructors; they always produce a request whose fields match
/// the opcode's layout. A hand-built request with a stray field is rejected
/// by [`CommandFramer::encode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// The opcode
    pub opcode: Opcode,
    /// Register address, for opcodes that carry one
    pub address: Option<u8>,
    /// Data byte, for opcodes that carry one
    pub payload: Option<u8>,
}

impl Request {
    /// No operation
    pub const fn nop() -> Self {
        Self {
            opcode: Opcode::Nop,
            address: None,
            payload: None,
        }
    }

    /// Read the identification byte
    pub const fn read_id() -> Self {
        Self {
            opcode: Opcode::ReadId,
            address: None,
            payload: None,
        }
    }

    /// Write `value` to register `address`
    pub const fn write_reg(address: u8, value: u8) -> Self {
        Self {
            opcode: Opcode::WriteReg,
            address: Some(address),
            payload: Some(value),
        }
    }

    /// Read register `address`
    pub const fn read_reg(address: u8) -> Self {
        Self {
            opcode: Opcode::ReadReg,
            address: Some(address),
            payload: None,
        }
    }

    /// Set the output pattern
    pub const fn set_output(value: u8) -> Self {
        Self {
            opcode: Opcode::SetOutput,
            address: None,
            payload: Some(value),
        }
    }
}

/// A decoded response
///
/// Only the meaningful reply byte survives decoding. Don't-care positions
/// are dropped by the framer and never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Opcode this response answers
    pub opcode: Opcode,
    /// The meaningful byte, for opcodes that define one
    pub value: Option<u8>,
}

/// Encodes requests into frames and decodes frames into responses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandFramer {
    table: OpcodeTable,
}

impl CommandFramer {
    /// Create a framer using the given opcode numbering
    pub const fn new(table: OpcodeTable) -> Self {
        Self { table }
    }

    /// Encode a request
    ///
    /// The frame is the opcode's code byte, then the address and payload when
    /// the opcode defines them, then filler bytes. Field presence must match
    /// the layout exactly; a missing or extra field is
    /// [`Error::MalformedRequest`].
    pub fn encode(&self, request: &Request) -> Result<Frame> {
        let layout = request.opcode.layout();
        if layout.address != request.address.is_some()
            || layout.payload != request.payload.is_some()
        {
            log::debug!(
                "{} request rejected: address={:?} payload={:?}",
                request.opcode,
                request.address,
                request.payload
            );
            return Err(Error::MalformedRequest);
        }

        let mut frame = Frame::new();
        let code = self.table.code(request.opcode);
        let fields = core::iter::once(code)
            .chain(request.address)
            .chain(request.payload)
            .chain(core::iter::repeat(FILLER).take(layout.filler as usize));
        for byte in fields {
            frame.push(byte).map_err(|_| Error::MalformedRequest)?;
        }
        debug_assert_eq!(frame.len(), layout.len());
        Ok(frame)
    }

    /// Decode the bytes clocked in while `opcode`'s frame was clocked out
    ///
    /// `raw` must be exactly the opcode's frame length. Only the meaningful
    /// position (see the table in [`opcodes`](super::opcodes)) is read.
    pub fn decode(&self, opcode: Opcode, raw: &[u8]) -> Result<Response> {
        let layout = opcode.layout();
        if raw.len() != layout.len() {
            log::debug!(
                "{} response has {} bytes, expected {}",
                opcode,
                raw.len(),
                layout.len()
            );
            return Err(Error::MalformedRequest);
        }
        Ok(Response {
            opcode,
            value: layout.reply.map(|i| raw[i]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::opcodes;

    fn framer() -> CommandFramer {
        CommandFramer::default()
    }

    #[test]
    fn test_encode_wire_layouts() {
        let f = framer();
        assert_eq!(f.encode(&Request::nop()).unwrap().as_slice(), &[0x00]);
        assert_eq!(f.encode(&Request::read_id()).unwrap().as_slice(), &[0x01]);
        assert_eq!(
            f.encode(&Request::write_reg(0x05, 0xAA)).unwrap().as_slice(),
            &[0x02, 0x05, 0xAA]
        );
        assert_eq!(
            f.encode(&Request::read_reg(0x7F)).unwrap().as_slice(),
            &[0x03, 0x7F, 0x00]
        );
        assert_eq!(
            f.encode(&Request::set_output(0x3C)).unwrap().as_slice(),
            &[0x10, 0x3C]
        );
    }

    #[test]
    fn test_encode_rejects_stray_fields() {
        let f = framer();
        let mut req = Request::read_id();
        req.payload = Some(1);
        assert_eq!(f.encode(&req), Err(Error::MalformedRequest));

        let mut req = Request::nop();
        req.address = Some(1);
        assert_eq!(f.encode(&req), Err(Error::MalformedRequest));

        let mut req = Request::write_reg(1, 2);
        req.payload = None;
        assert_eq!(f.encode(&req), Err(Error::MalformedRequest));

        let mut req = Request::read_reg(1);
        req.payload = Some(0);
        assert_eq!(f.encode(&req), Err(Error::MalformedRequest));
    }

    #[test]
    fn test_encode_uses_table_codes() {
        let table = OpcodeTable::default()
            .with_code(Opcode::SetOutput, 0x20)
            .unwrap();
        let f = CommandFramer::new(table);
        assert_eq!(
            f.encode(&Request::set_output(0x01)).unwrap().as_slice(),
            &[0x20, 0x01]
        );
    }

    #[test]
    fn test_set_output_loopback_round_trip() {
        let f = framer();
        for value in [0x00, 0x01, 0x5A, 0xFF] {
            let frame = f.encode(&Request::set_output(value)).unwrap();
            // Loopback: what went out comes straight back
            let resp = f.decode(Opcode::SetOutput, &frame).unwrap();
            assert_eq!(resp.value, Some(value));
        }
    }

    #[test]
    fn test_loopback_recovers_last_field() {
        let f = framer();
        let frame = f.encode(&Request::read_reg(0x42)).unwrap();
        // Loopback returns the filler in the reply position, not the address
        let resp = f.decode(Opcode::ReadReg, &frame).unwrap();
        assert_eq!(resp.value, Some(opcodes::FILLER));

        let frame = f.encode(&Request::read_id()).unwrap();
        let resp = f.decode(Opcode::ReadId, &frame).unwrap();
        assert_eq!(resp.value, Some(opcodes::READ_ID));
    }

    #[test]
    fn test_decode_ignores_dont_care_positions() {
        let f = framer();
        // Every don't-care position varies; the decoded value must not
        for junk in [0x00, 0xA5, 0xFF] {
            let resp = f.decode(Opcode::ReadReg, &[junk, junk, 0x99]).unwrap();
            assert_eq!(resp.value, Some(0x99));

            let resp = f.decode(Opcode::SetOutput, &[junk, 0x3C]).unwrap();
            assert_eq!(resp.value, Some(0x3C));

            let resp = f.decode(Opcode::WriteReg, &[junk, junk, junk]).unwrap();
            assert_eq!(resp.value, None);

            let resp = f.decode(Opcode::Nop, &[junk]).unwrap();
            assert_eq!(resp.value, None);
        }
    }

    #[test]
    fn test_only_meaningful_positions_reach_the_caller() {
        let f = framer();
        for op in Opcode::ALL {
            let layout = op.layout();
            let mut raw = [0u8; MAX_FRAME_LEN];
            let raw = &mut raw[..layout.len()];

            for junk in [0x00, 0x5A, 0xFF] {
                for (i, b) in raw.iter_mut().enumerate() {
                    *b = if layout.is_meaningful(i) { 0x77 } else { junk };
                }
                let expected = (0..layout.len()).any(|i| layout.is_meaningful(i)).then_some(0x77);
                assert_eq!(f.decode(op, raw).unwrap().value, expected, "{}", op);
            }
        }
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let f = framer();
        assert_eq!(
            f.decode(Opcode::ReadReg, &[0, 0]),
            Err(Error::MalformedRequest)
        );
        assert_eq!(f.decode(Opcode::ReadId, &[]), Err(Error::MalformedRequest));
    }
}
