//! Frame encoding for the satellite command link.
//!
//! Boot mode frames use a fixed 7 byte header:
//!
//! ```text
//! [start][opcode][address: u32 LE][len: u8][payload; len]
//! ```
//!
//! Raw register frames carry a one byte address, and replies always come back as
//! `[0x00][opcode][address][count][data; count]`.

use super::config::{
    APPLY_OPCODE, FRAME_HEADER_LEN, MAX_PAYLOAD_LEN, RAW_START_MARK, REGISTER_READ_OPCODE,
    REGISTER_WRITE_OPCODE, RESPONSE_HEADER_LEN, RESPONSE_SUCCESS,
};

/// A request frame in boot mode layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolFrame {
    pub start: u8,
    pub opcode: u8,
    pub address: u32,
    pub payload: Vec<u8>,
}

impl ProtocolFrame {
    pub fn new(start: u8, opcode: u8, address: u32, payload: &[u8]) -> Self {
        Self {
            start,
            opcode,
            address,
            payload: payload.to_vec(),
        }
    }

    /// Encoded length, header included.
    pub fn encoded_len(&self) -> usize {
        FRAME_HEADER_LEN + self.payload.len()
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_frame(self.start, self.opcode, self.address, &self.payload)
    }
}

/// Encode a boot mode frame.
///
/// # Panics
/// If `payload` is longer than 255 bytes. Callers chunk data before framing it.
pub fn encode_frame(start: u8, opcode: u8, address: u32, payload: &[u8]) -> Vec<u8> {
    assert!(
        payload.len() <= MAX_PAYLOAD_LEN,
        "frame payload of {} bytes exceeds {}",
        payload.len(),
        MAX_PAYLOAD_LEN
    );

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    frame.push(start);
    frame.push(opcode);
    frame.extend_from_slice(&address.to_le_bytes());
    frame.push(payload.len() as u8);
    frame.extend_from_slice(payload);
    frame
}

/// Encode a raw register frame: `[0x21][opcode][address][count][payload]`.
///
/// For reads `count` is the number of bytes requested and `payload` is empty;
/// for writes `count` is the payload length.
pub fn encode_raw(opcode: u8, address: u8, count: u8, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() <= MAX_PAYLOAD_LEN);

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.push(RAW_START_MARK);
    frame.push(opcode);
    frame.push(address);
    frame.push(count);
    frame.extend_from_slice(payload);
    frame
}

/// Request `count` register bytes starting at `address`.
pub fn register_read_request(address: u8, count: u8) -> Vec<u8> {
    encode_raw(REGISTER_READ_OPCODE, address, count, &[])
}

/// Write an encoded register value at `address`.
pub fn register_write_request(address: u8, value: &[u8]) -> Vec<u8> {
    encode_raw(REGISTER_WRITE_OPCODE, address, value.len() as u8, value)
}

/// Commit written registers.
pub fn apply_request() -> Vec<u8> {
    vec![RAW_START_MARK, APPLY_OPCODE]
}

/// Whether a reply acknowledges [`apply_request`].
pub fn is_apply_ack(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == RESPONSE_SUCCESS && bytes[1] == APPLY_OPCODE
}

/// Encode a text command as sent over the link.
pub fn encode_text(command: &str) -> Vec<u8> {
    command.as_bytes().to_vec()
}

/// A decoded device reply, borrowing from the notification buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFrame<'a> {
    pub opcode: u8,
    pub address: u8,
    pub count: u8,
    pub data: &'a [u8],
}

/// Decode a reply to a request with `expected_opcode`.
///
/// Returns `None` for empty or short input, a non-success status byte, or an
/// opcode mismatch. `data` is clamped to the bytes actually present.
pub fn decode_response(bytes: &[u8], expected_opcode: u8) -> Option<ResponseFrame<'_>> {
    if bytes.len() < RESPONSE_HEADER_LEN {
        return None;
    }
    if bytes[0] != RESPONSE_SUCCESS || bytes[1] != expected_opcode {
        return None;
    }

    let count = bytes[3];
    let end = (RESPONSE_HEADER_LEN + count as usize).min(bytes.len());

    Some(ResponseFrame {
        opcode: bytes[1],
        address: bytes[2],
        count,
        data: &bytes[RESPONSE_HEADER_LEN..end],
    })
}

/// Encode a reply the way the device does. Used by simulators.
pub fn encode_response(opcode: u8, address: u8, data: &[u8]) -> Vec<u8> {
    assert!(data.len() <= MAX_PAYLOAD_LEN);

    let mut reply = Vec::with_capacity(RESPONSE_HEADER_LEN + data.len());
    reply.push(RESPONSE_SUCCESS);
    reply.push(opcode);
    reply.push(address);
    reply.push(data.len() as u8);
    reply.extend_from_slice(data);
    reply
}
