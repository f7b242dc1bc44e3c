//! Device configuration register map.
//!
//! The device exposes a flat configuration area of 0x7C bytes. Every field has
//! a fixed address, width and type; values are little-endian. The host reads
//! the area as a series of blocks (see [`READ_BLOCKS`]) and writes one field at
//! a time.

use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use encoding_rs::WINDOWS_1251;
use serde::Serialize;

use super::config::REGISTER_READ_OPCODE;
use super::packet::decode_response;
use crate::error::{UpdateError, UpdateResult};

/// Text format for timestamp fields. Times are UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Width of a fixed string field, terminator included.
pub const FIXED_STRING_LEN: usize = 16;

/// Blocks requested when reading the whole configuration, as (address, count).
pub const READ_BLOCKS: &[(u8, u8)] = &[
    (0x00, 0x10),
    (0x10, 0x10),
    (0x20, 0x10),
    (0x30, 0x08),
    (0x38, 0x04),
    (0x3C, 0x10),
    (0x4C, 0x10),
    (0x5C, 0x10),
    (0x6C, 0x04),
    (0x70, 0x0C),
];

/// Storage type of a register field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RegisterType {
    Float32,
    UInt32,
    UInt32Hex,
    UnixTimestamp,
    Bitfield32,
    Int32,
    FixedString16,
    RawBytes,
}

impl RegisterType {
    /// Bytes occupied by a field, or `None` for the tail region which takes
    /// whatever remains.
    pub fn width(self) -> Option<usize> {
        match self {
            RegisterType::FixedString16 => Some(FIXED_STRING_LEN),
            RegisterType::RawBytes => None,
            _ => Some(4),
        }
    }
}

/// One entry of the register table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterDescriptor {
    pub address: u8,
    pub name: &'static str,
    pub kind: RegisterType,
    pub editable: bool,
}

const fn field(address: u8, name: &'static str, kind: RegisterType) -> RegisterDescriptor {
    RegisterDescriptor {
        address,
        name,
        kind,
        editable: true,
    }
}

/// Register table ordered by address.
pub static REGISTER_MAP: &[RegisterDescriptor] = &[
    field(0x00, "Current calibration 0 µA", RegisterType::Float32),
    field(0x04, "Current calibration 2 µA", RegisterType::Float32),
    field(0x08, "Current calibration 10 µA", RegisterType::Float32),
    field(0x0C, "Current calibration 20 µA", RegisterType::Float32),
    field(0x10, "Current calibration 30 µA", RegisterType::Float32),
    field(0x14, "Current calibration 40 µA", RegisterType::Float32),
    field(0x18, "Current calibration 60 µA", RegisterType::Float32),
    field(0x1C, "Temperature calibration (mV)", RegisterType::Float32),
    field(0x20, "R1 value (Ω)", RegisterType::UInt32),
    field(0x24, "Uref calibration", RegisterType::UInt32Hex),
    field(0x28, "Uw calibration", RegisterType::UInt32Hex),
    field(0x2C, "Temperature calibration (°C x10)", RegisterType::UInt32),
    field(0x30, "Manufacture date", RegisterType::UnixTimestamp),
    field(0x34, "Supply voltage calibration", RegisterType::Float32),
    field(0x38, "Device configuration word", RegisterType::Bitfield32),
    field(0x3C, "Operator name", RegisterType::FixedString16),
    field(0x4C, "Hardware revision", RegisterType::FixedString16),
    field(0x5C, "Serial number", RegisterType::FixedString16),
    field(0x6C, "Local time offset", RegisterType::Int32),
    RegisterDescriptor {
        address: 0x70,
        name: "Reserved area",
        kind: RegisterType::RawBytes,
        editable: false,
    },
];

/// Find the descriptor for a field starting at `address`.
pub fn lookup(address: u8) -> Option<&'static RegisterDescriptor> {
    REGISTER_MAP.iter().find(|d| d.address == address)
}

/// A typed register value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Float32(f32),
    UInt32(u32),
    UInt32Hex(u32),
    /// Seconds since the Unix epoch.
    UnixTimestamp(u32),
    Bitfield32(u32),
    Int32(i32),
    FixedString16(String),
    RawBytes(Vec<u8>),
}

impl ConfigValue {
    pub fn kind(&self) -> RegisterType {
        match self {
            ConfigValue::Float32(_) => RegisterType::Float32,
            ConfigValue::UInt32(_) => RegisterType::UInt32,
            ConfigValue::UInt32Hex(_) => RegisterType::UInt32Hex,
            ConfigValue::UnixTimestamp(_) => RegisterType::UnixTimestamp,
            ConfigValue::Bitfield32(_) => RegisterType::Bitfield32,
            ConfigValue::Int32(_) => RegisterType::Int32,
            ConfigValue::FixedString16(_) => RegisterType::FixedString16,
            ConfigValue::RawBytes(_) => RegisterType::RawBytes,
        }
    }

    /// Encode to the on-device byte layout.
    pub fn encode(&self) -> UpdateResult<Vec<u8>> {
        let bytes = match self {
            ConfigValue::Float32(v) => v.to_le_bytes().to_vec(),
            ConfigValue::UInt32(v)
            | ConfigValue::UInt32Hex(v)
            | ConfigValue::UnixTimestamp(v)
            | ConfigValue::Bitfield32(v) => v.to_le_bytes().to_vec(),
            ConfigValue::Int32(v) => v.to_le_bytes().to_vec(),
            ConfigValue::FixedString16(s) => encode_fixed_string(s)?,
            ConfigValue::RawBytes(b) => b.clone(),
        };
        Ok(bytes)
    }

    /// Decode a value of `kind` from the start of `bytes`.
    ///
    /// Returns `None` when fewer bytes are present than the type occupies.
    pub fn decode(kind: RegisterType, bytes: &[u8]) -> Option<ConfigValue> {
        if kind == RegisterType::RawBytes {
            return Some(ConfigValue::RawBytes(bytes.to_vec()));
        }
        if kind == RegisterType::FixedString16 {
            let field = bytes.get(..FIXED_STRING_LEN)?;
            let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
            let (text, _) = WINDOWS_1251.decode_without_bom_handling(&field[..end]);
            return Some(ConfigValue::FixedString16(text.into_owned()));
        }

        let word: [u8; 4] = bytes.get(..4)?.try_into().ok()?;
        let value = match kind {
            RegisterType::Float32 => ConfigValue::Float32(f32::from_le_bytes(word)),
            RegisterType::UInt32 => ConfigValue::UInt32(u32::from_le_bytes(word)),
            RegisterType::UInt32Hex => ConfigValue::UInt32Hex(u32::from_le_bytes(word)),
            RegisterType::UnixTimestamp => ConfigValue::UnixTimestamp(u32::from_le_bytes(word)),
            RegisterType::Bitfield32 => ConfigValue::Bitfield32(u32::from_le_bytes(word)),
            RegisterType::Int32 => ConfigValue::Int32(i32::from_le_bytes(word)),
            RegisterType::FixedString16 | RegisterType::RawBytes => return None,
        };
        Some(value)
    }

    /// Parse user-entered text as a value of `kind`.
    pub fn parse(kind: RegisterType, text: &str) -> UpdateResult<ConfigValue> {
        let trimmed = text.trim();
        let invalid = || UpdateError::validation(format!("'{}' is not a valid {:?}", trimmed, kind));

        let value = match kind {
            RegisterType::Float32 => ConfigValue::Float32(trimmed.parse().map_err(|_| invalid())?),
            RegisterType::UInt32 => ConfigValue::UInt32(trimmed.parse().map_err(|_| invalid())?),
            RegisterType::UInt32Hex => {
                let parsed = match trimmed
                    .strip_prefix("0x")
                    .or_else(|| trimmed.strip_prefix("0X"))
                {
                    Some(digits) => u32::from_str_radix(digits, 16),
                    None => trimmed.parse(),
                };
                ConfigValue::UInt32Hex(parsed.map_err(|_| invalid())?)
            }
            RegisterType::UnixTimestamp => {
                let parsed = NaiveDateTime::parse_from_str(trimmed, TIMESTAMP_FORMAT)
                    .map_err(|_| invalid())?;
                let secs = u32::try_from(parsed.and_utc().timestamp()).map_err(|_| invalid())?;
                ConfigValue::UnixTimestamp(secs)
            }
            RegisterType::Bitfield32 => {
                let digits: String = trimmed
                    .chars()
                    .filter(|c| *c != ' ' && *c != '_')
                    .collect();
                if digits.is_empty() || digits.len() > 32 {
                    return Err(invalid());
                }
                ConfigValue::Bitfield32(u32::from_str_radix(&digits, 2).map_err(|_| invalid())?)
            }
            RegisterType::Int32 => ConfigValue::Int32(trimmed.parse().map_err(|_| invalid())?),
            RegisterType::FixedString16 => {
                // Leading/trailing spaces are significant in names
                let value = ConfigValue::FixedString16(text.to_string());
                value.encode()?;
                value
            }
            RegisterType::RawBytes => {
                let compact: String = trimmed.split_whitespace().collect();
                ConfigValue::RawBytes(hex::decode(compact).map_err(|_| invalid())?)
            }
        };
        Ok(value)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Float32(v) => write!(f, "{}", v),
            ConfigValue::UInt32(v) => write!(f, "{}", v),
            ConfigValue::UInt32Hex(v) => write!(f, "0x{:08X}", v),
            ConfigValue::UnixTimestamp(secs) => match DateTime::from_timestamp(*secs as i64, 0) {
                Some(dt) => write!(f, "{}", dt.format(TIMESTAMP_FORMAT)),
                None => write!(f, "{}", secs),
            },
            ConfigValue::Bitfield32(v) => write!(f, "{:032b}", v),
            ConfigValue::Int32(v) => write!(f, "{}", v),
            ConfigValue::FixedString16(s) => f.write_str(s),
            ConfigValue::RawBytes(b) => {
                let pairs: Vec<String> = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                f.write_str(&pairs.join(" "))
            }
        }
    }
}

/// Encode text as a NUL-padded CP1251 field.
fn encode_fixed_string(s: &str) -> UpdateResult<Vec<u8>> {
    if s.contains('\0') {
        return Err(UpdateError::validation("text must not contain NUL characters"));
    }
    let (encoded, _, unmappable) = WINDOWS_1251.encode(s);
    if unmappable {
        return Err(UpdateError::validation(format!(
            "'{}' has characters outside CP1251",
            s
        )));
    }
    if encoded.len() >= FIXED_STRING_LEN {
        return Err(UpdateError::validation(format!(
            "'{}' is {} bytes; at most {} fit",
            s,
            encoded.len(),
            FIXED_STRING_LEN - 1
        )));
    }

    let mut field = vec![0u8; FIXED_STRING_LEN];
    field[..encoded.len()].copy_from_slice(&encoded);
    Ok(field)
}

/// A decoded register with its table entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigEntry {
    pub descriptor: &'static RegisterDescriptor,
    pub value: ConfigValue,
}

impl ConfigEntry {
    pub fn address(&self) -> u8 {
        self.descriptor.address
    }
}

/// Split a block of register bytes starting at `base` into typed entries.
///
/// Bytes at addresses with no table entry are skipped one at a time. A field
/// that does not fit in the remaining bytes ends the walk.
pub fn parse_register_block(base: u8, count: u8, data: &[u8]) -> Vec<ConfigEntry> {
    let limit = data.len().min(count as usize);
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset < limit {
        let Ok(address) = u8::try_from(base as usize + offset) else {
            break;
        };
        let Some(descriptor) = lookup(address) else {
            offset += 1;
            continue;
        };

        let remaining = &data[offset..limit];
        let width = descriptor.kind.width().unwrap_or(remaining.len());
        if width > remaining.len() {
            break;
        }
        let Some(value) = ConfigValue::decode(descriptor.kind, &remaining[..width]) else {
            break;
        };

        entries.push(ConfigEntry { descriptor, value });
        offset += width;
    }

    entries
}

/// Decode a register read reply and parse its data block.
///
/// Returns `None` if the reply is not a successful read response.
pub fn parse_register_reply(bytes: &[u8]) -> Option<Vec<ConfigEntry>> {
    let frame = decode_response(bytes, REGISTER_READ_OPCODE)?;
    Some(parse_register_block(frame.address, frame.count, frame.data))
}
