//! Wire format of the satellite command link.
//!
//! - [`packet`] builds request frames and decodes replies
//! - [`registers`] maps configuration addresses to typed values
//! - [`config`] holds opcodes, timeouts and text command literals

pub mod config;
pub mod packet;
pub mod registers;

pub use packet::{decode_response, encode_frame, encode_response, ProtocolFrame, ResponseFrame};
pub use registers::{
    parse_register_block, ConfigEntry, ConfigValue, RegisterDescriptor, RegisterType,
    REGISTER_MAP,
};
