//! Device identity, authentication and the interactive session.

pub mod address;
pub mod auth;
mod info;
pub mod session;

pub use address::derive_bootloader_address;
pub use auth::{authenticate, enter_boot_mode};
pub use info::{Device, DeviceInfo, DeviceModel};
pub use session::DeviceSession;
