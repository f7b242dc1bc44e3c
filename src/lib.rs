//! Firmware update and configuration library for SatelliteOnline devices.
//!
//! The crate talks to a device over a notification link (see
//! [`transport::Link`]) using short text commands and binary register frames.
//!
//! # Modules
//!
//! - [`protocol`] - frame codec, register map and protocol constants
//! - [`transport`] - request/response exchange and chunked transfers
//! - [`device`] - device identity, authentication and the interactive session
//! - [`dfu`] - firmware file handling and the update state machine
//! - [`credentials`] - per-device PIN storage
//! - [`settings`] - persisted updater settings

pub mod cancel;
pub mod credentials;
pub mod device;
pub mod dfu;
pub mod error;
pub mod protocol;
pub mod settings;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use cancel::CancelHandle;
pub use credentials::{CredentialStore, FileCredentialStore};
pub use device::{Device, DeviceInfo, DeviceModel, DeviceSession};
pub use dfu::{UpdateCollaborators, UpdateOrchestrator, UpdateStage, UpdateState};
pub use error::{ErrorKind, UpdateError, UpdateResult};
pub use settings::{SettingsManager, UpdaterSettings};
