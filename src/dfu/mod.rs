//! Firmware updates for satellite devices.
//!
//! Two transfer paths exist, chosen by the firmware file name:
//!
//! - `DfuAppOnline_<x.y.z>.zip` (model A) is sent in-band as image and
//!   metadata chunks over the command link after entering boot mode.
//! - `AppOnline_<x.y.z>.zip` (model B) is handed to an external bootloader
//!   updater once the device re-advertises at its bootloader address.
//!
//! # Example
//!
//! ```ignore
//! let mut orchestrator = UpdateOrchestrator::new(link, collaborators, settings);
//! orchestrator
//!     .start_update(&device, Path::new("DfuAppOnline_4.1.2.zip"), |stage| {
//!         println!("{}: {:.0}%", stage.message(), stage.percent())
//!     })
//!     .await?;
//! ```

pub mod archive;
pub mod collaborators;
pub mod firmware;
pub mod orchestrator;
pub mod stage;

pub use archive::{read_firmware_zip, FirmwareArchive, FirmwarePayload, ZipFirmwareArchive};
pub use collaborators::{BootloaderUpdater, Discovery};
pub use firmware::{validate_for_device_model, FirmwareFile, FirmwareKind, FirmwareVersion};
pub use orchestrator::{UpdateCollaborators, UpdateOrchestrator, UpdateSession, UpdateState};
pub use stage::UpdateStage;
