//! Firmware file naming and compatibility rules.
//!
//! Firmware archives are named `<prefix><anything>_<major>.<minor>.<patch>.zip`:
//! - `DfuAppOnline_` images are installed in-band on model A devices
//! - `AppOnline_` images are handed to the model B bootloader

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::device::DeviceModel;
use crate::error::{UpdateError, UpdateResult};
use crate::protocol::config::{
    FIRMWARE_EXTENSION, MODEL_A_FIRMWARE_PREFIX, MODEL_B_FIRMWARE_PREFIX,
};

/// Which device model an image is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FirmwareKind {
    ModelA,
    ModelB,
}

impl FirmwareKind {
    pub fn target_model(self) -> DeviceModel {
        match self {
            FirmwareKind::ModelA => DeviceModel::ModelA,
            FirmwareKind::ModelB => DeviceModel::ModelB,
        }
    }
}

/// A `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FirmwareVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FirmwareVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl FromStr for FirmwareVersion {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || UpdateError::validation(format!("'{}' is not a x.y.z version", s));

        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(invalid());
        }

        let mut numbers = [0u32; 3];
        for (slot, part) in numbers.iter_mut().zip(&parts) {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = part.parse().map_err(|_| invalid())?;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A firmware archive selected for an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareFile {
    pub kind: FirmwareKind,
    pub version: FirmwareVersion,
    pub file_name: String,
    pub path: PathBuf,
}

impl FirmwareFile {
    /// Classify the archive at `path` by its file name.
    pub fn from_path(path: &Path) -> UpdateResult<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UpdateError::validation(format!("'{}' has no file name", path.display()))
            })?
            .to_string();

        let (kind, version) = parse_file_name(&file_name)?;
        Ok(Self {
            kind,
            version,
            file_name,
            path: path.to_path_buf(),
        })
    }
}

/// Parse a firmware file name into its kind and version.
pub fn parse_file_name(file_name: &str) -> UpdateResult<(FirmwareKind, FirmwareVersion)> {
    let kind = if file_name.starts_with(MODEL_A_FIRMWARE_PREFIX) {
        FirmwareKind::ModelA
    } else if file_name.starts_with(MODEL_B_FIRMWARE_PREFIX) {
        FirmwareKind::ModelB
    } else {
        return Err(UpdateError::validation(format!(
            "'{}' is not a firmware file",
            file_name
        )));
    };

    let stem = file_name.strip_suffix(FIRMWARE_EXTENSION).ok_or_else(|| {
        UpdateError::validation(format!("'{}' is not a .zip archive", file_name))
    })?;
    let (_, version) = stem.rsplit_once('_').ok_or_else(|| {
        UpdateError::validation(format!("'{}' has no version suffix", file_name))
    })?;

    Ok((kind, version.parse()?))
}

/// Check that `firmware` may be installed on a device of `model`.
pub fn validate_for_device_model(
    firmware: &FirmwareFile,
    model: Option<DeviceModel>,
) -> UpdateResult<()> {
    let model = model.ok_or_else(|| UpdateError::validation("unknown device model"))?;

    if firmware.kind.target_model() != model {
        return Err(UpdateError::validation(format!(
            "model {} device requires model {} firmware",
            model.tag(),
            model.tag()
        )));
    }
    if !model.accepts_version(&firmware.version) {
        return Err(UpdateError::validation(format!(
            "model {} device requires firmware version {}",
            model.tag(),
            model.supported_range()
        )));
    }
    Ok(())
}
