use serde::{Deserialize, Serialize};

use crate::dfu::firmware::FirmwareVersion;

/// Hardware family of a device. Decides which firmware it accepts and how
/// firmware reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceModel {
    /// Updated in-band over the command link.
    ModelA,
    /// Updated by a separate bootloader after a reboot.
    ModelB,
}

impl DeviceModel {
    /// Classify a hardware model tag.
    ///
    /// Accepts the short tags `A`/`B` and the vendor tags `NORDIC`/`WCH`.
    pub fn from_tag(tag: &str) -> Option<DeviceModel> {
        let tag = tag.trim().to_ascii_uppercase();
        if tag == "A" || tag.contains("NORDIC") {
            Some(DeviceModel::ModelA)
        } else if tag == "B" || tag.contains("WCH") {
            Some(DeviceModel::ModelB)
        } else {
            None
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            DeviceModel::ModelA => "A",
            DeviceModel::ModelB => "B",
        }
    }

    /// Whether this model runs software `version`.
    ///
    /// Model A: 4.0.0 through 4.1.9. Model B: 4.5.0 through 4.9.x.
    pub fn accepts_version(self, version: &FirmwareVersion) -> bool {
        if version.major != 4 {
            return false;
        }
        match self {
            DeviceModel::ModelA => {
                version.minor < 1 || (version.minor == 1 && version.patch <= 9)
            }
            DeviceModel::ModelB => (5..=9).contains(&version.minor),
        }
    }

    pub fn supported_range(self) -> &'static str {
        match self {
            DeviceModel::ModelA => "4.0.0 - 4.1.9",
            DeviceModel::ModelB => "4.5.0 - 4.9.9",
        }
    }

    /// Infer the model from the software version the device reports.
    pub fn from_software_version(version: &FirmwareVersion) -> Option<DeviceModel> {
        [DeviceModel::ModelA, DeviceModel::ModelB]
            .into_iter()
            .find(|model| model.accepts_version(version))
    }
}

/// Identity and firmware details reported by a connected device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    /// Full reply to the `version` command.
    pub firmware_version: String,
    /// The `sw:` token of the version reply, e.g. `4.1.2`.
    pub software_version: String,
    /// Hardware model tag. Empty when the version matched no known model.
    pub model_tag: String,
    pub serial_number: String,
}

impl DeviceInfo {
    pub fn model(&self) -> Option<DeviceModel> {
        DeviceModel::from_tag(&self.model_tag)
    }
}

/// A discovered or connected device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Link address, e.g. `AA:BB:CC:DD:EE:FF`.
    pub address: String,
    pub name: String,
    pub rssi: i16,
    pub info: Option<DeviceInfo>,
}

impl Device {
    pub fn new(address: &str, name: &str, rssi: i16) -> Self {
        Self {
            address: address.to_string(),
            name: name.to_string(),
            rssi,
            info: None,
        }
    }

    pub fn model(&self) -> Option<DeviceModel> {
        self.info.as_ref().and_then(DeviceInfo::model)
    }

    /// Name for display, falling back to the address.
    pub fn display_label(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.address
        } else {
            &self.name
        }
    }

    pub fn same_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.same_address(&other.address)
    }
}

impl Eq for Device {}
