use crate::device::{Device, DeviceInfo, DeviceModel};

/// Builder for creating test Device instances
pub struct DeviceBuilder {
    address: String,
    name: String,
    rssi: i16,
    info: Option<DeviceInfo>,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self {
            address: "AA:BB:CC:DD:EE:FF".to_string(),
            name: "SatelliteOnline0001".to_string(),
            rssi: -60,
            info: None,
        }
    }

    pub fn address(mut self, address: &str) -> Self {
        self.address = address.to_string();
        self
    }

    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn info(mut self, info: DeviceInfo) -> Self {
        self.info = Some(info);
        self
    }

    /// Device that reported software 4.1.2.
    pub fn model_a(self) -> Self {
        self.info(DeviceInfoBuilder::new("4.1.2", DeviceModel::ModelA).build())
    }

    /// Device that reported software 4.5.2.
    pub fn model_b(self) -> Self {
        self.info(DeviceInfoBuilder::new("4.5.2", DeviceModel::ModelB).build())
    }

    pub fn build(self) -> Device {
        Device {
            address: self.address,
            name: self.name,
            rssi: self.rssi,
            info: self.info,
        }
    }
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test DeviceInfo instances
pub struct DeviceInfoBuilder {
    software_version: String,
    model_tag: String,
    serial_number: String,
}

impl DeviceInfoBuilder {
    pub fn new(software_version: &str, model: DeviceModel) -> Self {
        Self {
            software_version: software_version.to_string(),
            model_tag: model.tag().to_string(),
            serial_number: "00010001".to_string(),
        }
    }

    pub fn model_tag(mut self, tag: &str) -> Self {
        self.model_tag = tag.to_string();
        self
    }

    pub fn serial_number(mut self, serial: &str) -> Self {
        self.serial_number = serial.to_string();
        self
    }

    pub fn build(self) -> DeviceInfo {
        DeviceInfo {
            firmware_version: format!("hw:1 sw:{}", self.software_version),
            software_version: self.software_version,
            model_tag: self.model_tag,
            serial_number: self.serial_number,
        }
    }
}
