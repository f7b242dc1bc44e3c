//! Interactive session with one connected device.
//!
//! Covers everything outside a firmware update: pairing, reading identity,
//! reading and writing configuration registers, and free-form terminal
//! commands.

use std::sync::Arc;

use log::{debug, info, warn};

use super::auth::authenticate;
use super::info::{Device, DeviceInfo, DeviceModel};
use crate::credentials::CredentialStore;
use crate::dfu::firmware::FirmwareVersion;
use crate::error::{UpdateError, UpdateResult};
use crate::protocol::config::{
    DEVICE_NAME_PREFIX, SERIAL_COMMAND, SERIAL_REPLY_PREFIX, SET_RAW_COMMAND, SET_RAW_OK,
    SOFTWARE_VERSION_TAG, VERSION_COMMAND,
};
use crate::protocol::packet::{
    apply_request, is_apply_ack, register_read_request, register_write_request,
};
use crate::protocol::registers::{
    lookup, parse_register_reply, ConfigEntry, ConfigValue, READ_BLOCKS,
};
use crate::settings::UpdaterSettings;
use crate::transport::command::{reply_text, CommandOutcome, CommandTransport};
use crate::transport::link::{connect_within, disconnect_within, Link};

/// Session with one device over one link.
pub struct DeviceSession<L: Link> {
    transport: CommandTransport<L>,
    device: Device,
    credentials: Arc<dyn CredentialStore>,
    settings: UpdaterSettings,
    /// Set once `setraw` is acknowledged on the current connection.
    raw_mode_active: bool,
}

impl<L: Link> DeviceSession<L> {
    pub fn new(
        link: L,
        device: Device,
        credentials: Arc<dyn CredentialStore>,
        settings: UpdaterSettings,
    ) -> Self {
        Self {
            transport: CommandTransport::with_timeout(link, settings.command_timeout()),
            device,
            credentials,
            settings,
            raw_mode_active: false,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn link(&self) -> &L {
        self.transport.link()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.link().is_connected()
    }

    pub fn raw_mode_active(&self) -> bool {
        self.raw_mode_active
    }

    /// Connect and authenticate.
    ///
    /// With `pin` the PIN is sent and remembered on success. Without it the
    /// stored PIN for this device is used.
    pub async fn connect(&mut self, pin: Option<&str>) -> UpdateResult<()> {
        self.raw_mode_active = false;

        let credential = match pin {
            Some(pin) => pin.to_string(),
            None => self.credentials.get(&self.device.address)?.ok_or_else(|| {
                UpdateError::Authentication {
                    reason: format!("no PIN stored for {}", self.device.address),
                }
            })?,
        };

        if !self.is_connected() {
            info!("Connecting to {}", self.device.display_label());
            let timeout = self.settings.connect_timeout();
            connect_within(self.transport.link(), &self.device, timeout).await?;
        }

        authenticate(&mut self.transport, &credential).await?;

        if pin.is_some() {
            self.credentials.put(&self.device.address, &credential)?;
        }
        Ok(())
    }

    /// Ask the device for its version and serial number.
    ///
    /// Updates the device's info and renames it after its serial number.
    pub async fn exchange_device_info(&mut self) -> UpdateResult<DeviceInfo> {
        let reply = self
            .transport
            .send_text_expect(VERSION_COMMAND, SOFTWARE_VERSION_TAG)
            .await
            .into_result(VERSION_COMMAND)?;
        let firmware_version = reply_text(&reply);
        let software_version = parse_software_version(&firmware_version).unwrap_or_default();

        let reply = self
            .transport
            .send_text_expect(SERIAL_COMMAND, SERIAL_REPLY_PREFIX)
            .await
            .into_result(SERIAL_COMMAND)?;
        let serial_number = parse_serial(&reply_text(&reply)).unwrap_or_default();

        let model_tag = software_version
            .parse::<FirmwareVersion>()
            .ok()
            .and_then(|v| DeviceModel::from_software_version(&v))
            .map(|m| m.tag().to_string())
            .unwrap_or_default();
        if model_tag.is_empty() {
            warn!("Unrecognised software version '{}'", software_version);
        }

        let info = DeviceInfo {
            firmware_version,
            software_version,
            model_tag,
            serial_number,
        };

        if let Some(name) = device_name(&info.serial_number) {
            self.device.name = name;
        }
        self.device.info = Some(info.clone());
        Ok(info)
    }

    /// Read every configuration register.
    pub async fn read_configuration(&mut self) -> UpdateResult<Vec<ConfigEntry>> {
        self.ensure_raw_mode().await?;

        let mut entries = Vec::new();
        for &(address, count) in READ_BLOCKS {
            let reply = self
                .transport
                .send_with(&register_read_request(address, count), |reply| {
                    parse_register_reply(reply).is_some()
                })
                .await;
            let reply = self.checked(reply, "register read")?;
            let block = parse_register_reply(&reply).unwrap_or_default();
            debug!("Block 0x{:02X}: {} entries", address, block.len());
            entries.extend(block);
        }

        Ok(entries)
    }

    /// Write changed registers and commit them.
    ///
    /// Every change is checked against the register table before anything is
    /// sent.
    pub async fn write_configuration(&mut self, changes: &[(u8, ConfigValue)]) -> UpdateResult<()> {
        let mut frames = Vec::with_capacity(changes.len());
        for (address, value) in changes {
            let descriptor = lookup(*address).ok_or_else(|| {
                UpdateError::validation(format!("no register at 0x{:02X}", address))
            })?;
            if !descriptor.editable {
                return Err(UpdateError::validation(format!(
                    "{} is read-only",
                    descriptor.name
                )));
            }
            if value.kind() != descriptor.kind {
                return Err(UpdateError::validation(format!(
                    "{} expects {:?}, got {:?}",
                    descriptor.name,
                    descriptor.kind,
                    value.kind()
                )));
            }
            frames.push(register_write_request(*address, &value.encode()?));
        }

        if frames.is_empty() {
            return Ok(());
        }

        self.ensure_raw_mode().await?;

        for frame in frames {
            let reply = self
                .transport
                .send_with(&frame, |reply| !reply.is_empty())
                .await;
            self.checked(reply, "register write")?;
        }

        let reply = self.transport.send_with(&apply_request(), is_apply_ack).await;
        self.checked(reply, "apply")?;
        info!("Applied {} register change(s)", changes.len());
        Ok(())
    }

    /// Send a free-form command and return the reply text.
    pub async fn send_terminal_command(&mut self, command: &str) -> UpdateResult<String> {
        let reply = self.transport.send_text(command).await;
        let reply = self.checked(reply, command)?;
        Ok(reply_text(&reply))
    }

    pub async fn disconnect(&mut self) -> UpdateResult<()> {
        self.raw_mode_active = false;
        if !self.is_connected() {
            return Ok(());
        }

        let timeout = self.settings.connect_timeout();
        if !disconnect_within(self.transport.link(), timeout).await {
            return Err(UpdateError::transport(format!(
                "disconnect not confirmed within {:?}",
                timeout
            )));
        }
        Ok(())
    }

    async fn ensure_raw_mode(&mut self) -> UpdateResult<()> {
        if !self.is_connected() {
            self.raw_mode_active = false;
            return Err(UpdateError::NotConnected);
        }
        if self.raw_mode_active {
            return Ok(());
        }

        let reply = self
            .transport
            .send_text_expect(SET_RAW_COMMAND, SET_RAW_OK)
            .await;
        self.checked(reply, SET_RAW_COMMAND)?;
        self.raw_mode_active = true;
        Ok(())
    }

    fn checked(&mut self, outcome: CommandOutcome, operation: &str) -> UpdateResult<Vec<u8>> {
        if outcome == CommandOutcome::DeviceNotConnected {
            self.raw_mode_active = false;
        }
        outcome.into_result(operation)
    }
}

fn parse_serial(reply: &str) -> Option<String> {
    let start = reply.find(SERIAL_REPLY_PREFIX)? + SERIAL_REPLY_PREFIX.len();
    let serial = reply[start..].split_whitespace().next()?;
    Some(serial.to_string())
}

/// Extract the `x.y.z` after `sw:` in a version reply.
fn parse_software_version(reply: &str) -> Option<String> {
    let start = reply.find(SOFTWARE_VERSION_TAG)? + SOFTWARE_VERSION_TAG.len();
    let version: String = reply[start..]
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let version = version.trim_end_matches('.');
    (!version.is_empty()).then(|| version.to_string())
}

fn device_name(serial: &str) -> Option<String> {
    let chars: Vec<char> = serial.chars().collect();
    if chars.len() < 4 {
        return None;
    }
    let suffix: String = chars[chars.len() - 4..].iter().collect();
    Some(format!("{}{}", DEVICE_NAME_PREFIX, suffix))
}
