//! Firmware update state machine.
//!
//! # Flow
//!
//! 1. **Validating** - classify the firmware file and check it against the
//!    device model. Nothing touches the link until this passes.
//! 2. **Authenticating** - connect if needed and present the PIN (model A) or
//!    the master credential (model B).
//! 3. **Transferring** - enter boot mode, then either
//!    - model A: send the image and metadata in chunks over the command link
//!    - model B: wait for the bootloader to advertise (**AwaitingDfu**) and
//!      hand the archive to the bootloader updater
//! 4. **Succeeded**, **Failed** or **BootFailed**, held until acknowledged.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use serde::Serialize;

use super::archive::FirmwareArchive;
use super::collaborators::{BootloaderUpdater, Discovery};
use super::firmware::{validate_for_device_model, FirmwareFile, FirmwareKind};
use super::stage::UpdateStage;
use crate::cancel::CancelHandle;
use crate::credentials::CredentialStore;
use crate::device::{authenticate, derive_bootloader_address, enter_boot_mode, Device};
use crate::error::{ErrorKind, UpdateError, UpdateResult};
use crate::protocol::config::{BOOT_MODE_START, FIRMWARE_CHUNK_OPCODE, METADATA_CHUNK_OPCODE};
use crate::protocol::packet::encode_frame;
use crate::settings::UpdaterSettings;
use crate::transport::{
    connect_within, disconnect_within, ChunkedTransfer, CommandTransport, Link,
};

/// State of the update state machine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum UpdateState {
    Idle,
    Validating,
    Authenticating,
    Transferring,
    AwaitingDfu,
    Succeeded,
    Failed { kind: ErrorKind, reason: String },
    BootFailed { reason: String },
}

impl UpdateState {
    /// Whether the attempt is over and waiting for [`UpdateOrchestrator::acknowledge`].
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UpdateState::Succeeded | UpdateState::Failed { .. } | UpdateState::BootFailed { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            UpdateState::Idle => "Idle",
            UpdateState::Validating => "Validating",
            UpdateState::Authenticating => "Authenticating",
            UpdateState::Transferring => "Transferring",
            UpdateState::AwaitingDfu => "AwaitingDfu",
            UpdateState::Succeeded => "Succeeded",
            UpdateState::Failed { .. } => "Failed",
            UpdateState::BootFailed { .. } => "BootFailed",
        }
    }
}

/// One update attempt.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSession {
    pub device: Device,
    pub firmware_path: PathBuf,
    /// Set once the file name has been parsed.
    pub firmware: Option<FirmwareFile>,
    history: Vec<UpdateState>,
}

impl UpdateSession {
    fn new(device: Device, firmware_path: &Path) -> Self {
        Self {
            device,
            firmware_path: firmware_path.to_path_buf(),
            firmware: None,
            history: Vec::new(),
        }
    }

    /// States entered during this attempt, in order.
    pub fn history(&self) -> &[UpdateState] {
        &self.history
    }

    pub fn state(&self) -> &UpdateState {
        self.history.last().unwrap_or(&UpdateState::Idle)
    }

    pub fn visited(&self, name: &str) -> bool {
        self.history.iter().any(|s| s.name() == name)
    }
}

/// Host services the orchestrator depends on.
#[derive(Clone)]
pub struct UpdateCollaborators {
    pub discovery: Arc<dyn Discovery>,
    pub archive: Arc<dyn FirmwareArchive>,
    pub credentials: Arc<dyn CredentialStore>,
    pub bootloader: Arc<dyn BootloaderUpdater>,
}

/// Drives one firmware update at a time over a link.
pub struct UpdateOrchestrator<L: Link> {
    transport: CommandTransport<L>,
    collaborators: UpdateCollaborators,
    settings: UpdaterSettings,
    cancel: CancelHandle,
    state: UpdateState,
    session: Option<UpdateSession>,
}

impl<L: Link> UpdateOrchestrator<L> {
    pub fn new(link: L, collaborators: UpdateCollaborators, settings: UpdaterSettings) -> Self {
        Self {
            transport: CommandTransport::with_timeout(link, settings.command_timeout()),
            collaborators,
            settings,
            cancel: CancelHandle::new(),
            state: UpdateState::Idle,
            session: None,
        }
    }

    pub fn state(&self) -> &UpdateState {
        &self.state
    }

    /// The current or most recent attempt.
    pub fn session(&self) -> Option<&UpdateSession> {
        self.session.as_ref()
    }

    pub fn link(&self) -> &L {
        self.transport.link()
    }

    pub fn can_start(&self) -> bool {
        self.state == UpdateState::Idle
    }

    /// Handle for cancelling the running update from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Return a finished attempt to `Idle`. Returns `false` if no attempt had
    /// finished.
    pub fn acknowledge(&mut self) -> bool {
        if !self.state.is_terminal() {
            return false;
        }
        self.state = UpdateState::Idle;
        true
    }

    /// Update `device` with the firmware archive at `firmware_path`.
    ///
    /// The attempt ends in a terminal state whatever the outcome. On
    /// cancellation the link is disconnected.
    pub async fn start_update<F>(
        &mut self,
        device: &Device,
        firmware_path: &Path,
        on_progress: F,
    ) -> UpdateResult<()>
    where
        F: Fn(UpdateStage),
    {
        if !self.can_start() {
            return Err(UpdateError::Busy {
                state: self.state.name().to_string(),
            });
        }
        self.settings.validate()?;

        info!(
            "Starting update of {} with {}",
            device.display_label(),
            firmware_path.display()
        );
        self.cancel.reset();
        self.session = Some(UpdateSession::new(device.clone(), firmware_path));

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            result = self.drive(device, firmware_path, &on_progress) => result,
            _ = cancel.cancelled() => Err(UpdateError::Cancelled),
        };

        if matches!(result, Err(UpdateError::Cancelled)) {
            self.release_after_cancel().await;
        }

        let terminal = match &result {
            Ok(()) => {
                info!("Update of {} succeeded", device.display_label());
                on_progress(UpdateStage::Complete);
                UpdateState::Succeeded
            }
            Err(e) => {
                error!("Update failed [{}]: {}", e.error_code(), e);
                on_progress(UpdateStage::Log {
                    message: format!("Update failed: {} ({})", e, e.error_code()),
                });
                match e {
                    UpdateError::Boot { reason } => UpdateState::BootFailed {
                        reason: reason.clone(),
                    },
                    other => UpdateState::Failed {
                        kind: other.kind(),
                        reason: other.to_string(),
                    },
                }
            }
        };
        self.transition(terminal);

        result
    }

    async fn drive<F>(
        &mut self,
        device: &Device,
        firmware_path: &Path,
        on_progress: &F,
    ) -> UpdateResult<()>
    where
        F: Fn(UpdateStage),
    {
        // Step 1: Validate firmware against the device
        self.transition(UpdateState::Validating);
        on_progress(UpdateStage::Validating);
        let firmware = FirmwareFile::from_path(firmware_path)?;
        validate_for_device_model(&firmware, device.model())?;
        on_progress(UpdateStage::Log {
            message: format!("Firmware {} ({:?})", firmware.version, firmware.kind),
        });
        if let Some(session) = self.session.as_mut() {
            session.firmware = Some(firmware.clone());
        }

        // Step 2: Connect and authenticate
        self.transition(UpdateState::Authenticating);
        let credential = self.credential_for(device, firmware.kind)?;
        if !self.transport.link().is_connected() {
            on_progress(UpdateStage::Connecting);
            let timeout = self.settings.connect_timeout();
            connect_within(self.transport.link(), device, timeout).await?;
        }
        on_progress(UpdateStage::Authenticating);
        authenticate(&mut self.transport, &credential).await?;

        // Step 3: Boot mode, then the model-specific transfer
        self.transition(UpdateState::Transferring);
        on_progress(UpdateStage::EnteringBootMode);
        enter_boot_mode(&mut self.transport).await?;

        match firmware.kind {
            FirmwareKind::ModelA => self.transfer_in_band(&firmware, on_progress).await,
            FirmwareKind::ModelB => {
                self.hand_off_to_bootloader(device, &firmware, on_progress)
                    .await
            }
        }
    }

    fn credential_for(&self, device: &Device, kind: FirmwareKind) -> UpdateResult<String> {
        match kind {
            FirmwareKind::ModelA => self
                .collaborators
                .credentials
                .get(&device.address)?
                .ok_or_else(|| UpdateError::Authentication {
                    reason: format!("no PIN stored for {}", device.address),
                }),
            FirmwareKind::ModelB => Ok(self.settings.master_credential.clone()),
        }
    }

    async fn transfer_in_band<F>(&mut self, firmware: &FirmwareFile, on_progress: &F) -> UpdateResult<()>
    where
        F: Fn(UpdateStage),
    {
        tokio::time::sleep(self.settings.boot_settle()).await;

        on_progress(UpdateStage::ReadingArchive);
        let payload = self.collaborators.archive.extract(&firmware.path).await?;
        let engine = ChunkedTransfer::new(self.settings.chunk_size)?;
        let image_len = payload.image.len();
        let total = image_len + payload.metadata.len();
        let cancel = self.cancel.clone();

        info!(
            "Sending {} image bytes and {} metadata bytes in {} byte chunks",
            image_len,
            payload.metadata.len(),
            engine.chunk_size()
        );

        engine
            .run(
                &mut self.transport,
                &payload.image,
                |offset, chunk| {
                    encode_frame(BOOT_MODE_START, FIRMWARE_CHUNK_OPCODE, offset as u32, chunk)
                },
                |sent, _| on_progress(UpdateStage::Uploading { sent, total }),
                &cancel,
            )
            .await?;

        engine
            .run(
                &mut self.transport,
                &payload.metadata,
                |offset, chunk| {
                    encode_frame(BOOT_MODE_START, METADATA_CHUNK_OPCODE, offset as u32, chunk)
                },
                |sent, _| {
                    on_progress(UpdateStage::Uploading {
                        sent: image_len + sent,
                        total,
                    })
                },
                &cancel,
            )
            .await?;

        Ok(())
    }

    async fn hand_off_to_bootloader<F>(
        &mut self,
        device: &Device,
        firmware: &FirmwareFile,
        on_progress: &F,
    ) -> UpdateResult<()>
    where
        F: Fn(UpdateStage),
    {
        let address = derive_bootloader_address(&device.address)?;
        self.transition(UpdateState::AwaitingDfu);
        on_progress(UpdateStage::AwaitingBootloader {
            address: address.clone(),
        });

        let discovery = Arc::clone(&self.collaborators.discovery);
        let window = self.settings.discovery_timeout();

        // Starting the scan counts against the discovery window
        let found = tokio::time::timeout(window, async {
            let mut scan = discovery.start_scan().await?;
            while let Some(candidate) = scan.recv().await {
                debug!("Discovered {} ({} dBm)", candidate.address, candidate.rssi);
                if candidate.same_address(&address) {
                    return Ok(true);
                }
            }
            Ok::<bool, UpdateError>(false)
        })
        .await;
        self.stop_scan().await;

        match found {
            Ok(Ok(true)) => {}
            Ok(Err(e)) => return Err(e),
            Ok(Ok(false)) | Err(_) => {
                return Err(UpdateError::DiscoveryTimeout {
                    address,
                    timeout_ms: window.as_millis() as u64,
                });
            }
        }

        info!("Bootloader {} found", address);
        on_progress(UpdateStage::UpdatingBootloader);
        if !self
            .collaborators
            .bootloader
            .update(&address, &firmware.path)
            .await
        {
            return Err(UpdateError::Update {
                reason: format!("bootloader {} did not accept {}", address, firmware.file_name),
            });
        }
        Ok(())
    }

    /// Stop scanning and drop the link after a cancelled attempt.
    async fn release_after_cancel(&mut self) {
        warn!("Update cancelled in state {}", self.state.name());
        if self.state == UpdateState::AwaitingDfu {
            self.stop_scan().await;
        }

        let link = self.transport.link();
        let timeout = self.settings.connect_timeout();
        if link.is_connected() && !disconnect_within(link, timeout).await {
            warn!("Disconnect after cancel was not confirmed");
        }
    }

    async fn stop_scan(&self) {
        let timeout = self.settings.connect_timeout();
        if tokio::time::timeout(timeout, self.collaborators.discovery.stop_scan())
            .await
            .is_err()
        {
            warn!("Stopping the scan did not return within {:?}", timeout);
        }
    }

    fn transition(&mut self, next: UpdateState) {
        debug!("Update state {} -> {}", self.state.name(), next.name());
        if let Some(session) = self.session.as_mut() {
            session.history.push(next.clone());
        }
        self.state = next;
    }
}
