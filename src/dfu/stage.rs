use serde::Serialize;

/// Progress stages reported during an update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "camelCase")]
pub enum UpdateStage {
    /// Checking the firmware file against the device.
    Validating,
    /// Bringing the link up.
    Connecting,
    /// Presenting the PIN.
    Authenticating,
    /// Asking the device to enter boot mode.
    EnteringBootMode,
    /// Extracting the firmware archive.
    ReadingArchive,
    /// Sending image and metadata chunks.
    Uploading { sent: usize, total: usize },
    /// Scanning for the bootloader.
    AwaitingBootloader { address: String },
    /// Bootloader update running.
    UpdatingBootloader,
    /// Update complete.
    Complete,
    /// Log message.
    Log { message: String },
}

impl UpdateStage {
    /// Get a percentage estimate for this stage.
    pub fn percent(&self) -> f32 {
        match self {
            UpdateStage::Validating => 0.0,
            UpdateStage::Connecting => 2.0,
            UpdateStage::Authenticating => 5.0,
            UpdateStage::EnteringBootMode => 8.0,
            UpdateStage::ReadingArchive => 10.0,
            UpdateStage::Uploading { sent, total } => {
                if *total == 0 {
                    10.0
                } else {
                    10.0 + (*sent as f32 / *total as f32) * 88.0
                }
            }
            UpdateStage::AwaitingBootloader { .. } => 15.0,
            UpdateStage::UpdatingBootloader => 30.0,
            UpdateStage::Complete => 100.0,
            // Log messages don't affect progress percentage
            UpdateStage::Log { .. } => -1.0,
        }
    }

    /// Get a human-readable message for this stage.
    pub fn message(&self) -> String {
        match self {
            UpdateStage::Validating => "Validating firmware...".into(),
            UpdateStage::Connecting => "Connecting to device...".into(),
            UpdateStage::Authenticating => "Authenticating...".into(),
            UpdateStage::EnteringBootMode => "Entering boot mode...".into(),
            UpdateStage::ReadingArchive => "Reading firmware archive...".into(),
            UpdateStage::Uploading { sent, total } => {
                let percent = if *total == 0 {
                    0
                } else {
                    (sent * 100) / total
                };
                format!("Uploading firmware... {}%", percent)
            }
            UpdateStage::AwaitingBootloader { address } => {
                format!("Waiting for bootloader {}...", address)
            }
            UpdateStage::UpdatingBootloader => "Updating through bootloader...".into(),
            UpdateStage::Complete => "Update complete!".into(),
            UpdateStage::Log { message } => message.clone(),
        }
    }
}
