//! Error types for device configuration and firmware updates.

use std::fmt;

use thiserror::Error;

/// Result type alias for updater operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Errors that can occur while talking to a device or updating it.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP archive error.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON parsing error for settings, credentials or archive manifests.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The link is not connected to the device.
    #[error("Device not connected")]
    NotConnected,

    /// No reply arrived within the command timeout.
    #[error("Timeout waiting for response to {operation}")]
    Timeout { operation: String },

    /// The link failed to write a frame or closed its notification channel.
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Input rejected before any device I/O.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// The device refused the PIN or no PIN is known for it.
    #[error("Authentication failed: {reason}")]
    Authentication { reason: String },

    /// The device did not acknowledge the boot command.
    #[error("Boot mode rejected: {reason}")]
    Boot { reason: String },

    /// A firmware chunk was not acknowledged.
    #[error("Transfer failed at offset {offset}: {reason}")]
    Transfer { offset: usize, reason: String },

    /// The bootloader did not advertise within the discovery window.
    #[error("Bootloader {address} not found within {timeout_ms}ms")]
    DiscoveryTimeout { address: String, timeout_ms: u64 },

    /// The bootloader update collaborator reported failure.
    #[error("Bootloader update failed: {reason}")]
    Update { reason: String },

    /// Required file missing from the firmware archive.
    #[error("Missing file in firmware archive: {filename}")]
    MissingFile { filename: String },

    /// Invalid or malformed archive manifest.
    #[error("Invalid manifest: {reason}")]
    InvalidManifest { reason: String },

    /// Operation was cancelled by user.
    #[error("Operation cancelled by user")]
    Cancelled,

    /// An update is already running or awaiting acknowledgement.
    #[error("Update session is busy ({state})")]
    Busy { state: String },
}

/// Coarse classification of an [`UpdateError`], recorded in failed update states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ErrorKind {
    NotConnected,
    Timeout,
    TransportError,
    ValidationError,
    AuthenticationError,
    BootError,
    TransferError,
    DiscoveryTimeout,
    UpdateError,
    ArchiveError,
    StorageError,
    Cancelled,
    Busy,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl UpdateError {
    pub fn validation(reason: impl Into<String>) -> Self {
        UpdateError::Validation {
            reason: reason.into(),
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        UpdateError::Transport {
            reason: reason.into(),
        }
    }

    /// Classify this error for state reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::Io(_) | UpdateError::Json(_) => ErrorKind::StorageError,
            UpdateError::Zip(_)
            | UpdateError::MissingFile { .. }
            | UpdateError::InvalidManifest { .. } => ErrorKind::ArchiveError,
            UpdateError::NotConnected => ErrorKind::NotConnected,
            UpdateError::Timeout { .. } => ErrorKind::Timeout,
            UpdateError::Transport { .. } => ErrorKind::TransportError,
            UpdateError::Validation { .. } => ErrorKind::ValidationError,
            UpdateError::Authentication { .. } => ErrorKind::AuthenticationError,
            UpdateError::Boot { .. } => ErrorKind::BootError,
            UpdateError::Transfer { .. } => ErrorKind::TransferError,
            UpdateError::DiscoveryTimeout { .. } => ErrorKind::DiscoveryTimeout,
            UpdateError::Update { .. } => ErrorKind::UpdateError,
            UpdateError::Cancelled => ErrorKind::Cancelled,
            UpdateError::Busy { .. } => ErrorKind::Busy,
        }
    }

    /// Check if this error is transient and the caller may try again.
    ///
    /// Nothing in this crate retries on its own.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            UpdateError::Timeout { .. }
                | UpdateError::Transport { .. }
                | UpdateError::DiscoveryTimeout { .. }
        )
    }

    /// Get a user-friendly error code for support purposes.
    pub fn error_code(&self) -> &'static str {
        match self {
            UpdateError::Io(_) => "UPD-001",
            UpdateError::Zip(_) => "UPD-002",
            UpdateError::Json(_) => "UPD-003",
            UpdateError::NotConnected => "UPD-010",
            UpdateError::Timeout { .. } => "UPD-011",
            UpdateError::Transport { .. } => "UPD-012",
            UpdateError::Validation { .. } => "UPD-020",
            UpdateError::Authentication { .. } => "UPD-030",
            UpdateError::Boot { .. } => "UPD-031",
            UpdateError::Transfer { .. } => "UPD-040",
            UpdateError::DiscoveryTimeout { .. } => "UPD-050",
            UpdateError::Update { .. } => "UPD-051",
            UpdateError::MissingFile { .. } => "UPD-060",
            UpdateError::InvalidManifest { .. } => "UPD-061",
            UpdateError::Busy { .. } => "UPD-098",
            UpdateError::Cancelled => "UPD-099",
        }
    }
}
