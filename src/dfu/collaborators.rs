//! Host-provided services used by the model B update path.

use std::path::Path;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::device::Device;
use crate::error::UpdateResult;

/// Advertisement scanning.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Start scanning. Each advertising device is sent on the returned channel
    /// until [`stop_scan`](Self::stop_scan) is called.
    async fn start_scan(&self) -> UpdateResult<mpsc::Receiver<Device>>;

    async fn stop_scan(&self);
}

/// The bootloader update protocol, treated as opaque.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BootloaderUpdater: Send + Sync {
    /// Install the archive at `image_path` on the bootloader at `address`.
    async fn update(&self, address: &str, image_path: &Path) -> bool;
}
