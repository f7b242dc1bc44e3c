//! Link abstraction over the radio connection to one device.
//!
//! The link delivers writes to the device and forwards each notification it
//! receives to the currently subscribed inbox. Implementations live in the
//! host; tests use `test_helpers::FakeLink`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::warn;
use tokio::sync::mpsc;

use crate::device::Device;
use crate::error::{UpdateError, UpdateResult};

/// Receiver side of one command's reply.
///
/// Created with capacity 1. Links forward notifications with `try_send`, so a
/// second notification before the first is consumed is dropped.
pub type Inbox = mpsc::Sender<Vec<u8>>;

/// Trait for the connection to a device.
///
/// This abstraction allows for fake links in tests and lets a host plug in
/// whichever radio stack it uses.
#[async_trait]
pub trait Link: Send + Sync {
    /// Connect to `device`. Returns `false` if the link did not come up in time.
    async fn connect(&self, device: &Device, timeout: Duration) -> bool;

    /// Disconnect. Returns `false` if the link did not confirm in time.
    async fn disconnect(&self, timeout: Duration) -> bool;

    fn is_connected(&self) -> bool;

    /// Write one frame to the device's receive characteristic.
    async fn write(&self, frame: &[u8]) -> UpdateResult<()>;

    /// Route incoming notifications to `inbox`, replacing any previous one.
    fn subscribe(&self, inbox: Inbox);

    /// Stop routing notifications. Dropping the stored inbox closes the channel.
    fn unsubscribe(&self);
}

/// Connect to `device`, giving up after `timeout` even if the link never answers.
///
/// A refused connection is a `Transport` error; an unanswered one is a
/// `Timeout`.
pub async fn connect_within<L: Link + ?Sized>(
    link: &L,
    device: &Device,
    timeout: Duration,
) -> UpdateResult<()> {
    match tokio::time::timeout(timeout, link.connect(device, timeout)).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(UpdateError::transport(format!(
            "could not connect to {} within {:?}",
            device.address, timeout
        ))),
        Err(_) => {
            warn!("Connect to {} did not return within {:?}", device.address, timeout);
            Err(UpdateError::Timeout {
                operation: format!("connect to {}", device.address),
            })
        }
    }
}

/// Disconnect, giving up after `timeout`. Returns `false` unless the link
/// confirmed in time.
pub async fn disconnect_within<L: Link + ?Sized>(link: &L, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, link.disconnect(timeout)).await {
        Ok(confirmed) => confirmed,
        Err(_) => {
            warn!("Disconnect did not return within {:?}", timeout);
            false
        }
    }
}

#[async_trait]
impl<T: Link + ?Sized> Link for Arc<T> {
    async fn connect(&self, device: &Device, timeout: Duration) -> bool {
        (**self).connect(device, timeout).await
    }

    async fn disconnect(&self, timeout: Duration) -> bool {
        (**self).disconnect(timeout).await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    async fn write(&self, frame: &[u8]) -> UpdateResult<()> {
        (**self).write(frame).await
    }

    fn subscribe(&self, inbox: Inbox) {
        (**self).subscribe(inbox)
    }

    fn unsubscribe(&self) {
        (**self).unsubscribe()
    }
}
