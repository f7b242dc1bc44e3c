//! Request/response correlation over a notification link.
//!
//! Each command arms a single-slot inbox, writes the frame and waits for the
//! next notification. The inbox is released on every exit path, including when
//! the caller drops the future mid-wait.

use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc;

use super::link::Link;
use crate::error::{UpdateError, UpdateResult};
use crate::protocol::config::COMMAND_TIMEOUT;
use crate::protocol::packet::encode_text;

/// Result of one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A reply arrived and satisfied the predicate (if any).
    Success(Vec<u8>),
    /// A reply arrived but did not satisfy the predicate.
    Rejected(Vec<u8>),
    Timeout,
    TransportError(String),
    DeviceNotConnected,
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    /// Convert to a result, naming `operation` in the error.
    pub fn into_result(self, operation: &str) -> UpdateResult<Vec<u8>> {
        match self {
            CommandOutcome::Success(reply) => Ok(reply),
            CommandOutcome::Rejected(reply) => Err(UpdateError::Transport {
                reason: format!("{} rejected: {}", operation, reply_text(&reply)),
            }),
            CommandOutcome::Timeout => Err(UpdateError::Timeout {
                operation: operation.to_string(),
            }),
            CommandOutcome::TransportError(reason) => Err(UpdateError::Transport { reason }),
            CommandOutcome::DeviceNotConnected => Err(UpdateError::NotConnected),
        }
    }
}

/// Render a reply for logs and error messages.
pub fn reply_text(reply: &[u8]) -> String {
    String::from_utf8_lossy(reply).trim().to_string()
}

/// Unsubscribes from the link when dropped.
struct ListenerGuard<'a, L: Link> {
    link: &'a L,
}

impl<L: Link> Drop for ListenerGuard<'_, L> {
    fn drop(&mut self) {
        self.link.unsubscribe();
    }
}

/// Sends commands over a [`Link`] one at a time.
///
/// Sending takes `&mut self`, so at most one command is outstanding per
/// transport.
pub struct CommandTransport<L: Link> {
    link: L,
    timeout: Duration,
}

impl<L: Link> CommandTransport<L> {
    pub fn new(link: L) -> Self {
        Self::with_timeout(link, COMMAND_TIMEOUT)
    }

    pub fn with_timeout(link: L, timeout: Duration) -> Self {
        Self { link, timeout }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send a frame and accept any reply.
    pub async fn send(&mut self, frame: &[u8]) -> CommandOutcome {
        self.send_with(frame, |_| true).await
    }

    /// Send a frame and classify the reply with `accept`.
    pub async fn send_with<P>(&mut self, frame: &[u8], accept: P) -> CommandOutcome
    where
        P: Fn(&[u8]) -> bool + Send,
    {
        if !self.link.is_connected() {
            return CommandOutcome::DeviceNotConnected;
        }

        let (inbox, mut replies) = mpsc::channel(1);
        self.link.subscribe(inbox);
        let _guard = ListenerGuard { link: &self.link };

        debug!("TX {}", hex::encode(frame));
        if let Err(e) = self.link.write(frame).await {
            warn!("Write failed: {}", e);
            return CommandOutcome::TransportError(e.to_string());
        }

        match tokio::time::timeout(self.timeout, replies.recv()).await {
            Err(_) => {
                warn!("No reply within {:?}", self.timeout);
                CommandOutcome::Timeout
            }
            Ok(None) => CommandOutcome::TransportError("notification channel closed".into()),
            Ok(Some(reply)) => {
                debug!("RX {}", hex::encode(&reply));
                if accept(&reply) {
                    CommandOutcome::Success(reply)
                } else {
                    CommandOutcome::Rejected(reply)
                }
            }
        }
    }

    /// Send a text command and accept any reply.
    pub async fn send_text(&mut self, command: &str) -> CommandOutcome {
        self.send(&encode_text(command)).await
    }

    /// Send a text command and require the reply text to contain `expected`.
    pub async fn send_text_expect(&mut self, command: &str, expected: &str) -> CommandOutcome {
        self.send_with(&encode_text(command), |reply| {
            String::from_utf8_lossy(reply).contains(expected)
        })
        .await
    }
}
