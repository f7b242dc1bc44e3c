//! Chunked transfer of a byte buffer over the command transport.

use std::ops::Range;

use log::{debug, warn};

use super::command::{reply_text, CommandOutcome, CommandTransport};
use super::link::Link;
use crate::cancel::CancelHandle;
use crate::error::{UpdateError, UpdateResult};
use crate::protocol::config::CHUNK_SIZE;

/// Splits a buffer into chunks and sends each one, stopping at the first failure.
///
/// There is no resume. A failed transfer is restarted from offset 0 by a new
/// update attempt.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedTransfer {
    chunk_size: usize,
}

impl ChunkedTransfer {
    /// Create an engine with the given chunk size (1..=240).
    pub fn new(chunk_size: usize) -> UpdateResult<Self> {
        if chunk_size == 0 || chunk_size > CHUNK_SIZE {
            return Err(UpdateError::validation(format!(
                "chunk size {} must be between 1 and {}",
                chunk_size, CHUNK_SIZE
            )));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Byte ranges of each chunk for a buffer of `len` bytes.
    pub fn chunk_ranges(&self, len: usize) -> impl Iterator<Item = Range<usize>> {
        let size = self.chunk_size;
        (0..len)
            .step_by(size)
            .map(move |start| start..(start + size).min(len))
    }

    /// Send `data` chunk by chunk.
    ///
    /// `make_frame` receives each chunk's offset and bytes and returns the frame
    /// to send. Any non-empty reply acknowledges a chunk. `on_chunk` is called
    /// with `(bytes_sent, total)` after each acknowledged chunk.
    pub async fn run<L, F, P>(
        &self,
        transport: &mut CommandTransport<L>,
        data: &[u8],
        mut make_frame: F,
        mut on_chunk: P,
        cancel: &CancelHandle,
    ) -> UpdateResult<()>
    where
        L: Link,
        F: FnMut(usize, &[u8]) -> Vec<u8>,
        P: FnMut(usize, usize),
    {
        let total = data.len();

        for range in self.chunk_ranges(total) {
            if cancel.is_cancelled() {
                debug!("Transfer cancelled at offset {}", range.start);
                return Err(UpdateError::Cancelled);
            }

            let offset = range.start;
            let end = range.end;
            let frame = make_frame(offset, &data[range]);

            match transport.send_with(&frame, |reply| !reply.is_empty()).await {
                CommandOutcome::Success(_) => on_chunk(end, total),
                CommandOutcome::DeviceNotConnected => return Err(UpdateError::NotConnected),
                failure => {
                    let reason = match failure {
                        CommandOutcome::Timeout => "no acknowledgement".to_string(),
                        CommandOutcome::TransportError(reason) => reason,
                        CommandOutcome::Rejected(reply) => {
                            format!("rejected: {}", reply_text(&reply))
                        }
                        _ => "unexpected outcome".to_string(),
                    };
                    warn!("Chunk at offset {} failed: {}", offset, reason);
                    return Err(UpdateError::Transfer { offset, reason });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeLink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_new_rejects_bad_chunk_size() {
        assert!(matches!(
            ChunkedTransfer::new(0),
            Err(UpdateError::Validation { .. })
        ));
        assert!(ChunkedTransfer::new(241).is_err());
        assert_eq!(ChunkedTransfer::new(240).unwrap().chunk_size(), 240);
    }

    #[test]
    fn test_chunk_ranges() {
        let engine = ChunkedTransfer::new(240).unwrap();

        let ranges: Vec<_> = engine.chunk_ranges(500).collect();
        assert_eq!(ranges, vec![0..240, 240..480, 480..500]);

        assert_eq!(engine.chunk_ranges(480).count(), 2);
        assert_eq!(engine.chunk_ranges(0).count(), 0);
    }

    #[tokio::test]
    async fn test_transfer_sends_all_chunks() {
        let link = FakeLink::connected().with_responder(|_| Some(vec![0x00]));
        let mut transport = CommandTransport::new(link);
        let engine = ChunkedTransfer::new(240).unwrap();
        let data: Vec<u8> = (0..500u32).map(|i| i as u8).collect();
        let mut progress = Vec::new();

        engine
            .run(
                &mut transport,
                &data,
                |offset, chunk| {
                    let mut frame = (offset as u32).to_le_bytes().to_vec();
                    frame.extend_from_slice(chunk);
                    frame
                },
                |sent, total| progress.push((sent, total)),
                &CancelHandle::new(),
            )
            .await
            .unwrap();

        let writes = transport.link().writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(writes[0].len(), 4 + 240);
        assert_eq!(&writes[1][..4], &240u32.to_le_bytes());
        assert_eq!(writes[2].len(), 4 + 20);
        assert_eq!(progress, vec![(240, 500), (480, 500), (500, 500)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfer_aborts_on_first_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let link = FakeLink::connected().with_responder(move |_| {
            // Second chunk is never acknowledged
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                None
            } else {
                Some(vec![0x00])
            }
        });
        let mut transport = CommandTransport::new(link);
        let engine = ChunkedTransfer::new(240).unwrap();

        let result = engine
            .run(
                &mut transport,
                &[0u8; 500],
                |_, chunk| chunk.to_vec(),
                |_, _| {},
                &CancelHandle::new(),
            )
            .await;

        assert!(matches!(result, Err(UpdateError::Transfer { offset: 240, .. })));
        assert_eq!(transport.link().writes().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_reply_fails_chunk() {
        let link = FakeLink::connected().with_responder(|_| Some(Vec::new()));
        let mut transport = CommandTransport::new(link);
        let engine = ChunkedTransfer::new(16).unwrap();

        let result = engine
            .run(
                &mut transport,
                &[1u8; 32],
                |_, chunk| chunk.to_vec(),
                |_, _| {},
                &CancelHandle::new(),
            )
            .await;

        assert!(matches!(result, Err(UpdateError::Transfer { offset: 0, .. })));
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_chunk() {
        let cancel = CancelHandle::new();
        let trigger = cancel.clone();
        let link = FakeLink::connected().with_responder(move |_| {
            trigger.cancel();
            Some(vec![0x00])
        });
        let mut transport = CommandTransport::new(link);
        let engine = ChunkedTransfer::new(100).unwrap();

        let result = engine
            .run(
                &mut transport,
                &[0u8; 300],
                |_, chunk| chunk.to_vec(),
                |_, _| {},
                &cancel,
            )
            .await;

        assert!(matches!(result, Err(UpdateError::Cancelled)));
        assert_eq!(transport.link().writes().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnected_link() {
        let mut transport = CommandTransport::new(FakeLink::new());
        let engine = ChunkedTransfer::new(240).unwrap();

        let result = engine
            .run(
                &mut transport,
                &[0u8; 10],
                |_, chunk| chunk.to_vec(),
                |_, _| {},
                &CancelHandle::new(),
            )
            .await;

        assert!(matches!(result, Err(UpdateError::NotConnected)));
    }
}
