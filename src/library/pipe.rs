use super::block_queue::BlockQueue;
use crate::error::{AdbError, Result};
use bytes::{Buf, Bytes};
use tokio::sync::Mutex;

/// Byte stream assembled from variably-sized chunks.
///
/// The writer pushes whole payloads; readers pull any number of bytes. A
/// chunk that is only partly consumed stays as the read cursor for the next
/// call, so no byte is lost or reordered across read boundaries.
pub struct PipeStream {
    queue: BlockQueue<Bytes>,
    current: Mutex<Bytes>,
}

impl PipeStream {
    pub fn new() -> Self {
        Self {
            queue: BlockQueue::new(),
            current: Mutex::new(Bytes::new()),
        }
    }

    /// Queue a chunk for readers. Empty chunks are skipped. Returns `false`
    /// if the pipe is already closed.
    pub fn write(&self, chunk: impl Into<Bytes>) -> bool {
        let chunk = chunk.into();
        if chunk.is_empty() {
            return !self.queue.is_closed();
        }
        self.queue.enqueue(chunk)
    }

    /// Read at least one byte, waiting if nothing is buffered, then take
    /// whatever else is already queued up to `buf.len()`.
    ///
    /// Returns 0 only when the pipe is closed and drained (or `buf` is empty).
    pub async fn read(&self, buf: &mut [u8]) -> usize {
        let mut current = self.current.lock().await;
        let mut copied = 0;

        while copied < buf.len() {
            if current.is_empty() {
                let next = if copied == 0 {
                    self.queue.dequeue(None).await
                } else {
                    self.queue.try_dequeue()
                };
                match next {
                    Some(chunk) => *current = chunk,
                    None => break,
                }
                continue;
            }
            copied += Self::copy_from(&mut current, &mut buf[copied..]);
        }

        copied
    }

    /// Fill `buf` completely, waiting across as many chunks as needed.
    ///
    /// Fails with `StreamClosed` if the pipe closes before enough bytes
    /// arrive.
    pub async fn fill(&self, buf: &mut [u8]) -> Result<()> {
        let mut current = self.current.lock().await;
        let mut copied = 0;

        while copied < buf.len() {
            if current.is_empty() {
                *current = self
                    .queue
                    .dequeue(None)
                    .await
                    .ok_or(AdbError::StreamClosed)?;
                continue;
            }
            copied += Self::copy_from(&mut current, &mut buf[copied..]);
        }

        Ok(())
    }

    fn copy_from(chunk: &mut Bytes, dst: &mut [u8]) -> usize {
        let n = dst.len().min(chunk.len());
        dst[..n].copy_from_slice(&chunk[..n]);
        chunk.advance(n);
        n
    }

    /// Number of whole chunks waiting behind the read cursor.
    pub fn pending_chunks(&self) -> usize {
        self.queue.len()
    }

    /// Wake all readers. Data already written can still be read.
    pub fn close(&self) {
        self.queue.close();
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

impl Default for PipeStream {
    fn default() -> Self {
        Self::new()
    }
}
