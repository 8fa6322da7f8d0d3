use crate::adb::connection::{ConnectionInner, Request};
use crate::adb::protocol::AdbMessage;
use crate::error::{AdbError, Result};
use crate::library::PipeStream;
use bytes::Bytes;
use log::*;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// OPEN sent, waiting for the peer's OKAY or CLSE
    Opening,
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamState {
    phase: StreamPhase,
    remote_id: u32,
    /// One-slot write window, granted by each OKAY
    credit: bool,
}

/// Per-stream state written by the dispatch task and observed by callers.
pub(crate) struct StreamShared {
    local_id: u32,
    state: watch::Sender<StreamState>,
    pipe: PipeStream,
    write_lock: Mutex<()>,
}

impl StreamShared {
    pub(crate) fn new(local_id: u32) -> Self {
        let (state, _) = watch::channel(StreamState {
            phase: StreamPhase::Opening,
            remote_id: 0,
            credit: false,
        });
        Self {
            local_id,
            state,
            pipe: PipeStream::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub(crate) fn local_id(&self) -> u32 {
        self.local_id
    }

    pub(crate) fn remote_id(&self) -> u32 {
        self.state.borrow().remote_id
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.borrow().phase == StreamPhase::Closed
    }

    /// OKAY: record the peer's id and grant one write
    pub(crate) fn on_ready(&self, remote_id: u32) {
        self.state.send_if_modified(|state| {
            if state.phase == StreamPhase::Closed {
                return false;
            }
            state.remote_id = remote_id;
            state.credit = true;
            state.phase = StreamPhase::Open;
            true
        });
    }

    /// WRTE: hand the payload to readers. Returns `false` if the stream is
    /// already closed and the payload was dropped.
    pub(crate) fn on_data(&self, data: Bytes) -> bool {
        if self.is_closed() {
            return false;
        }
        self.pipe.write(data)
    }

    /// CLSE from the peer, or teardown of the connection
    pub(crate) fn on_close(&self) {
        self.state.send_if_modified(|state| {
            if state.phase == StreamPhase::Closed {
                return false;
            }
            state.phase = StreamPhase::Closed;
            state.credit = false;
            true
        });
        self.pipe.close();
    }
}

/// One multiplexed channel on an [`AdbConnection`](crate::adb::AdbConnection).
///
/// Handles are cheap to clone and all refer to the same stream. Dropping a
/// handle does not close the stream; call [`AdbStream::close`].
#[derive(Clone)]
pub struct AdbStream {
    conn: Arc<ConnectionInner>,
    shared: Arc<StreamShared>,
    max_data: usize,
}

impl AdbStream {
    pub(crate) fn new(conn: Arc<ConnectionInner>, shared: Arc<StreamShared>, max_data: u32) -> Self {
        Self {
            conn,
            shared,
            max_data: (max_data as usize).max(1),
        }
    }

    pub fn local_id(&self) -> u32 {
        self.shared.local_id()
    }

    pub fn remote_id(&self) -> u32 {
        self.shared.remote_id()
    }

    pub fn phase(&self) -> StreamPhase {
        self.shared.state.borrow().phase
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Largest payload a single WRTE may carry on this connection
    pub fn max_data(&self) -> usize {
        self.max_data
    }

    /// Cancelled when the owning connection shuts down
    pub fn shutdown_token(&self) -> CancellationToken {
        self.conn.shutdown_token()
    }

    /// Wait for the peer to accept (OKAY) or reject (CLSE) our OPEN
    pub(crate) async fn wait_open(&self, destination: &str) -> Result<()> {
        let mut rx = self.shared.state.subscribe();
        let phase = rx
            .wait_for(|state| state.phase != StreamPhase::Opening)
            .await
            .map_err(|_| AdbError::StreamClosed)?
            .phase;

        match phase {
            StreamPhase::Open => {
                debug!(
                    "Stream {} open to {:?} (remote id {})",
                    self.local_id(),
                    destination,
                    self.remote_id()
                );
                Ok(())
            }
            _ => {
                // Torn down with the connection rather than refused by the peer
                self.conn.check_alive()?;
                Err(AdbError::OpenRejected(destination.to_string()))
            }
        }
    }

    /// Send `data`, one WRTE per credit.
    ///
    /// Payloads longer than the negotiated maximum are split; each piece
    /// waits for the OKAY that acknowledges the previous one. Concurrent
    /// writers on the same stream are serialised. An empty `data` sends no
    /// frame and leaves the credit unused.
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        let _writer = self.shared.write_lock.lock().await;
        for chunk in data.chunks(self.max_data) {
            self.write_chunk(Bytes::copy_from_slice(chunk)).await?;
        }
        Ok(())
    }

    async fn write_chunk(&self, chunk: Bytes) -> Result<()> {
        let mut rx = self.shared.state.subscribe();
        rx.wait_for(|state| state.credit || state.phase == StreamPhase::Closed)
            .await
            .map_err(|_| AdbError::StreamClosed)?;

        let mut remote_id = None;
        self.shared.state.send_if_modified(|state| {
            if state.phase == StreamPhase::Closed || !state.credit {
                return false;
            }
            state.credit = false;
            remote_id = Some(state.remote_id);
            true
        });
        let remote_id = remote_id.ok_or(AdbError::StreamClosed)?;

        self.conn
            .send(AdbMessage::write(self.local_id(), remote_id, chunk))
            .await
    }

    /// Read at least one byte. Data that arrived before the stream closed is
    /// still returned; after that, `StreamClosed`.
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.shared.pipe.read(buf).await {
            0 => Err(AdbError::StreamClosed),
            n => Ok(n),
        }
    }

    /// Read exactly `buf.len()` bytes
    pub async fn fill(&self, buf: &mut [u8]) -> Result<()> {
        self.shared.pipe.fill(buf).await
    }

    /// Collect everything until the stream closes
    pub async fn read_to_end(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; self.max_data];
        loop {
            match self.read(&mut buf).await {
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(AdbError::StreamClosed) => return Ok(out),
                Err(e) => return Err(e),
            }
        }
    }

    /// Close the stream and tell the peer. Does nothing if either side has
    /// already closed it.
    pub async fn close(&self) -> Result<()> {
        let mut remote_id = None;
        self.shared.state.send_if_modified(|state| {
            if state.phase == StreamPhase::Closed {
                return false;
            }
            state.phase = StreamPhase::Closed;
            state.credit = false;
            remote_id = Some(state.remote_id);
            true
        });
        let Some(remote_id) = remote_id else {
            return Ok(());
        };

        self.shared.pipe.close();
        self.conn.request(Request::Forget {
            local_id: self.local_id(),
        });

        if self.conn.check_alive().is_err() {
            return Ok(());
        }
        debug!("Closing stream {} (remote id {})", self.local_id(), remote_id);
        self.conn
            .send(AdbMessage::close(self.local_id(), remote_id))
            .await
    }
}
