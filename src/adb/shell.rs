use crate::adb::connection::AdbConnection;
use crate::adb::session::Session;
use crate::adb::stream::AdbStream;
use crate::error::{AdbError, Result};
use bytes::Bytes;
use log::*;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A `shell:` stream whose output is drained in the background.
///
/// Output arrives as chunks on [`ShellSession::recv`]; input goes through
/// [`ShellSession::execute`] or [`ShellSession::write`].
pub struct ShellSession {
    stream: AdbStream,
    output: Mutex<mpsc::UnboundedReceiver<Bytes>>,
    drain: JoinHandle<()>,
}

impl Session for ShellSession {
    fn from_stream(stream: AdbStream) -> Self {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let drain = tokio::spawn(drain_output(
            stream.clone(),
            output_tx,
            stream.shutdown_token(),
        ));

        Self {
            stream,
            output: Mutex::new(output_rx),
            drain,
        }
    }

    fn stream(&self) -> &AdbStream {
        &self.stream
    }
}

impl ShellSession {
    /// Send one command line to an interactive shell
    pub async fn execute(&self, line: &str) -> Result<()> {
        debug!("shell {}: {}", self.stream.local_id(), line);
        let mut input = Vec::with_capacity(line.len() + 1);
        input.extend_from_slice(line.as_bytes());
        input.push(b'\n');
        self.stream.write(&input).await
    }

    /// Raw input, e.g. control characters
    pub async fn write(&self, data: &[u8]) -> Result<()> {
        self.stream.write(data).await
    }

    /// Next chunk of output, or `None` once the shell has exited and all
    /// output has been delivered.
    pub async fn recv(&self) -> Option<Bytes> {
        self.output.lock().await.recv().await
    }

    /// All remaining output until the shell exits
    pub async fn collect_output(&self) -> Vec<u8> {
        let mut output = self.output.lock().await;
        let mut collected = Vec::new();
        while let Some(chunk) = output.recv().await {
            collected.extend_from_slice(&chunk);
        }
        collected
    }
}

impl Drop for ShellSession {
    fn drop(&mut self) {
        self.drain.abort();
    }
}

async fn drain_output(
    stream: AdbStream,
    output: mpsc::UnboundedSender<Bytes>,
    shutdown: CancellationToken,
) {
    let mut buf = vec![0u8; stream.max_data()];
    loop {
        // Buffered output is delivered before a shutdown is noticed
        let n = tokio::select! {
            biased;
            read = stream.read(&mut buf) => match read {
                Ok(n) => n,
                Err(AdbError::StreamClosed) => break,
                Err(e) => {
                    warn!("shell {}: read failed: {}", stream.local_id(), e);
                    break;
                }
            },
            _ = shutdown.cancelled() => break,
        };

        debug!("shell {}: {} bytes of output", stream.local_id(), n);
        if output.send(Bytes::copy_from_slice(&buf[..n])).is_err() {
            break;
        }
    }
    debug!("shell {}: output drained", stream.local_id());
}

/// Run `command` through `shell:` and return everything it printed.
pub async fn run_command(conn: &AdbConnection, command: &str) -> Result<Vec<u8>> {
    let shell = conn.open_shell(Some(command)).await?;
    let output = shell.collect_output().await;
    shell.close().await?;
    Ok(output)
}
