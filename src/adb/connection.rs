use crate::adb::crypto::AdbCrypto;
use crate::adb::file_transfer::SyncSession;
use crate::adb::protocol::{
    AdbCodec, AdbMessage, Command, AUTH_TYPE_RSA_PUBLIC, AUTH_TYPE_SIGNATURE, AUTH_TYPE_TOKEN,
    CONNECT_MAXDATA, MAX_PAYLOAD_LIMIT,
};
use crate::adb::session::Session;
use crate::adb::shell::ShellSession;
use crate::adb::stream::{AdbStream, StreamShared};
use crate::error::{AdbError, Result};
use futures::{SinkExt, StreamExt};
use log::*;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

type FrameReader = FramedRead<Box<dyn AsyncRead + Send + Unpin>, AdbCodec>;
type FrameWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, AdbCodec>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Transport attached, `connect()` not called yet
    New,
    /// CNXN sent, waiting for the device's CNXN (possibly via AUTH)
    Connecting,
    Connected { max_data: u32 },
    /// Shut down by `close()`
    Closed,
    /// Transport error, protocol violation or peer hang-up
    Failed(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected { .. })
    }
}

/// Requests from caller tasks to the dispatch task, which owns the stream map.
pub(crate) enum Request {
    Register {
        stream: Arc<StreamShared>,
        registered: oneshot::Sender<()>,
    },
    Forget {
        local_id: u32,
    },
}

/// State shared by the connection handle, its streams and the dispatch task.
pub(crate) struct ConnectionInner {
    writer: Mutex<FrameWriter>,
    state: watch::Sender<ConnectionState>,
    requests: mpsc::UnboundedSender<Request>,
    last_local_id: AtomicU32,
    shutdown: CancellationToken,
}

impl ConnectionInner {
    /// Write one frame; frames from different tasks never interleave.
    ///
    /// Gives up with `ConnectionClosed` once the connection is shut down, so
    /// a peer that stops reading cannot hold a sender forever.
    pub(crate) async fn send(&self, msg: AdbMessage) -> Result<()> {
        trace!("-> {}", msg);
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Err(AdbError::ConnectionClosed),
            sent = async { self.writer.lock().await.send(msg).await } => sent,
        }
    }

    pub(crate) fn request(&self, request: Request) {
        // A closed channel means the dispatch task is gone and the map with it
        let _ = self.requests.send(request);
    }

    pub(crate) fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Err unless the connection is currently established
    pub(crate) fn check_alive(&self) -> Result<()> {
        match &*self.state.borrow() {
            ConnectionState::Connected { .. } => Ok(()),
            ConnectionState::New | ConnectionState::Connecting => Err(AdbError::NotConnected),
            ConnectionState::Closed => Err(AdbError::ConnectionClosed),
            ConnectionState::Failed(reason) => Err(AdbError::ConnectionFailed(reason.clone())),
        }
    }

    fn next_local_id(&self) -> u32 {
        self.last_local_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Read half and request queue, parked until `connect()` hands them to the
/// dispatch task.
struct Pending {
    reader: FrameReader,
    requests: mpsc::UnboundedReceiver<Request>,
}

/// A client connection to one adbd, multiplexing any number of streams.
///
/// ```no_run
/// # async fn demo() -> adbmux::error::Result<()> {
/// use adbmux::adb::{AdbConnection, AdbCrypto};
/// use std::sync::Arc;
///
/// let crypto = Arc::new(AdbCrypto::generate()?);
/// let conn = AdbConnection::connect_tcp("192.168.1.20:5555", crypto, None).await?;
/// let output = adbmux::adb::run_command(&conn, "getprop ro.product.model").await?;
/// print!("{}", String::from_utf8_lossy(&output));
/// conn.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct AdbConnection {
    inner: Arc<ConnectionInner>,
    crypto: Arc<AdbCrypto>,
    pending: StdMutex<Option<Pending>>,
    dispatch: StdMutex<Option<JoinHandle<()>>>,
}

impl AdbConnection {
    /// Wrap any byte transport. Nothing is sent until [`connect`](Self::connect).
    pub fn new<S>(io: S, crypto: Arc<AdbCrypto>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(io);
        Self::from_halves(Box::new(reader), Box::new(writer), crypto)
    }

    pub fn from_tcp(socket: TcpStream, crypto: Arc<AdbCrypto>) -> Self {
        let (reader, writer) = socket.into_split();
        Self::from_halves(Box::new(reader), Box::new(writer), crypto)
    }

    fn from_halves(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: Box<dyn AsyncWrite + Send + Unpin>,
        crypto: Arc<AdbCrypto>,
    ) -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::New);

        let inner = Arc::new(ConnectionInner {
            writer: Mutex::new(FramedWrite::new(writer, AdbCodec::new())),
            state,
            requests: requests_tx,
            last_local_id: AtomicU32::new(0),
            shutdown: CancellationToken::new(),
        });

        Self {
            inner,
            crypto,
            pending: StdMutex::new(Some(Pending {
                reader: FramedRead::new(reader, AdbCodec::new()),
                requests: requests_rx,
            })),
            dispatch: StdMutex::new(None),
        }
    }

    /// Open a TCP connection to `addr` and run the handshake.
    pub async fn connect_tcp(
        addr: impl ToSocketAddrs,
        crypto: Arc<AdbCrypto>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let socket = match timeout {
            Some(limit) => tokio::time::timeout(limit, TcpStream::connect(addr))
                .await
                .map_err(|_| AdbError::Timeout(limit))??,
            None => TcpStream::connect(addr).await?,
        };
        socket.set_nodelay(true)?;
        debug!("TCP connected to {:?}", socket.peer_addr().ok());

        let conn = Self::from_tcp(socket, crypto);
        match timeout {
            Some(limit) => conn.connect_timeout(limit).await?,
            None => conn.connect().await?,
        }
        Ok(conn)
    }

    /// Send CNXN, start the dispatch task and wait until the device answers
    /// with its own CNXN. Authentication happens along the way.
    pub async fn connect(&self) -> Result<()> {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(AdbError::AlreadyConnected)?;

        self.inner.state.send_replace(ConnectionState::Connecting);
        info!("Connecting: sending CNXN");
        if let Err(e) = self.inner.send(AdbMessage::connect()).await {
            self.inner
                .state
                .send_replace(ConnectionState::Failed(e.to_string()));
            return Err(e);
        }

        let dispatcher = Dispatcher {
            inner: self.inner.clone(),
            crypto: self.crypto.clone(),
            streams: HashMap::new(),
            auth: AuthPhase::Idle,
            connected: false,
        };
        let handle = tokio::spawn(dispatcher.run(pending.reader, pending.requests));
        *self.dispatch.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        self.wait_connected().await.map(|_| ())
    }

    /// [`connect`](Self::connect) bounded by `limit`. On timeout the
    /// connection is shut down.
    pub async fn connect_timeout(&self, limit: Duration) -> Result<()> {
        match tokio::time::timeout(limit, self.connect()).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Handshake did not finish within {:?}", limit);
                self.close().await?;
                Err(AdbError::Timeout(limit))
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state.borrow().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.state.borrow().is_connected()
    }

    /// Payload limit the device announced, once connected
    pub async fn max_data(&self) -> Result<u32> {
        self.wait_connected().await
    }

    async fn wait_connected(&self) -> Result<u32> {
        let mut rx = self.inner.state.subscribe();
        let state = rx
            .wait_for(|state| *state != ConnectionState::Connecting)
            .await
            .map_err(|_| AdbError::ConnectionClosed)?
            .clone();

        match state {
            ConnectionState::Connected { max_data } => Ok(max_data),
            ConnectionState::New | ConnectionState::Connecting => Err(AdbError::NotConnected),
            ConnectionState::Closed => Err(AdbError::ConnectionClosed),
            ConnectionState::Failed(reason) => Err(AdbError::ConnectionFailed(reason)),
        }
    }

    /// Open a stream to a device service such as `shell:ls` or `sync:`.
    ///
    /// Waits for the handshake if it is still in progress. Fails with
    /// `OpenRejected` if the device answers with CLSE.
    pub async fn open(&self, destination: &str) -> Result<AdbStream> {
        let max_data = self.wait_connected().await?;
        let local_id = self.inner.next_local_id();
        let shared = Arc::new(StreamShared::new(local_id));

        // Registered before OPEN is written so the reply always finds it
        let (registered_tx, registered_rx) = oneshot::channel();
        self.inner.request(Request::Register {
            stream: shared.clone(),
            registered: registered_tx,
        });
        registered_rx
            .await
            .map_err(|_| AdbError::ConnectionClosed)?;

        debug!("Opening stream {} to {:?}", local_id, destination);
        self.inner
            .send(AdbMessage::open(local_id, destination))
            .await?;

        let stream = AdbStream::new(self.inner.clone(), shared, max_data);
        stream.wait_open(destination).await?;
        Ok(stream)
    }

    /// Open `destination` and wrap the stream in a session type
    pub async fn open_session<S: Session>(&self, destination: &str) -> Result<S> {
        let stream = self.open(destination).await?;
        Ok(S::from_stream(stream))
    }

    /// Interactive shell, or a one-shot command when `command` is given
    pub async fn open_shell(&self, command: Option<&str>) -> Result<ShellSession> {
        let destination = format!("shell:{}", command.unwrap_or(""));
        self.open_session(&destination).await
    }

    pub async fn open_sync(&self) -> Result<SyncSession> {
        self.open_session("sync:").await
    }

    /// Stop the dispatch task and close the transport. Open streams are
    /// closed locally; no CLSE is sent for them. Safe to call more than once.
    pub async fn close(&self) -> Result<()> {
        self.inner.shutdown.cancel();

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let handle = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Dispatch task ended abnormally: {}", e);
            }
        } else {
            self.inner.state.send_replace(ConnectionState::Closed);
        }

        // Unflushed bytes of an abandoned frame are discarded
        if let Err(e) = self.inner.writer.lock().await.get_mut().shutdown().await {
            debug!("Error shutting down transport: {}", e);
        }
        Ok(())
    }
}

impl Drop for AdbConnection {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

enum AuthPhase {
    Idle,
    SignatureSent,
    PublicKeySent,
}

/// Sole reader of the transport and sole owner of the stream map.
struct Dispatcher {
    inner: Arc<ConnectionInner>,
    crypto: Arc<AdbCrypto>,
    streams: HashMap<u32, Arc<StreamShared>>,
    auth: AuthPhase,
    connected: bool,
}

impl Dispatcher {
    async fn run(mut self, mut reader: FrameReader, mut requests: mpsc::UnboundedReceiver<Request>) {
        let shutdown = self.inner.shutdown.clone();

        let outcome = loop {
            tokio::select! {
                biased;
                Some(request) = requests.recv() => self.handle_request(request),
                frame = reader.next() => match frame {
                    Some(Ok(msg)) => {
                        if let Err(e) = self.handle_message(msg).await {
                            break Err(e);
                        }
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Err(AdbError::Connection(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "device closed the connection",
                    ))),
                },
                _ = shutdown.cancelled() => break Ok(()),
            }
        };

        let final_state = match outcome {
            Ok(()) => {
                info!("Connection closed");
                ConnectionState::Closed
            }
            Err(e) if shutdown.is_cancelled() => {
                info!("Connection closed ({})", e);
                ConnectionState::Closed
            }
            Err(e) => {
                error!("Connection failed: {}", e);
                ConnectionState::Failed(e.to_string())
            }
        };
        self.inner.state.send_replace(final_state);

        requests.close();
        while let Ok(request) = requests.try_recv() {
            self.handle_request(request);
        }
        for (_, stream) in self.streams.drain() {
            stream.on_close();
        }
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Register { stream, registered } => {
                if self.inner.check_alive().is_err() {
                    stream.on_close();
                }
                self.streams.insert(stream.local_id(), stream);
                let _ = registered.send(());
            }
            Request::Forget { local_id } => {
                self.streams.remove(&local_id);
            }
        }
    }

    async fn handle_message(&mut self, msg: AdbMessage) -> Result<()> {
        trace!("<- {}", msg);
        match msg.command {
            Command::Cnxn => self.handle_connect(msg),
            Command::Auth => self.handle_auth(msg).await,
            Command::Okay | Command::Wrte | Command::Clse if !self.connected => {
                debug!("Ignoring {} before CNXN", msg);
                Ok(())
            }
            Command::Okay => {
                match self.streams.get(&msg.arg1) {
                    Some(stream) => stream.on_ready(msg.arg0),
                    None => debug!("OKAY for unknown stream {}", msg.arg1),
                }
                Ok(())
            }
            Command::Wrte => self.handle_write(msg).await,
            Command::Clse => {
                match self.streams.remove(&msg.arg1) {
                    Some(stream) => {
                        debug!("Stream {} closed by device", msg.arg1);
                        stream.on_close();
                    }
                    None => debug!("CLSE for unknown stream {}", msg.arg1),
                }
                Ok(())
            }
            Command::Open | Command::Sync | Command::Unknown(_) => {
                debug!("Ignoring {}", msg);
                Ok(())
            }
        }
    }

    fn handle_connect(&mut self, msg: AdbMessage) -> Result<()> {
        let max_data = match msg.arg1 {
            0 => CONNECT_MAXDATA,
            announced => announced.min(MAX_PAYLOAD_LIMIT as u32),
        };
        let banner = String::from_utf8_lossy(&msg.data);
        info!(
            "Connected: version {:#010x}, max data {}, {}",
            msg.arg0,
            max_data,
            banner.trim_end_matches('\0')
        );

        self.connected = true;
        self.auth = AuthPhase::Idle;
        self.inner
            .state
            .send_replace(ConnectionState::Connected { max_data });
        Ok(())
    }

    async fn handle_auth(&mut self, msg: AdbMessage) -> Result<()> {
        if msg.arg0 != AUTH_TYPE_TOKEN {
            debug!("Ignoring AUTH type {}", msg.arg0);
            return Ok(());
        }

        let reply = match self.auth {
            AuthPhase::Idle => {
                debug!("Signing AUTH token");
                let signature = self.crypto.sign_token(&msg.data)?;
                self.auth = AuthPhase::SignatureSent;
                AdbMessage::auth(AUTH_TYPE_SIGNATURE, signature)
            }
            AuthPhase::SignatureSent => {
                info!(
                    "Device rejected signature; offering public key {} (confirm on device)",
                    self.crypto.fingerprint()
                );
                self.auth = AuthPhase::PublicKeySent;
                AdbMessage::auth(AUTH_TYPE_RSA_PUBLIC, self.crypto.public_key_payload())
            }
            AuthPhase::PublicKeySent => {
                return Err(AdbError::Auth("device rejected our public key".into()));
            }
        };
        self.inner.send(reply).await
    }

    async fn handle_write(&mut self, msg: AdbMessage) -> Result<()> {
        let Some(stream) = self.streams.get(&msg.arg1) else {
            debug!("WRTE for unknown stream {}", msg.arg1);
            return Ok(());
        };

        if !stream.on_data(msg.data) {
            debug!("Dropping WRTE for closed stream {}", msg.arg1);
            return Ok(());
        }
        let ready = AdbMessage::ready(stream.local_id(), stream.remote_id());
        self.inner.send(ready).await
    }
}
