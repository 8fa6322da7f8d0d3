use crate::adb::protocol::{AdbCodec, AdbMessage, Command, CONNECT_VERSION};
use crate::adb::{AdbConnection, AdbCrypto};
use crate::testing::fixtures::test_crypto;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio_util::codec::Framed;

pub const DEVICE_MAX_DATA: u32 = 4096;
pub const DEVICE_BANNER: &[u8] = b"device::ro.product.name=mock;ro.product.model=Mock;\0";

const RECV_TIMEOUT: Duration = Duration::from_secs(5);
const TRANSPORT_BUFFER: usize = 256 * 1024;

/// Scripted device end of an in-memory transport.
///
/// Tests drive it step by step: every `recv`/`expect` asserts on the next
/// frame the client wrote, every `send` injects a frame.
pub struct MockDevice {
    framed: Framed<DuplexStream, AdbCodec>,
}

impl MockDevice {
    /// A client connection wired to a mock device; `connect()` not yet called
    pub fn pair() -> (AdbConnection, MockDevice) {
        Self::pair_with_crypto(test_crypto())
    }

    pub fn pair_with_crypto(crypto: Arc<AdbCrypto>) -> (AdbConnection, MockDevice) {
        Self::pair_with(crypto, TRANSPORT_BUFFER)
    }

    /// `buffer` bounds the bytes in flight each way; a small one lets tests
    /// stall the client by not reading.
    pub fn pair_with(crypto: Arc<AdbCrypto>, buffer: usize) -> (AdbConnection, MockDevice) {
        let (client, device) = tokio::io::duplex(buffer);
        let conn = AdbConnection::new(client, crypto);
        let device = MockDevice {
            framed: Framed::new(device, AdbCodec::new()),
        };
        (conn, device)
    }

    /// A pair that has completed the handshake
    pub async fn connected(max_data: u32) -> (AdbConnection, MockDevice) {
        Self::connected_with_buffer(max_data, TRANSPORT_BUFFER).await
    }

    pub async fn connected_with_buffer(max_data: u32, buffer: usize) -> (AdbConnection, MockDevice) {
        let (conn, mut device) = Self::pair_with(test_crypto(), buffer);
        let (result, _) = tokio::join!(conn.connect(), device.accept_connection(max_data));
        result.expect("handshake with mock device");
        (conn, device)
    }

    pub async fn recv(&mut self) -> AdbMessage {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await {
            Ok(Some(Ok(msg))) => msg,
            Ok(Some(Err(e))) => panic!("client sent a bad frame: {}", e),
            Ok(None) => panic!("client closed the transport"),
            Err(_) => panic!("no frame from client within {:?}", RECV_TIMEOUT),
        }
    }

    /// Next frame, asserting its command
    pub async fn expect(&mut self, command: Command) -> AdbMessage {
        let msg = self.recv().await;
        assert_eq!(msg.command, command, "unexpected frame {}", msg);
        msg
    }

    /// Assert the client stays silent for `wait`
    pub async fn expect_silence(&mut self, wait: Duration) {
        if let Ok(frame) = tokio::time::timeout(wait, self.framed.next()).await {
            panic!("expected no frame, got {:?}", frame);
        }
    }

    /// `None` once the client has shut the transport down
    pub async fn recv_or_eof(&mut self) -> Option<AdbMessage> {
        match tokio::time::timeout(RECV_TIMEOUT, self.framed.next()).await {
            Ok(Some(Ok(msg))) => Some(msg),
            Ok(Some(Err(e))) => panic!("client sent a bad frame: {}", e),
            Ok(None) => None,
            Err(_) => panic!("client neither wrote nor closed within {:?}", RECV_TIMEOUT),
        }
    }

    pub async fn send(&mut self, msg: AdbMessage) {
        self.framed.send(msg).await.expect("write to client");
    }

    /// Bytes straight onto the wire, bypassing the codec
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let io = self.framed.get_mut();
        io.write_all(bytes).await.expect("write to client");
        io.flush().await.expect("flush to client");
    }

    pub async fn send_connect(&mut self, max_data: u32) {
        self.send(AdbMessage::new(
            Command::Cnxn,
            CONNECT_VERSION,
            max_data,
            Bytes::from_static(DEVICE_BANNER),
        ))
        .await;
    }

    /// Answer the client's CNXN with ours
    pub async fn accept_connection(&mut self, max_data: u32) {
        self.expect(Command::Cnxn).await;
        self.send_connect(max_data).await;
    }

    /// Accept the next OPEN as `remote_id`.
    /// Returns the client's local id and the destination.
    pub async fn accept_open(&mut self, remote_id: u32) -> (u32, String) {
        let (local_id, destination) = self.expect_open().await;
        self.send(AdbMessage::ready(remote_id, local_id)).await;
        (local_id, destination)
    }

    pub async fn expect_open(&mut self) -> (u32, String) {
        let open = self.expect(Command::Open).await;
        assert_eq!(open.data.last(), Some(&0), "OPEN destination is NUL terminated");
        let destination = String::from_utf8_lossy(&open.data[..open.data.len() - 1]).into_owned();
        (open.arg0, destination)
    }

    /// Send data on a stream and check the client acknowledges it
    pub async fn write_to(&mut self, remote_id: u32, local_id: u32, data: &[u8]) {
        self.send(AdbMessage::write(remote_id, local_id, data.to_vec()))
            .await;
        let ready = self.expect(Command::Okay).await;
        assert_eq!((ready.arg0, ready.arg1), (local_id, remote_id));
    }

    /// Receive one WRTE from the client and grant the next credit.
    /// Returns its payload.
    pub async fn read_from(&mut self, remote_id: u32, local_id: u32) -> Bytes {
        let write = self.expect(Command::Wrte).await;
        assert_eq!((write.arg0, write.arg1), (local_id, remote_id));
        self.send(AdbMessage::ready(remote_id, local_id)).await;
        write.data
    }

    /// Collect client writes until `len` bytes have arrived, acknowledging each
    pub async fn read_exact_from(&mut self, remote_id: u32, local_id: u32, len: usize) -> Vec<u8> {
        let mut collected = Vec::with_capacity(len);
        while collected.len() < len {
            collected.extend_from_slice(&self.read_from(remote_id, local_id).await);
        }
        assert_eq!(collected.len(), len, "client wrote past the expected length");
        collected
    }

    pub async fn close_stream(&mut self, remote_id: u32, local_id: u32) {
        self.send(AdbMessage::close(remote_id, local_id)).await;
    }
}
