use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdbError {
    // Transport
    #[error("ADB connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("connect() must be called first")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    // Framing
    #[error("magic mismatch: command {command:#010x}, magic {magic:#010x}")]
    MagicMismatch { command: u32, magic: u32 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("short read: stream ended inside a frame ({0} bytes buffered)")]
    ShortRead(usize),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("ADB protocol error: {0}")]
    Protocol(String),

    // Streams
    #[error("Stream open rejected by remote peer: {0}")]
    OpenRejected(String),

    #[error("Stream closed")]
    StreamClosed,

    // Keys and auth
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    // Outer layers
    #[error("File transfer error: {0}")]
    FileTransfer(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AdbError {
    /// Whether the error leaves the whole connection unusable, as opposed to
    /// one stream or one call.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AdbError::Connection(_)
                | AdbError::ConnectionFailed(_)
                | AdbError::MagicMismatch { .. }
                | AdbError::ChecksumMismatch { .. }
                | AdbError::ShortRead(_)
                | AdbError::PayloadTooLarge { .. }
                | AdbError::Protocol(_)
                | AdbError::Auth(_)
        )
    }
}

impl From<rsa::Error> for AdbError {
    fn from(err: rsa::Error) -> Self {
        AdbError::Crypto(err.to_string())
    }
}

impl From<String> for AdbError {
    fn from(msg: String) -> Self {
        AdbError::Protocol(msg)
    }
}

pub type Result<T> = std::result::Result<T, AdbError>;
