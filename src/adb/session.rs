use crate::adb::stream::AdbStream;
use crate::error::Result;
use async_trait::async_trait;

/// A service-specific wrapper around an open stream.
///
/// [`AdbConnection::open_session`](crate::adb::AdbConnection::open_session)
/// opens the destination and hands the stream to `from_stream`.
#[async_trait]
pub trait Session: Sized + Send + Sync {
    fn from_stream(stream: AdbStream) -> Self;

    fn stream(&self) -> &AdbStream;

    fn is_closed(&self) -> bool {
        self.stream().is_closed()
    }

    async fn close(&self) -> Result<()> {
        self.stream().close().await
    }
}

/// Session with no protocol of its own: raw reads and writes on the stream.
pub struct RawSession {
    stream: AdbStream,
}

impl Session for RawSession {
    fn from_stream(stream: AdbStream) -> Self {
        Self { stream }
    }

    fn stream(&self) -> &AdbStream {
        &self.stream
    }
}
