pub mod connection;
pub mod crypto;
pub mod file_transfer;
pub mod protocol;
pub mod session;
pub mod shell;
pub mod stream;

pub use connection::{AdbConnection, ConnectionState};
pub use crypto::AdbCrypto;
pub use file_transfer::{DirEntry, SyncSession, SyncStat};
pub use protocol::{AdbCodec, AdbMessage, AdbProtocol, Command};
pub use session::{RawSession, Session};
pub use shell::{run_command, ShellSession};
pub use stream::{AdbStream, StreamPhase};

// Re-export commonly used types
pub use crate::error::Result;


#[cfg(test)]
mod crypto_test;
