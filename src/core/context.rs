use crate::adb::{AdbConnection, AdbCrypto};
use crate::config::{socket_address, Config};
use crate::error::Result;
use crate::progress::ProgressFactory;
use log::debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Shared context for all commands
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub config: Config,
    pub address: String,
    pub key_path: PathBuf,
    pub timeout: Duration,
    pub quiet: bool,
}

impl CommandContext {
    pub fn new(config: Config) -> Self {
        Self {
            address: config.address(),
            key_path: config.key_path(),
            timeout: config.connect_timeout(),
            quiet: false,
            config,
        }
    }

    /// Load the key (creating one on first use) and run the handshake
    pub async fn connect(&self) -> Result<AdbConnection> {
        let crypto = Arc::new(self.load_key()?);
        debug!("Connecting to {} with key {}", self.address, self.key_path.display());
        AdbConnection::connect_tcp(self.address.as_str(), crypto, Some(self.timeout)).await
    }

    pub fn load_key(&self) -> Result<AdbCrypto> {
        AdbCrypto::load_or_generate(&self.key_path)
    }

    /// Destination with config aliases applied
    pub fn destination(&self, name: &str) -> String {
        self.config.resolve_alias(name)
    }

    pub fn progress(&self) -> ProgressFactory {
        ProgressFactory::new(!self.quiet)
    }
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

/// Builder for creating command contexts. Unset fields come from the config.
pub struct CommandContextBuilder {
    config: Config,
    host: Option<String>,
    port: Option<u16>,
    key_path: Option<PathBuf>,
    timeout: Option<Duration>,
    quiet: bool,
}

impl CommandContextBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            host: None,
            port: None,
            key_path: None,
            timeout: None,
            quiet: false,
        }
    }

    pub fn host(mut self, host: Option<String>) -> Self {
        self.host = host;
        self
    }

    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, key_path: Option<PathBuf>) -> Self {
        self.key_path = key_path;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn build(self) -> CommandContext {
        let host = self.host.unwrap_or_else(|| self.config.host.clone());
        let port = self.port.unwrap_or(self.config.port);

        CommandContext {
            address: socket_address(&host, port),
            key_path: self.key_path.unwrap_or_else(|| self.config.key_path()),
            timeout: self.timeout.unwrap_or_else(|| self.config.connect_timeout()),
            quiet: self.quiet,
            config: self.config,
        }
    }
}
