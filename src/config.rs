use crate::error::{AdbError, Result};
use log::{debug, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5555;
pub const DEFAULT_KEY_PATH: &str = "~/.android/adbkey";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

const CONFIG_FILE_NAME: &str = ".adbmux.toml";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub key_path: String,
    /// Seconds
    pub connect_timeout: u64,
    /// Short names for destinations, e.g. `logcat = "shell:logcat -v brief"`
    pub alias: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            key_path: DEFAULT_KEY_PATH.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            alias: HashMap::new(),
        }
    }
}

impl Config {
    /// `~/.adbmux.toml`, or defaults if it is missing or unreadable
    pub fn load() -> Self {
        match Config::get_config_path() {
            Some(path) => Config::load_from_path(&path),
            None => {
                debug!("No home directory; using default config");
                Config::default()
            }
        }
    }

    pub fn load_from_path(path: &Path) -> Self {
        debug!("Loading config from: {:?}", path);

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No config file found or unable to read it");
                return Config::default();
            }
        };

        match Config::parse(&content) {
            Ok(config) => {
                debug!("Parsed config: {:?}", config);
                config
            }
            Err(e) => {
                warn!("Ignoring {}: {}", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| AdbError::Config(e.to_string()))
    }

    pub fn get_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
    }

    /// `host:port` to dial
    pub fn address(&self) -> String {
        socket_address(&self.host, self.port)
    }

    /// Key path with `~` and environment variables expanded
    pub fn key_path(&self) -> PathBuf {
        expand_path(&self.key_path)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    pub fn resolve_alias(&self, destination: &str) -> String {
        debug!("Resolving alias for: {}", destination);
        self.alias
            .get(destination)
            .cloned()
            .unwrap_or_else(|| destination.to_string())
    }
}

/// `host:port`, with IPv6 literals in brackets
pub fn socket_address(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            warn!("Cannot expand {}: {}", path, e);
            PathBuf::from(shellexpand::tilde(path).as_ref())
        }
    }
}
