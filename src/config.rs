use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error as ThisError;
use tokio::time::Duration;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;

/// Upper bound of a single buffered request. Large enough for a full snapshot sent with REPLACEDB.
pub const MAX_REQUEST_SIZE: usize = 512 * 1024 * 1024;

/// Runtime configuration of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// `host:port` to listen on.
    pub listen: String,
    /// Plain-text bootstrap file, read when no snapshot exists yet.
    pub init_file: PathBuf,
    /// Snapshot file.
    pub dump_file: PathBuf,
    /// Whether this node accepts client writes.
    pub authority: bool,
    /// Shared secret clients must present with AUTH.
    pub auth: Option<String>,
    /// Number of changes after which the store is saved.
    pub update_count: u64,
    pub max_request_size: usize,
    /// How long connections may stay open after SHUTDOWN.
    pub shutdown_grace: Duration,
    /// How long a replica link waits for a reply.
    pub reply_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: format!("{DEFAULT_HOST}:{DEFAULT_PORT}"),
            init_file: PathBuf::from("MDB.TXT"),
            dump_file: PathBuf::from("replikv-dump.db"),
            authority: false,
            auth: None,
            update_count: default_update_count(),
            max_request_size: MAX_REQUEST_SIZE,
            shutdown_grace: Duration::from_secs(15),
            reply_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Applies the settings of the hidden configuration file.
    pub fn with_file(mut self, file: ConfigFile) -> Config {
        self.auth = file.security.auth.filter(|secret| !secret.is_empty());
        self.update_count = file.general.update_count.max(1);
        self
    }
}

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config file: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Contents of the hidden configuration file.
///
/// ```toml
/// [security]
/// auth = "secret"
///
/// [general]
/// update_count = 10
/// ```
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SecurityConfig {
    #[serde(default)]
    pub auth: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GeneralConfig {
    #[serde(default = "default_update_count")]
    pub update_count: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            update_count: default_update_count(),
        }
    }
}

fn default_update_count() -> u64 {
    10
}

impl ConfigFile {
    /// Reads the file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<ConfigFile, ConfigError> {
        if !path.exists() {
            return Ok(ConfigFile::default());
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

/// Completes a `host:port` listen address. An empty host means localhost and an empty port means
/// the default port.
pub fn listen_address(listen: &str) -> String {
    let (host, port) = match listen.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (listen, ""),
    };
    let host = if host.is_empty() { DEFAULT_HOST } else { host };
    let port = if port.is_empty() {
        DEFAULT_PORT.to_string()
    } else {
        port.to_string()
    };
    format!("{host}:{port}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_address_defaults() {
        assert_eq!(listen_address(""), "localhost:6379");
        assert_eq!(listen_address(":7000"), "localhost:7000");
        assert_eq!(listen_address("10.0.0.1:"), "10.0.0.1:6379");
        assert_eq!(listen_address("10.0.0.1"), "10.0.0.1:6379");
        assert_eq!(listen_address("0.0.0.0:6380"), "0.0.0.0:6380");
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let file = ConfigFile::load(&dir.path().join(".replikv.toml")).unwrap();

        assert_eq!(file, ConfigFile::default());
        assert_eq!(file.general.update_count, 10);
    }

    #[test]
    fn file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".replikv.toml");
        fs::write(&path, "[security]\nauth = \"s3cret\"\n\n[general]\nupdate_count = 3\n").unwrap();

        let config = Config::default().with_file(ConfigFile::load(&path).unwrap());

        assert_eq!(config.auth.as_deref(), Some("s3cret"));
        assert_eq!(config.update_count, 3);
    }

    #[test]
    fn partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".replikv.toml");
        fs::write(&path, "[security]\nauth = \"\"\n").unwrap();

        let config = Config::default().with_file(ConfigFile::load(&path).unwrap());

        assert_eq!(config.auth, None);
        assert_eq!(config.update_count, 10);
    }

    #[test]
    fn invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".replikv.toml");
        fs::write(&path, "[general]\nupdate_count = \"many\"\n").unwrap();

        assert!(matches!(ConfigFile::load(&path), Err(ConfigError::Toml(_))));
    }
}
