//! Agent configuration: command line, environment and an optional TOML
//! file. Flags and environment variables win over the file, the file wins
//! over built-in defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::Deserialize;
use thiserror::Error;

use crate::host::DEFAULT_COMMIT_TIMEOUT;
use crate::session::{SessionConfig, DEFAULT_RECONNECT_COOLDOWN};
use crate::transport::{Endpoint, TransportError, DEFAULT_URL};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },
    #[error("invalid config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Endpoint(#[from] TransportError),
}

#[derive(Debug, Default, Parser)]
#[command(name = "freshen-agent")]
#[command(version)]
#[command(about = "Keeps a device connected to its dashboard for RPC and OTA updates.", long_about = None)]
pub struct Cli {
    /// Dashboard WebSocket URL.
    #[arg(long, env = "FRESHEN_URL")]
    pub url: Option<String>,

    /// Bearer token identifying the device.
    #[arg(long, env = "FRESHEN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Firmware version reported by Sys.GetInfo.
    #[arg(long)]
    pub fw_version: Option<String>,

    /// Directory served by the FS.* methods.
    #[arg(long)]
    pub fs_root: Option<PathBuf>,

    /// Directory for OTA staging and the key-value store.
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// PEM file with the root certificates to trust instead of the bundled set.
    #[arg(long)]
    pub ca_file: Option<PathBuf>,

    #[arg(long)]
    pub reconnect_secs: Option<u64>,

    /// How long a new image has to confirm itself.
    #[arg(long)]
    pub commit_timeout_secs: Option<u64>,

    /// Log filter, e.g. `info` or `freshen=debug`.
    #[arg(long, env = "RUST_LOG")]
    pub log: Option<String>,
}

/// Contents of the TOML file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub fw_version: Option<String>,
    pub fs_root: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub ca_file: Option<PathBuf>,
    pub reconnect_secs: Option<u64>,
    pub commit_timeout_secs: Option<u64>,
    pub log: Option<String>,
}

impl FileConfig {
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    pub url: String,
    pub token: String,
    pub fw_version: String,
    pub fs_root: PathBuf,
    pub state_dir: PathBuf,
    pub ca_file: Option<PathBuf>,
    pub reconnect_cooldown: Duration,
    pub commit_timeout: Duration,
    pub log: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            token: String::new(),
            fw_version: "1.0".to_string(),
            fs_root: PathBuf::from("."),
            state_dir: PathBuf::from(".freshen"),
            ca_file: None,
            reconnect_cooldown: DEFAULT_RECONNECT_COOLDOWN,
            commit_timeout: DEFAULT_COMMIT_TIMEOUT,
            log: "info".to_string(),
        }
    }
}

impl AgentConfig {
    /// Reads the file named by `--config`, if any, and layers `cli` on top.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let file = match &cli.config {
            Some(path) => FileConfig::read(path)?,
            None => FileConfig::default(),
        };
        let config = Self::merge(cli, file);
        config.endpoint()?;
        Ok(config)
    }

    pub fn merge(cli: &Cli, file: FileConfig) -> Self {
        let defaults = Self::default();
        let secs = |flag: Option<u64>, from_file: Option<u64>, default: Duration| {
            flag.or(from_file).map_or(default, Duration::from_secs)
        };
        Self {
            url: cli.url.clone().or(file.url).unwrap_or(defaults.url),
            token: cli.token.clone().or(file.token).unwrap_or(defaults.token),
            fw_version: cli
                .fw_version
                .clone()
                .or(file.fw_version)
                .unwrap_or(defaults.fw_version),
            fs_root: cli.fs_root.clone().or(file.fs_root).unwrap_or(defaults.fs_root),
            state_dir: cli
                .state_dir
                .clone()
                .or(file.state_dir)
                .unwrap_or(defaults.state_dir),
            ca_file: cli.ca_file.clone().or(file.ca_file),
            reconnect_cooldown: secs(cli.reconnect_secs, file.reconnect_secs, defaults.reconnect_cooldown),
            commit_timeout: secs(
                cli.commit_timeout_secs,
                file.commit_timeout_secs,
                defaults.commit_timeout,
            ),
            log: cli.log.clone().or(file.log).unwrap_or(defaults.log),
        }
    }

    pub fn endpoint(&self) -> Result<Endpoint, TransportError> {
        Endpoint::parse(&self.url)
    }

    pub fn session_config(&self) -> Result<SessionConfig, TransportError> {
        let mut session = SessionConfig::new(self.endpoint()?, self.token.clone());
        session.reconnect_cooldown = self.reconnect_cooldown;
        Ok(session)
    }
}
