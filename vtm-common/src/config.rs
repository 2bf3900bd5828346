//! TOML configuration shared by `vtmpegd` and `vtqueue`
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments
//! 2. Environment variables (`VTMPEG_SOCKET`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing configuration file is not an error: the built-in defaults are
//! used and the caller is told so via [`ConfigSource::Defaults`]. A file that
//! exists but does not parse is an error.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::protocol::{DEFAULT_SOCKET_PATH, MAX_QUEUE_LEN};
use crate::{Error, Result};

/// Directory name used below the platform config dir and `/etc`
const CONFIG_DIR_NAME: &str = "vtmpeg";

/// Configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable naming the socket path
pub const SOCKET_ENV_VAR: &str = "VTMPEG_SOCKET";

/// How the playlist is consumed as items are played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumptionMode {
    /// Playing an item removes it from the playlist
    #[default]
    Fifo,
    /// The playlist is cyclic; items stay queued
    Loop,
}

impl ConsumptionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fifo => "fifo",
            Self::Loop => "loop",
        }
    }
}

/// Which playback engine back-end the daemon drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerBackend {
    /// External player process per item
    #[default]
    Process,
    /// Clock-driven stand-in, no media output
    Simulated,
}

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change while the daemon runs.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Well-known rendezvous path; numbered sockets are created next to it
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Playlist consumption mode
    #[serde(default)]
    pub mode: ConsumptionMode,

    /// Hard limit on queue depth
    #[serde(default = "default_max_queue_len")]
    pub max_queue_len: usize,

    /// Per-connection receive timeout (daemon) and response timeout (client)
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Capacity of the playback action queue
    #[serde(default = "default_action_queue_capacity")]
    pub action_queue_capacity: usize,

    /// How often the playback driver refreshes the status snapshot
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// Playback engine settings
    #[serde(default)]
    pub player: PlayerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback engine configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PlayerConfig {
    #[serde(default)]
    pub backend: PlayerBackend,

    /// Player program and its leading arguments; the item is appended
    #[serde(default = "default_player_command")]
    pub command: Vec<String>,

    /// Length of every item under the simulated back-end
    #[serde(default = "default_simulated_item_ms")]
    pub simulated_item_ms: u64,

    /// How long before the end the simulated back-end reports "about to finish"
    #[serde(default = "default_about_to_finish_ms")]
    pub about_to_finish_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_socket_path() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_PATH)
}

fn default_max_queue_len() -> usize {
    MAX_QUEUE_LEN
}

fn default_read_timeout_ms() -> u64 {
    1000
}

fn default_action_queue_capacity() -> usize {
    64
}

fn default_status_interval_ms() -> u64 {
    500
}

fn default_player_command() -> Vec<String> {
    vec![
        "mpv".to_string(),
        "--really-quiet".to_string(),
        "--fs".to_string(),
    ]
}

fn default_simulated_item_ms() -> u64 {
    10_000
}

fn default_about_to_finish_ms() -> u64 {
    2_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            mode: ConsumptionMode::default(),
            max_queue_len: default_max_queue_len(),
            read_timeout_ms: default_read_timeout_ms(),
            action_queue_capacity: default_action_queue_capacity(),
            status_interval_ms: default_status_interval_ms(),
            player: PlayerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            backend: PlayerBackend::default(),
            command: default_player_command(),
            simulated_item_ms: default_simulated_item_ms(),
            about_to_finish_ms: default_about_to_finish_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl TomlConfig {
    /// Parse configuration text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Read and parse a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Load the effective configuration.
    ///
    /// An explicit path must exist. Without one, the default locations are
    /// searched in order and the built-in defaults are used if none exists.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        for candidate in default_config_paths() {
            debug!("Checking for configuration file {}", candidate.display());
            if candidate.exists() {
                let config = Self::load(&candidate)?;
                return Ok((config, ConfigSource::File(candidate)));
            }
        }

        warn!("No configuration file found, using built-in defaults");
        Ok((Self::default(), ConfigSource::Defaults))
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.socket_path.as_os_str().is_empty() {
            return Err(Error::Config("socket_path must not be empty".to_string()));
        }
        if self.max_queue_len == 0 {
            return Err(Error::Config("max_queue_len must be at least 1".to_string()));
        }
        if self.action_queue_capacity == 0 {
            return Err(Error::Config(
                "action_queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.read_timeout_ms == 0 {
            return Err(Error::Config("read_timeout_ms must be non-zero".to_string()));
        }
        if self.status_interval_ms == 0 {
            return Err(Error::Config("status_interval_ms must be non-zero".to_string()));
        }
        if self.player.command.is_empty() || self.player.command[0].trim().is_empty() {
            return Err(Error::Config("player.command must name a program".to_string()));
        }
        if self.player.simulated_item_ms == 0 {
            return Err(Error::Config(
                "player.simulated_item_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Default configuration file locations, most specific first:
/// `<config dir>/vtmpeg/config.toml`, then `/etc/vtmpeg/config.toml`
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    if cfg!(unix) {
        paths.push(
            PathBuf::from("/etc")
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        );
    }
    paths
}
