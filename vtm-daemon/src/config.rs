//! Configuration management for vtmpegd
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--socket`, `--loop`, `--simulate`, `--log-level`)
//! 2. Environment variables (`VTMPEG_SOCKET`, resolved by clap)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)

use std::path::{Path, PathBuf};
use std::time::Duration;

use vtm_common::config::{
    ConfigSource, ConsumptionMode, LoggingConfig, PlayerBackend, PlayerConfig, TomlConfig,
};

use crate::error::Result;

/// Complete daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Well-known rendezvous path
    pub socket_path: PathBuf,

    pub mode: ConsumptionMode,

    pub max_queue_len: usize,

    /// Per-connection receive timeout
    pub read_timeout: Duration,

    pub action_queue_capacity: usize,

    pub status_interval: Duration,

    pub player: PlayerConfig,

    pub logging: LoggingConfig,

    /// Where the TOML layer came from
    pub source: ConfigSource,
}

impl Config {
    /// Load TOML configuration and apply command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - An explicit `config_path` cannot be read
    /// - A configuration file exists but cannot be parsed
    /// - The merged values fail validation
    pub fn load(config_path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let (toml_config, source) = TomlConfig::load_or_default(config_path)?;
        Self::from_toml(toml_config, source, overrides)
    }

    /// Merge an already parsed TOML layer with overrides
    pub fn from_toml(
        mut toml_config: TomlConfig,
        source: ConfigSource,
        overrides: ConfigOverrides,
    ) -> Result<Self> {
        if let Some(socket_path) = overrides.socket_path {
            toml_config.socket_path = socket_path;
        }
        if let Some(mode) = overrides.mode {
            toml_config.mode = mode;
        }
        if let Some(backend) = overrides.backend {
            toml_config.player.backend = backend;
        }
        if let Some(level) = overrides.log_level {
            toml_config.logging.level = level;
        }

        toml_config.validate()?;

        Ok(Self {
            socket_path: toml_config.socket_path,
            mode: toml_config.mode,
            max_queue_len: toml_config.max_queue_len,
            read_timeout: Duration::from_millis(toml_config.read_timeout_ms),
            action_queue_capacity: toml_config.action_queue_capacity,
            status_interval: Duration::from_millis(toml_config.status_interval_ms),
            player: toml_config.player,
            logging: toml_config.logging,
            source,
        })
    }

    pub fn simulated_item_duration(&self) -> Duration {
        Duration::from_millis(self.player.simulated_item_ms)
    }

    pub fn about_to_finish(&self) -> Duration {
        Duration::from_millis(self.player.about_to_finish_ms)
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub socket_path: Option<PathBuf>,
    pub mode: Option<ConsumptionMode>,
    pub backend: Option<PlayerBackend>,
    pub log_level: Option<String>,
}
