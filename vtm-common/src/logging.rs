//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. Output goes to
//! stderr unless a log file is configured.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;
use crate::{Error, Result};

/// Build the filter: `crate_targets` (e.g. `vtm_daemon`) log at the
/// configured level, everything else at `warn`, unless `RUST_LOG` is set.
pub fn env_filter(config: &LoggingConfig, crate_targets: &[&str]) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut directives = vec!["warn".to_string()];
        directives.extend(
            crate_targets
                .iter()
                .map(|target| format!("{}={}", target, config.level)),
        );
        EnvFilter::new(directives.join(","))
    })
}

/// Install the global subscriber
pub fn init(config: &LoggingConfig, crate_targets: &[&str]) -> Result<()> {
    let filter = env_filter(config, crate_targets);

    let (stderr_layer, file_layer) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Error::Logging(format!("Failed to open log file {}: {}", path.display(), e))
                })?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(e.to_string()))
}
