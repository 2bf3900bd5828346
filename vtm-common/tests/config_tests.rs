//! Configuration loading and graceful degradation
//!
//! Tests that manipulate XDG_CONFIG_HOME are marked with #[serial] so they
//! do not race each other.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serial_test::serial;
use vtm_common::config::{
    default_config_paths, ConfigSource, ConsumptionMode, PlayerBackend, TomlConfig,
};

const FULL_CONFIG: &str = r#"
socket_path = "/run/vtmpeg/ctl"
mode = "loop"
max_queue_len = 16
read_timeout_ms = 250
action_queue_capacity = 8
status_interval_ms = 100

[player]
backend = "simulated"
command = ["vlc", "--fullscreen"]
simulated_item_ms = 3000
about_to_finish_ms = 500

[logging]
level = "debug"
file = "/var/log/vtmpegd.log"
"#;

#[test]
fn test_full_config_parses() {
    let config = TomlConfig::from_toml_str(FULL_CONFIG).unwrap();

    assert_eq!(config.socket_path, PathBuf::from("/run/vtmpeg/ctl"));
    assert_eq!(config.mode, ConsumptionMode::Loop);
    assert_eq!(config.max_queue_len, 16);
    assert_eq!(config.read_timeout_ms, 250);
    assert_eq!(config.action_queue_capacity, 8);
    assert_eq!(config.status_interval_ms, 100);
    assert_eq!(config.player.backend, PlayerBackend::Simulated);
    assert_eq!(config.player.command, vec!["vlc", "--fullscreen"]);
    assert_eq!(config.player.simulated_item_ms, 3000);
    assert_eq!(config.player.about_to_finish_ms, 500);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.logging.file, Some(PathBuf::from("/var/log/vtmpegd.log")));
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_config_keeps_defaults() {
    let config = TomlConfig::from_toml_str("mode = \"loop\"\n[logging]\nlevel = \"warn\"\n").unwrap();

    assert_eq!(config.mode, ConsumptionMode::Loop);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.socket_path, PathBuf::from("/tmp/VTmpegd"));
    assert_eq!(config.max_queue_len, 2048);
    assert_eq!(config.player.command[0], "mpv");
}

#[test]
fn test_unknown_mode_is_rejected() {
    let err = TomlConfig::from_toml_str("mode = \"shuffle\"").unwrap_err();
    assert!(err.to_string().contains("Configuration error"));
}

#[test]
fn test_validate_rejects_unusable_values() {
    let mut config = TomlConfig::default();
    config.max_queue_len = 0;
    assert!(config.validate().is_err());

    let mut config = TomlConfig::default();
    config.action_queue_capacity = 0;
    assert!(config.validate().is_err());

    let mut config = TomlConfig::default();
    config.read_timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = TomlConfig::default();
    config.player.command.clear();
    assert!(config.validate().is_err());
}

#[test]
fn test_explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    fs::write(&path, FULL_CONFIG).unwrap();

    let (config, source) = TomlConfig::load_or_default(Some(&path)).unwrap();
    assert_eq!(source, ConfigSource::File(path.clone()));
    assert_eq!(config.max_queue_len, 16);
}

#[test]
fn test_explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(TomlConfig::load_or_default(Some(&path)).is_err());
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    fs::write(&path, "max_queue_len = \"many\"").unwrap();
    assert!(TomlConfig::load(&path).is_err());
}

#[test]
#[serial]
fn test_user_config_dir_is_searched() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("vtmpeg");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "max_queue_len = 7\n").unwrap();

    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let paths = default_config_paths();
    let (config, source) = TomlConfig::load_or_default(None).unwrap();

    restore_env("XDG_CONFIG_HOME", previous);

    if cfg!(target_os = "linux") {
        assert_eq!(paths[0], config_dir.join("config.toml"));
        assert_eq!(source, ConfigSource::File(config_dir.join("config.toml")));
        assert_eq!(config.max_queue_len, 7);
    }
}

#[test]
#[serial]
fn test_missing_config_falls_back_to_defaults() {
    if Path::new("/etc/vtmpeg/config.toml").exists() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();

    let previous = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", dir.path());

    let logs = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(logs.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, || {
        TomlConfig::load_or_default(None)
    });

    restore_env("XDG_CONFIG_HOME", previous);

    if cfg!(target_os = "linux") {
        let (config, source) = result.unwrap();
        assert_eq!(source, ConfigSource::Defaults);
        assert_eq!(config, TomlConfig::default());

        let output = logs.contents();
        assert!(output.contains("WARN"));
        assert!(output.contains("using built-in defaults"));
    }
}

/// In-memory log sink for a scoped subscriber
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn restore_env(key: &str, previous: Option<std::ffi::OsString>) {
    match previous {
        Some(value) => env::set_var(key, value),
        None => env::remove_var(key),
    }
}
