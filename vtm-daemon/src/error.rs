//! Error types for vtm-daemon
//!
//! Playlist domain errors live in [`crate::playlist::PlaylistError`] and
//! bridge submission errors in [`crate::bridge::BridgeError`]; both are
//! reported to clients rather than propagated as daemon failures.

use thiserror::Error;

/// Main error type for the daemon
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Socket setup errors (rendezvous, bind, permissions)
    #[error("Socket error: {0}")]
    Socket(String),

    /// Playback engine errors
    #[error("Playback engine error: {0}")]
    Engine(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library
    #[error(transparent)]
    Common(#[from] vtm_common::Error),
}

/// Convenience Result type using the daemon Error
pub type Result<T> = std::result::Result<T, Error>;
