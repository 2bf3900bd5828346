//! Common error types for VTmpeg

use thiserror::Error;

use crate::protocol::DecodeError;

/// Common result type for VTmpeg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the daemon and the client
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed request on the wire
    #[error("Protocol error: {0}")]
    Protocol(#[from] DecodeError),

    /// Logging subsystem could not be initialized
    #[error("Logging error: {0}")]
    Logging(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
