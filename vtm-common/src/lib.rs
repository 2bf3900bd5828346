//! # VTmpeg Common Library
//!
//! Shared code for the VTmpeg daemon and its command-line client:
//! - Wire protocol codec (requests, responses, command identifiers)
//! - Protocol limits and well-known paths
//! - TOML configuration loading
//! - Logging initialization
//! - Common error type

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;

pub use error::{Error, Result};
pub use protocol::{Command, CommandId, DecodeError, Response, Status};
