//! One-shot request/response exchange with the daemon
//!
//! Each invocation opens a fresh connection, sends one request line and reads
//! until the delimiter line or until the daemon closes. Transport commands
//! are acknowledged by a close with no bytes.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::debug;
use vtm_common::protocol::{Command, DecodeError, Response};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Cannot connect to {}: {source}", .path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No response from daemon within {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    Protocol(#[from] DecodeError),
}

pub struct Client {
    socket_path: PathBuf,
    timeout: Duration,
}

impl Client {
    pub fn new(socket_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout,
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send `command`; `Ok(None)` when the daemon accepted it without a
    /// response
    pub async fn send(&self, command: &Command) -> Result<Option<Response>, ClientError> {
        let mut stream =
            UnixStream::connect(&self.socket_path)
                .await
                .map_err(|source| ClientError::Connect {
                    path: self.socket_path.clone(),
                    source,
                })?;

        let line = command.to_request_line();
        debug!(request = line.trim_end(), "Sending request");
        stream.write_all(line.as_bytes()).await?;
        stream.shutdown().await?;

        let raw = timeout(self.timeout, read_response(&mut stream))
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))??;
        debug!(bytes = raw.len(), "Response received");

        Ok(Response::parse(&raw)?)
    }
}

/// Read until the delimiter line or EOF
async fn read_response(stream: &mut UnixStream) -> std::io::Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(256);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
        if Response::is_complete(&raw) {
            break;
        }
    }
    Ok(raw)
}
