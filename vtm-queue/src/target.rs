//! Resolving `--add` arguments into something the daemon can open

use std::path::PathBuf;

use thiserror::Error;
use vtm_common::protocol::MAX_URI_LEN;

#[derive(Error, Debug)]
pub enum TargetError {
    #[error("Cannot resolve {path}: {source}")]
    Resolve {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Resolved path is not valid UTF-8: {}", .0.display())]
    NotUtf8(PathBuf),

    #[error("URI too long (max {} bytes)", MAX_URI_LEN)]
    TooLong,
}

/// URIs (anything containing `://`) pass through; local paths become
/// absolute canonical paths
pub fn resolve(arg: &str) -> Result<String, TargetError> {
    let uri = if arg.contains("://") {
        arg.to_string()
    } else {
        let path = std::fs::canonicalize(arg).map_err(|source| TargetError::Resolve {
            path: arg.to_string(),
            source,
        })?;
        path.into_os_string()
            .into_string()
            .map_err(|raw| TargetError::NotUtf8(PathBuf::from(raw)))?
    };

    if uri.len() > MAX_URI_LEN {
        return Err(TargetError::TooLong);
    }
    Ok(uri)
}
