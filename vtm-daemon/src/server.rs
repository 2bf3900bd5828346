//! Local socket connection server
//!
//! **Responsibilities:**
//! - Socket rendezvous: bind `<base>.N`, point the `<base>` symlink at it
//! - Accept loop; one task per connection, one request per connection
//! - Bounded, timed request reads; responses written back before close

use std::io;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use vtm_common::protocol::{self, MAX_REQUEST_LEN};

use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};

/// Highest `<base>.N` suffix tried before giving up
pub const MAX_SOCKET_INSTANCES: u32 = 256;

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// The socket file this daemon bound and the well-known link to it.
///
/// Both are removed when dropped (the link only while it still points here).
#[derive(Debug)]
pub struct SocketRendezvous {
    base: PathBuf,
    socket_path: PathBuf,
}

impl SocketRendezvous {
    /// Bind the first free `<base>.N` and make `<base>` a symlink to it
    pub fn bind(base: &Path) -> Result<(UnixListener, Self)> {
        let (listener, socket_path) = bind_first_free(base)?;
        let rendezvous = Self {
            base: base.to_path_buf(),
            socket_path,
        };

        std::fs::set_permissions(&rendezvous.socket_path, std::fs::Permissions::from_mode(0o666))
            .map_err(|e| {
                Error::Socket(format!(
                    "failed to set mode on {}: {}",
                    rendezvous.socket_path.display(),
                    e
                ))
            })?;
        rendezvous.link()?;

        info!(
            socket = %rendezvous.socket_path.display(),
            link = %rendezvous.base.display(),
            "Listening"
        );
        Ok((listener, rendezvous))
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    fn link(&self) -> Result<()> {
        match std::fs::symlink_metadata(&self.base) {
            Ok(meta) if meta.is_dir() => {
                return Err(Error::Socket(format!(
                    "{} is a directory",
                    self.base.display()
                )));
            }
            Ok(_) => {
                debug!(path = %self.base.display(), "Replacing existing rendezvous link");
                std::fs::remove_file(&self.base)?;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        symlink(&self.socket_path, &self.base).map_err(|e| {
            Error::Socket(format!("failed to link {}: {}", self.base.display(), e))
        })
    }

    fn cleanup(&self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %self.socket_path.display(), "Failed to remove socket: {}", e);
            }
        }

        // Another daemon may have taken the link over since
        if let Ok(target) = std::fs::read_link(&self.base) {
            if target == self.socket_path {
                if let Err(e) = std::fs::remove_file(&self.base) {
                    warn!(path = %self.base.display(), "Failed to remove link: {}", e);
                }
            }
        }
        debug!(path = %self.socket_path.display(), "Socket files removed");
    }
}

impl Drop for SocketRendezvous {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn numbered_path(base: &Path, n: u32) -> PathBuf {
    let mut path = base.as_os_str().to_os_string();
    path.push(format!(".{}", n));
    PathBuf::from(path)
}

fn bind_first_free(base: &Path) -> Result<(UnixListener, PathBuf)> {
    for n in 0..MAX_SOCKET_INSTANCES {
        let candidate = numbered_path(base, n);
        // Leftovers of crashed daemons are skipped, not reclaimed
        if std::fs::symlink_metadata(&candidate).is_ok() {
            continue;
        }
        match UnixListener::bind(&candidate) {
            Ok(listener) => return Ok((listener, candidate)),
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => continue,
            Err(e) => {
                return Err(Error::Socket(format!(
                    "failed to bind {}: {}",
                    candidate.display(),
                    e
                )))
            }
        }
    }
    Err(Error::Socket(format!(
        "no free socket path among {}.0 .. {}.{}",
        base.display(),
        base.display(),
        MAX_SOCKET_INSTANCES - 1
    )))
}

/// Accept loop over the bound listener
pub struct ConnectionServer {
    listener: UnixListener,
    dispatcher: Dispatcher,
    read_timeout: Duration,
}

impl ConnectionServer {
    pub fn new(listener: UnixListener, dispatcher: Dispatcher, read_timeout: Duration) -> Self {
        Self {
            listener,
            dispatcher,
            read_timeout,
        }
    }

    /// Serve connections until `shutdown` flips to true
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) {
        info!("Connection server started");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let dispatcher = self.dispatcher.clone();
                        let read_timeout = self.read_timeout;
                        tokio::spawn(async move {
                            handle_connection(stream, dispatcher, read_timeout).await;
                        });
                    }
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!("Connection server stopped");
    }
}

async fn handle_connection(mut stream: UnixStream, dispatcher: Dispatcher, read_timeout: Duration) {
    let raw = match tokio::time::timeout(read_timeout, read_request(&mut stream)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(e)) => {
            debug!("Failed to read request: {}", e);
            return;
        }
        Err(_) => {
            debug!("Client did not send a request in time");
            return;
        }
    };

    let Some(response) = dispatcher.handle_request(&raw).await else {
        return;
    };

    if let Err(e) = stream.write_all(&response.encode()).await {
        debug!("Failed to write response: {}", e);
        return;
    }
    if let Err(e) = stream.shutdown().await {
        debug!("Failed to close connection: {}", e);
    }
}

/// Read until a newline, EOF, more than `MAX_REQUEST_LEN` bytes, or until
/// the bytes so far already decode to a command.
///
/// Clients may send a bare `1` and keep the connection open waiting for the
/// answer, so a missing newline alone never stalls a request.
async fn read_request(stream: &mut UnixStream) -> io::Result<Vec<u8>> {
    let mut raw = Vec::with_capacity(256);
    let mut chunk = [0u8; 512];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
        if chunk[..n].contains(&b'\n')
            || raw.len() > MAX_REQUEST_LEN
            || is_complete_request(&raw)
        {
            break;
        }
    }
    Ok(raw)
}

fn is_complete_request(raw: &[u8]) -> bool {
    matches!(protocol::decode(raw), Ok(Some(_)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_request_without_newline() {
        assert!(is_complete_request(b"1"));
        assert!(is_complete_request(b"2 /tmp/a.mp4;0"));
        assert!(is_complete_request(b"3 2"));
        // Arguments still missing
        assert!(!is_complete_request(b"2"));
        assert!(!is_complete_request(b""));
        assert!(!is_complete_request(b"hel"));
    }

    #[test]
    fn test_numbered_path() {
        assert_eq!(
            numbered_path(Path::new("/tmp/VTmpegd"), 3),
            PathBuf::from("/tmp/VTmpegd.3")
        );
    }

    #[tokio::test]
    async fn test_bind_skips_taken_paths() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("VTmpegd");
        std::fs::write(numbered_path(&base, 0), b"stale").unwrap();

        let (_listener, rendezvous) = SocketRendezvous::bind(&base).unwrap();
        assert_eq!(rendezvous.socket_path(), numbered_path(&base, 1));
        assert_eq!(std::fs::read_link(&base).unwrap(), numbered_path(&base, 1));

        let mode = std::fs::metadata(rendezvous.socket_path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o666);
    }

    #[tokio::test]
    async fn test_second_daemon_takes_over_link() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("VTmpegd");

        let (_first_listener, first) = SocketRendezvous::bind(&base).unwrap();
        let (_second_listener, second) = SocketRendezvous::bind(&base).unwrap();
        assert_eq!(std::fs::read_link(&base).unwrap(), second.socket_path());

        // The first daemon leaves the link alone when it no longer owns it
        let first_path = first.socket_path().to_path_buf();
        drop(first);
        assert!(!first_path.exists());
        assert_eq!(std::fs::read_link(&base).unwrap(), second.socket_path());

        drop(second);
        assert!(std::fs::symlink_metadata(&base).is_err());
    }

    #[tokio::test]
    async fn test_bind_rejects_directory_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("VTmpegd");
        std::fs::create_dir(&base).unwrap();
        assert!(matches!(SocketRendezvous::bind(&base), Err(Error::Socket(_))));
    }
}
