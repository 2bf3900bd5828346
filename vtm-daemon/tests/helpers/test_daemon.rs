//! In-process daemon for integration tests
//!
//! Wires the same components `vtmpegd` does, with the simulated engine and a
//! rendezvous socket inside a temporary directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use vtm_common::protocol::{Command, Response};
use vtm_daemon::bridge::{ActionBridge, PlaybackAction};
use vtm_daemon::dispatcher::Dispatcher;
use vtm_daemon::playback::{event_channel, PlayHistory, PlaybackDriver, SimulatedEngine};
use vtm_daemon::playlist::{ConsumptionMode, PlaylistStore};
use vtm_daemon::server::{ConnectionServer, SocketRendezvous};
use vtm_daemon::state::PlaybackState;
use vtm_daemon::SharedState;

/// Timing and limits for a test daemon
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub mode: ConsumptionMode,
    pub max_queue_len: usize,
    pub read_timeout: Duration,
    pub item_duration: Duration,
    pub about_to_finish: Duration,
    pub status_interval: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            mode: ConsumptionMode::Fifo,
            max_queue_len: 16,
            read_timeout: Duration::from_millis(300),
            item_duration: Duration::from_secs(30),
            about_to_finish: Duration::from_secs(2),
            status_interval: Duration::from_millis(20),
        }
    }
}

impl TestOptions {
    pub fn mode(mut self, mode: ConsumptionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn item_duration(mut self, item: Duration, about_to_finish: Duration) -> Self {
        self.item_duration = item;
        self.about_to_finish = about_to_finish;
        self
    }
}

/// Full daemon running on a temporary socket
pub struct TestDaemon {
    dir: TempDir,
    pub base: PathBuf,
    pub socket_path: PathBuf,
    pub store: Arc<PlaylistStore>,
    pub state: Arc<SharedState>,
    pub history: PlayHistory,
    shutdown_tx: watch::Sender<bool>,
    server: JoinHandle<()>,
    driver: JoinHandle<SimulatedEngine>,
    rendezvous: SocketRendezvous,
}

impl TestDaemon {
    pub async fn start(options: TestOptions) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let base = dir.path().join("VTmpegd");

        let store = Arc::new(PlaylistStore::new(options.mode, options.max_queue_len));
        let state = Arc::new(SharedState::new());
        let (bridge, actions) = ActionBridge::new(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (listener, rendezvous) = SocketRendezvous::bind(&base).expect("Failed to bind socket");
        let socket_path = rendezvous.socket_path().to_path_buf();

        let (event_tx, event_rx) = event_channel();
        let engine = SimulatedEngine::new(options.item_duration, options.about_to_finish, event_tx);
        let history = engine.history();
        let driver = PlaybackDriver::new(
            engine,
            Arc::clone(&store),
            Arc::clone(&state),
            actions,
            event_rx,
            options.status_interval,
        );
        let driver = tokio::spawn(driver.run(shutdown_rx.clone()));

        let dispatcher = Dispatcher::new(Arc::clone(&store), bridge, Arc::clone(&state));
        let server = ConnectionServer::new(listener, dispatcher, options.read_timeout);
        let server = tokio::spawn(server.serve(shutdown_rx));

        Self {
            dir,
            base,
            socket_path,
            store,
            state,
            history,
            shutdown_tx,
            server,
            driver,
            rendezvous,
        }
    }

    /// Send raw request bytes through the rendezvous link; returns everything
    /// the daemon wrote before closing
    pub async fn request(&self, raw: &[u8]) -> Vec<u8> {
        let mut stream = UnixStream::connect(&self.base)
            .await
            .expect("Failed to connect to test daemon");
        stream.write_all(raw).await.expect("Failed to send request");

        let mut response = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response))
            .await
            .expect("Daemon did not close the connection")
            .expect("Failed to read response");
        response
    }

    /// Send a command; `None` when the daemon answered with nothing
    pub async fn command(&self, command: &Command) -> Option<Response> {
        let raw = self.request(command.to_request_line().as_bytes()).await;
        Response::parse(&raw).expect("Malformed response")
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    /// Wait until the engine has started exactly `expected`, in order
    pub async fn wait_for_history(&self, expected: &[&str]) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.history() == expected {
                return true;
            }
            sleep(POLL).await;
        }
        false
    }

    pub async fn wait_for_state(&self, expected: PlaybackState) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.state.get_playback_state().await == expected {
                return true;
            }
            sleep(POLL).await;
        }
        false
    }

    /// Wait until the status snapshot names `uri` as current (`None`: idle)
    pub async fn wait_for_now_playing(&self, uri: Option<&str>) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            let current = self.state.get_now_playing().await;
            if current.as_ref().map(|now| now.uri.as_str()) == uri {
                return true;
            }
            sleep(POLL).await;
        }
        false
    }

    pub async fn wait_for_muted(&self, muted: bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if self.state.is_muted() == muted {
                return true;
            }
            sleep(POLL).await;
        }
        false
    }

    /// Stop both tasks and remove the socket files
    pub async fn shutdown(self) -> PathBuf {
        let _ = self.shutdown_tx.send(true);
        self.server.await.expect("Server task panicked");
        self.driver.await.expect("Driver task panicked");
        let base = self.base.clone();
        drop(self.rendezvous);
        drop(self.dir);
        base
    }
}

/// Playback driver and simulated engine without a socket
pub struct DriverHarness {
    pub store: Arc<PlaylistStore>,
    pub state: Arc<SharedState>,
    pub bridge: ActionBridge,
    pub history: PlayHistory,
    pub shutdown_tx: watch::Sender<bool>,
    pub driver: JoinHandle<SimulatedEngine>,
}

impl DriverHarness {
    /// Items last 10s, about-to-finish 2s before the end, 500ms status tick
    pub fn start(mode: ConsumptionMode) -> Self {
        let store = Arc::new(PlaylistStore::new(mode, 16));
        let state = Arc::new(SharedState::new());
        let (bridge, actions): (ActionBridge, mpsc::Receiver<PlaybackAction>) =
            ActionBridge::new(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (event_tx, event_rx) = event_channel();
        let engine = SimulatedEngine::new(Duration::from_secs(10), Duration::from_secs(2), event_tx);
        let history = engine.history();
        let driver = PlaybackDriver::new(
            engine,
            Arc::clone(&store),
            Arc::clone(&state),
            actions,
            event_rx,
            Duration::from_millis(500),
        );
        let driver = tokio::spawn(driver.run(shutdown_rx));

        Self {
            store,
            state,
            bridge,
            history,
            shutdown_tx,
            driver,
        }
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }

    pub fn submit(&self, action: PlaybackAction) {
        self.bridge.submit(action).expect("Failed to submit action");
    }

    pub async fn stop(self) -> SimulatedEngine {
        let _ = self.shutdown_tx.send(true);
        self.driver.await.expect("Driver task panicked")
    }
}

/// How long the wait helpers poll before giving up
pub const WAIT: Duration = Duration::from_secs(5);

const POLL: Duration = Duration::from_millis(10);
