//! Command dispatcher
//!
//! Maps decoded requests onto the playlist store and the action bridge and
//! renders the response text. Holds no per-connection state.
//!
//! **Responsibilities:**
//! - LIST / INSERT / REMOVE against the playlist store
//! - Fire-and-forget transport commands through the action bridge
//! - Edge-triggered Start when the queue goes from empty to non-empty
//! - STATUS from the shared status snapshot only

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};
use vtm_common::protocol::{self, Command, DecodeError, Response};

use crate::bridge::{ActionBridge, PlaybackAction};
use crate::playlist::{PlaylistError, PlaylistStore};
use crate::state::{DaemonEvent, SharedState};

/// Heading line of a LIST response
pub const LIST_HEADER: &str = "VTmpeg queue list";

#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<PlaylistStore>,
    bridge: ActionBridge,
    state: Arc<SharedState>,
}

impl Dispatcher {
    pub fn new(store: Arc<PlaylistStore>, bridge: ActionBridge, state: Arc<SharedState>) -> Self {
        Self { store, bridge, state }
    }

    /// Decode raw request bytes and dispatch them.
    ///
    /// `None` means nothing is written back.
    pub async fn handle_request(&self, raw: &[u8]) -> Option<Response> {
        match protocol::decode(raw) {
            Ok(Some(command)) => self.dispatch(command).await,
            Ok(None) => {
                debug!("Empty request");
                None
            }
            Err(e) => Some(malformed(&e)),
        }
    }

    pub async fn dispatch(&self, command: Command) -> Option<Response> {
        debug!(%command, "Dispatching");
        match command {
            Command::List => Some(self.list()),
            Command::Insert { uri, position } => Some(self.insert(&uri, position)),
            Command::Remove { position } => Some(self.remove(position)),
            Command::Status => Some(self.status().await),
            Command::Play => self.submit(PlaybackAction::Resume),
            Command::Pause => self.submit(PlaybackAction::Pause),
            Command::Stop => self.submit(PlaybackAction::Stop),
            Command::Next => self.submit(PlaybackAction::Skip),
            Command::Mute => self.submit(PlaybackAction::ToggleMute),
            // The rewind itself runs on the driver, which knows about any
            // pending hand-off
            Command::Prev => match self.store.check_previous() {
                Ok(()) => self.submit(PlaybackAction::Previous),
                Err(e) => Some(Response::error(e.to_string())),
            },
            Command::Unknown(id) => {
                debug!(id, "Unknown command");
                Some(Response::error("Unknown command."))
            }
        }
    }

    fn list(&self) -> Response {
        let entries = self.store.list();
        if entries.is_empty() {
            return Response::error(PlaylistError::EmptyList.to_string());
        }

        let mut lines = Vec::with_capacity(entries.len() + 1);
        lines.push(LIST_HEADER.to_string());
        for entry in entries {
            let mut line = format!("{}{}{}", entry.position, protocol::COMMAND_DELIM, entry.uri);
            if entry.is_playing {
                line.push_str(" - playing");
            }
            lines.push(line);
        }
        Response::ok(lines)
    }

    fn insert(&self, uri: &str, position: i64) -> Response {
        match self.store.insert(uri, position) {
            Ok(outcome) => {
                self.queue_changed();
                if outcome.was_empty {
                    // Start is edge-triggered on empty -> non-empty
                    self.submit(PlaybackAction::Start);
                }
                Response::ok([format!("Filename {} OK", uri)])
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    fn remove(&self, position: i64) -> Response {
        match self.store.remove(position) {
            Ok(_) => {
                self.queue_changed();
                Response::ok([format!("Remove position {} OK", position)])
            }
            Err(e) => Response::error(e.to_string()),
        }
    }

    async fn status(&self) -> Response {
        let snapshot = self.state.snapshot().await;
        let (file, position, duration) = match &snapshot.now_playing {
            Some(now) => (now.uri.as_str(), now.position, now.duration),
            None => ("-", None, None),
        };

        Response::ok([
            format!("State: {}", snapshot.state),
            format!("File: {}", file),
            format!("Time: {} / {}", format_time(position), format_time(duration)),
            format!("Muted: {}", if snapshot.muted { "yes" } else { "no" }),
            format!("Mode: {}", self.store.mode().as_str()),
            format!("Queued: {}", self.store.len()),
        ])
    }

    /// Queue an action for the driver; transport commands never answer
    fn submit(&self, action: PlaybackAction) -> Option<Response> {
        if let Err(e) = self.bridge.submit(action) {
            warn!(?action, "Playback action dropped: {}", e);
        }
        None
    }

    fn queue_changed(&self) {
        self.state.broadcast_event(DaemonEvent::QueueChanged {
            len: self.store.len(),
            timestamp: Utc::now(),
        });
    }
}

fn malformed(e: &DecodeError) -> Response {
    Response::error(format!("Malformed request: {}", e))
}

/// `mm:ss`, or `--:--` when unknown
pub fn format_time(time: Option<Duration>) -> String {
    match time {
        Some(time) => {
            let secs = time.as_secs();
            format!("{:02}:{:02}", secs / 60, secs % 60)
        }
        None => "--:--".to_string(),
    }
}
