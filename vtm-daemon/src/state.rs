//! Shared playback state
//!
//! Status snapshot written by the playback driver and read by STATUS
//! requests. Kept apart from the playlist lock so that reading it never
//! touches the engine or the playlist.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Engine-level playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    Playing,
    Paused,
    #[default]
    Stopped,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
            PlaybackState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Item currently handed to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    /// Queue entry ID
    pub entry_id: Uuid,
    pub uri: String,
    /// Elapsed time, if the engine reports it
    pub position: Option<Duration>,
    /// Total length, if known
    pub duration: Option<Duration>,
}

/// Daemon events, broadcast to any interested subscriber
#[derive(Debug, Clone, PartialEq)]
pub enum DaemonEvent {
    /// Playlist contents changed
    QueueChanged {
        len: usize,
        timestamp: DateTime<Utc>,
    },

    /// Engine state changed
    PlaybackStateChanged {
        state: PlaybackState,
        timestamp: DateTime<Utc>,
    },

    /// An item started playing
    ItemStarted {
        entry_id: Uuid,
        uri: String,
        timestamp: DateTime<Utc>,
    },
}

/// Point-in-time copy of the playback status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSnapshot {
    pub state: PlaybackState,
    pub now_playing: Option<NowPlaying>,
    pub muted: bool,
}

/// Shared state accessible by all components
///
/// Uses RwLock for concurrent read access with rare writes
pub struct SharedState {
    /// Current playback state
    pub playback_state: RwLock<PlaybackState>,

    /// Currently playing item (None when idle)
    pub now_playing: RwLock<Option<NowPlaying>>,

    /// Mute flag as last applied to the engine
    pub muted: AtomicBool,

    /// Event broadcaster
    pub event_tx: broadcast::Sender<DaemonEvent>,
}

impl SharedState {
    /// Create new shared state with default values
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            playback_state: RwLock::new(PlaybackState::Stopped),
            now_playing: RwLock::new(None),
            muted: AtomicBool::new(false),
            event_tx,
        }
    }

    /// Broadcast an event to all subscribers
    pub fn broadcast_event(&self, event: DaemonEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DaemonEvent> {
        self.event_tx.subscribe()
    }

    pub async fn get_playback_state(&self) -> PlaybackState {
        *self.playback_state.read().await
    }

    /// Set playback state, broadcasting a change event if it differs
    pub async fn set_playback_state(&self, state: PlaybackState) {
        let previous = {
            let mut current = self.playback_state.write().await;
            std::mem::replace(&mut *current, state)
        };
        if previous != state {
            self.broadcast_event(DaemonEvent::PlaybackStateChanged {
                state,
                timestamp: Utc::now(),
            });
        }
    }

    pub async fn get_now_playing(&self) -> Option<NowPlaying> {
        self.now_playing.read().await.clone()
    }

    pub async fn set_now_playing(&self, now_playing: Option<NowPlaying>) {
        *self.now_playing.write().await = now_playing;
    }

    /// Update elapsed/total time of the current item, if any
    pub async fn update_position(&self, position: Option<Duration>, duration: Option<Duration>) {
        if let Some(current) = self.now_playing.write().await.as_mut() {
            current.position = position;
            current.duration = duration;
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Relaxed);
    }

    /// Copy of the full status, for STATUS requests
    pub async fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.get_playback_state().await,
            now_playing: self.get_now_playing().await,
            muted: self.is_muted(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
