//! Playback action bridge
//!
//! Cross-context "request, don't call" channel from the connection side to
//! the playback driver. Submitting an action never runs engine code on the
//! caller's task.
//!
//! **Responsibilities:**
//! - Bounded, ordered, exactly-once delivery to a single consumer
//! - Non-blocking submission (`try_send()`); a full queue is an error

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::trace;

/// Requests the playback driver executes on its own context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackAction {
    /// Begin playing the next queued item if the engine is stopped
    Start,
    Pause,
    /// Resume a paused engine, or start when stopped
    Resume,
    Stop,
    /// Move to the next item
    Skip,
    /// Move to the item before the one playing (Loop only)
    Previous,
    ToggleMute,
}

/// Submission failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Playback action queue is full")]
    Full(PlaybackAction),

    #[error("Playback driver is not running")]
    Closed(PlaybackAction),
}

/// Producer half of the bridge; cheap to clone per connection
#[derive(Debug, Clone)]
pub struct ActionBridge {
    tx: mpsc::Sender<PlaybackAction>,
}

impl ActionBridge {
    /// Create a bridge holding at most `capacity` undelivered actions
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<PlaybackAction>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue `action` for the driver without waiting
    pub fn submit(&self, action: PlaybackAction) -> Result<(), BridgeError> {
        self.tx.try_send(action).map_err(|e| match e {
            mpsc::error::TrySendError::Full(action) => BridgeError::Full(action),
            mpsc::error::TrySendError::Closed(action) => BridgeError::Closed(action),
        })?;
        trace!(?action, "Submitted playback action");
        Ok(())
    }
}
