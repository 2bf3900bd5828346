//! Playlist store
//!
//! **Responsibilities:**
//! - Ordered, 1-based addressable sequence of queued items
//! - Cursor tracking of the playing / next item in FIFO or Loop mode
//! - Single exclusion domain shared by the socket side and the playback side

mod cursor;
mod item;
mod store;

pub use cursor::Cursor;
pub use item::{is_playable, is_uri, QueueItem};
pub use store::{InsertOutcome, ListEntry, Playlist, PlaylistStore};
pub use vtm_common::config::ConsumptionMode;

use thiserror::Error;

/// Playlist domain errors.
///
/// The display text is what clients see after the `E` status marker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    #[error("Queue full.")]
    QueueFull,

    #[error("Position busy.")]
    PositionBusy,

    #[error("Invalid position.")]
    InvalidPosition,

    #[error("Invalid path: {0} (must be absolute or a URI).")]
    InvalidPath(String),

    #[error("{operation} is only available in loop mode.")]
    UnsupportedInMode { operation: &'static str },

    #[error("Empty list.")]
    EmptyList,
}
