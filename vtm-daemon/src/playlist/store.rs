//! Playlist data structure and its shared, mutex-guarded handle
//!
//! [`Playlist`] is plain data with the position semantics. [`PlaylistStore`]
//! wraps it in the single exclusion domain used by both the connection
//! server and the playback driver. Nothing under the lock performs I/O or
//! calls into the playback engine.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};
use uuid::Uuid;

use super::cursor::Cursor;
use super::item::{is_playable, QueueItem};
use super::{ConsumptionMode, PlaylistError};

/// One row of a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    /// 1-based position
    pub position: usize,
    pub uri: String,
    pub is_playing: bool,
}

/// Result of a successful insert
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertOutcome {
    pub id: Uuid,
    /// 1-based position the item landed on
    pub position: usize,
    /// The sequence was empty before this insert
    pub was_empty: bool,
}

/// Ordered sequence of queued items plus the playback cursor
#[derive(Debug, Clone)]
pub struct Playlist {
    items: Vec<QueueItem>,
    cursor: Cursor,
    max_len: usize,
}

impl Playlist {
    pub fn new(mode: ConsumptionMode, max_len: usize) -> Self {
        Self {
            items: Vec::new(),
            cursor: Cursor::new(mode),
            max_len,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn mode(&self) -> ConsumptionMode {
        self.cursor.mode()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// External cursor value: `-1` when empty, else the next 0-based slot
    pub fn cursor(&self) -> i64 {
        self.cursor.value(self.items.len())
    }

    /// 1-based position of the playing item, if it is still queued
    pub fn playing_position(&self) -> Option<usize> {
        self.cursor.playing().map(|i| i + 1)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Snapshot of the sequence with 1-based positions
    pub fn list(&self) -> Vec<ListEntry> {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| ListEntry {
                position: i + 1,
                uri: item.uri.clone(),
                is_playing: self.cursor.is_busy(i),
            })
            .collect()
    }

    /// Insert `uri` at 1-based `position`.
    ///
    /// `position <= 0` or beyond `len + 1` appends. Appending is never
    /// rejected as busy.
    pub fn insert(&mut self, uri: &str, position: i64) -> Result<InsertOutcome, PlaylistError> {
        if !is_playable(uri) {
            return Err(PlaylistError::InvalidPath(uri.to_string()));
        }
        if self.items.len() >= self.max_len {
            return Err(PlaylistError::QueueFull);
        }

        let len = self.items.len();
        let index = if position <= 0 || position > len as i64 + 1 {
            len
        } else {
            (position - 1) as usize
        };

        if index < len && self.cursor.is_busy(index) {
            return Err(PlaylistError::PositionBusy);
        }

        let was_empty = self.items.is_empty();
        let item = QueueItem::new(uri);
        let id = item.id;
        self.items.insert(index, item);
        self.cursor.inserted(index, self.items.len());

        debug!(%id, uri, position = index + 1, "Inserted queue item");

        Ok(InsertOutcome {
            id,
            position: index + 1,
            was_empty,
        })
    }

    /// Remove the item at 1-based `position`
    pub fn remove(&mut self, position: i64) -> Result<QueueItem, PlaylistError> {
        if position < 1 || position > self.items.len() as i64 {
            return Err(PlaylistError::InvalidPosition);
        }
        let index = (position - 1) as usize;
        if self.cursor.is_busy(index) {
            return Err(PlaylistError::PositionBusy);
        }

        let item = self.items.remove(index);
        self.cursor.removed(index, self.items.len());

        debug!(id = %item.id, uri = %item.uri, position, "Removed queue item");
        Ok(item)
    }

    /// Hand out the next item.
    ///
    /// FIFO removes and returns the head. Loop returns the item at the
    /// cursor, marks it playing and advances the cursor, wrapping.
    pub fn pop_next(&mut self) -> Option<QueueItem> {
        let index = self.cursor.next_index(self.items.len())?;
        match self.cursor.mode() {
            ConsumptionMode::Fifo => {
                let item = self.items.remove(index);
                self.cursor.removed(index, self.items.len());
                Some(item)
            }
            ConsumptionMode::Loop => {
                self.cursor.dispatched(index);
                self.items.get(index).cloned()
            }
        }
    }

    /// What `pop_next` would return, without consuming it
    pub fn peek_next(&self) -> Option<&QueueItem> {
        let index = self.cursor.next_index(self.items.len())?;
        self.items.get(index)
    }

    /// Make the item before the playing one come next (Loop only).
    ///
    /// Returns the new cursor value.
    pub fn skip_to_previous(&mut self) -> Result<i64, PlaylistError> {
        self.check_previous()?;
        self.cursor.rewind(self.items.len());
        Ok(self.cursor())
    }

    /// Whether `skip_to_previous` would be accepted right now
    pub fn check_previous(&self) -> Result<(), PlaylistError> {
        if self.cursor.mode() != ConsumptionMode::Loop {
            return Err(PlaylistError::UnsupportedInMode { operation: "Previous" });
        }
        if self.items.is_empty() {
            return Err(PlaylistError::EmptyList);
        }
        Ok(())
    }

    /// Point the playing slot back at the item with `id` (Loop only).
    ///
    /// Undoes a hand-off that was popped but never started, so the cursor
    /// again follows the item the engine is rendering. Returns false when the
    /// item is no longer queued.
    pub fn mark_playing(&mut self, id: Uuid) -> bool {
        if self.cursor.mode() != ConsumptionMode::Loop {
            return false;
        }
        match self.items.iter().position(|item| item.id == id) {
            Some(index) => {
                self.cursor.dispatched(index);
                true
            }
            None => false,
        }
    }

    /// The engine is idle; nothing queued is playing any more
    pub fn release_current(&mut self) {
        self.cursor.release(self.items.len());
    }

    /// Drop every item; returns how many were queued
    pub fn clear(&mut self) -> usize {
        let count = self.items.len();
        self.items.clear();
        self.cursor.reset();
        count
    }
}

/// Shared playlist handle: one non-reentrant mutex around [`Playlist`].
///
/// Every method takes the lock for the duration of the call only, so callers
/// can never hold it across an engine call or an await point.
#[derive(Debug)]
pub struct PlaylistStore {
    inner: Mutex<Playlist>,
}

impl PlaylistStore {
    pub fn new(mode: ConsumptionMode, max_len: usize) -> Self {
        Self {
            inner: Mutex::new(Playlist::new(mode, max_len)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Playlist> {
        self.inner.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            error!("Playlist lock was poisoned by a panicking thread; recovering");
            poisoned.into_inner()
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn mode(&self) -> ConsumptionMode {
        self.lock().mode()
    }

    pub fn cursor(&self) -> i64 {
        self.lock().cursor()
    }

    pub fn list(&self) -> Vec<ListEntry> {
        self.lock().list()
    }

    pub fn insert(&self, uri: &str, position: i64) -> Result<InsertOutcome, PlaylistError> {
        self.lock().insert(uri, position)
    }

    pub fn remove(&self, position: i64) -> Result<QueueItem, PlaylistError> {
        self.lock().remove(position)
    }

    /// Consume the next item. Called from the playback context.
    pub fn pop_next(&self) -> Option<QueueItem> {
        self.lock().pop_next()
    }

    pub fn peek_next(&self) -> Option<QueueItem> {
        self.lock().peek_next().cloned()
    }

    pub fn skip_to_previous(&self) -> Result<i64, PlaylistError> {
        self.lock().skip_to_previous()
    }

    pub fn check_previous(&self) -> Result<(), PlaylistError> {
        self.lock().check_previous()
    }

    pub fn mark_playing(&self, id: Uuid) -> bool {
        self.lock().mark_playing(id)
    }

    pub fn release_current(&self) {
        self.lock().release_current()
    }

    pub fn clear(&self) -> usize {
        self.lock().clear()
    }

    /// Copy of the whole playlist, for diagnostics and tests
    pub fn snapshot(&self) -> Playlist {
        self.lock().clone()
    }
}
