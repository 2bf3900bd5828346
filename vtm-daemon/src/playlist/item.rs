//! Queued items

use uuid::Uuid;

/// One queued media item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Entry ID, stable for the item's lifetime in the queue
    pub id: Uuid,
    /// Absolute path or URI as submitted by the client
    pub uri: String,
}

impl QueueItem {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            uri: uri.into(),
        }
    }
}

/// Whether `s` carries a URI scheme marker
pub fn is_uri(s: &str) -> bool {
    s.contains("://")
}

/// Absolute path or URI
pub fn is_playable(s: &str) -> bool {
    s.starts_with('/') || is_uri(s)
}
