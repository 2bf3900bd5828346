//! Playback engine abstraction
//!
//! An engine renders one media item at a time and may be handed the next
//! item ahead of time for a gapless transition. It reports what happens to
//! the item through [`EngineEvent`]s on an unbounded channel that any thread
//! may feed; the playback driver is the single consumer.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::Result;

/// Notifications from an engine to the playback driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The current item is close to its end; now is the time to hand over
    /// the next one
    AboutToFinish,
    /// The current item ended
    EndOfStream,
    /// Rendering failed
    Error(String),
    /// The engine is now playing (first item or after a gapless switch)
    StateReachedPlaying,
}

pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;
pub type EngineEventReceiver = mpsc::UnboundedReceiver<EngineEvent>;

/// Create the event channel shared by an engine and the driver
pub fn event_channel() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// Operations the playback driver performs on an engine.
///
/// Only the driver calls these, from its own task.
pub trait PlaybackEngine: Send + 'static {
    /// Start rendering `uri` immediately, replacing anything current
    fn play(&mut self, uri: &str) -> Result<()>;

    /// Queue `uri` to follow the current item without a gap
    fn set_next(&mut self, uri: &str) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn set_muted(&mut self, muted: bool) -> Result<()>;

    fn is_playing(&self) -> bool;

    fn is_stopped(&self) -> bool;

    fn is_paused(&self) -> bool {
        !self.is_playing() && !self.is_stopped()
    }

    /// Elapsed time of the current item
    fn position(&self) -> Option<Duration>;

    /// Total length of the current item, if known
    fn duration(&self) -> Option<Duration>;

    fn current_uri(&self) -> Option<String>;

    /// Periodic hook, called on every status tick
    fn poll(&mut self) {}
}
