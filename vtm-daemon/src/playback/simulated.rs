//! Clock-driven simulated engine
//!
//! Every item "plays" for a fixed duration. Inside the about-to-finish
//! window before the end it emits `AboutToFinish`; at the end it either
//! switches to the handed-off next item (gapless) or emits `EndOfStream`.
//! Time is `tokio::time`, so tests can drive it with a paused clock.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use super::engine::{EngineEvent, EngineEventSender, PlaybackEngine};
use crate::error::Result;

#[derive(Debug)]
struct SimulatedItem {
    uri: String,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
    warned: bool,
}

impl SimulatedItem {
    fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
            warned: false,
        }
    }

    fn elapsed(&self) -> Duration {
        let now = self.paused_at.unwrap_or_else(Instant::now);
        now.saturating_duration_since(self.started)
            .saturating_sub(self.paused_total)
    }
}

/// Shared list of every URI the engine started, in order
pub type PlayHistory = Arc<Mutex<Vec<String>>>;

pub struct SimulatedEngine {
    item_duration: Duration,
    about_to_finish: Duration,
    events: EngineEventSender,
    current: Option<SimulatedItem>,
    next: Option<String>,
    muted: bool,
    history: PlayHistory,
}

impl SimulatedEngine {
    pub fn new(item_duration: Duration, about_to_finish: Duration, events: EngineEventSender) -> Self {
        Self {
            item_duration,
            about_to_finish: about_to_finish.min(item_duration),
            events,
            current: None,
            next: None,
            muted: false,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle on the started-URI history; stays valid after the engine moves
    pub fn history(&self) -> PlayHistory {
        Arc::clone(&self.history)
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    fn start(&mut self, uri: &str) {
        debug!(uri, "Simulated playback started");
        self.current = Some(SimulatedItem::new(uri));
        match self.history.lock() {
            Ok(mut history) => history.push(uri.to_string()),
            Err(poisoned) => poisoned.into_inner().push(uri.to_string()),
        }
        let _ = self.events.send(EngineEvent::StateReachedPlaying);
    }
}

impl PlaybackEngine for SimulatedEngine {
    fn play(&mut self, uri: &str) -> Result<()> {
        self.next = None;
        self.start(uri);
        Ok(())
    }

    fn set_next(&mut self, uri: &str) -> Result<()> {
        self.next = Some(uri.to_string());
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if let Some(item) = self.current.as_mut() {
            if item.paused_at.is_none() {
                item.paused_at = Some(Instant::now());
            }
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if let Some(item) = self.current.as_mut() {
            if let Some(at) = item.paused_at.take() {
                item.paused_total += Instant::now().saturating_duration_since(at);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.current = None;
        self.next = None;
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> Result<()> {
        self.muted = muted;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        matches!(&self.current, Some(item) if item.paused_at.is_none())
    }

    fn is_stopped(&self) -> bool {
        self.current.is_none()
    }

    fn position(&self) -> Option<Duration> {
        self.current
            .as_ref()
            .map(|item| item.elapsed().min(self.item_duration))
    }

    fn duration(&self) -> Option<Duration> {
        self.current.as_ref().map(|_| self.item_duration)
    }

    fn current_uri(&self) -> Option<String> {
        self.current.as_ref().map(|item| item.uri.clone())
    }

    fn poll(&mut self) {
        let elapsed = match self.current.as_mut() {
            Some(item) if item.paused_at.is_none() => {
                let elapsed = item.elapsed();
                if !item.warned && elapsed + self.about_to_finish >= self.item_duration {
                    item.warned = true;
                    let _ = self.events.send(EngineEvent::AboutToFinish);
                }
                elapsed
            }
            _ => return,
        };

        if elapsed < self.item_duration {
            return;
        }

        match self.next.take() {
            Some(next) => self.start(&next),
            None => {
                debug!("Simulated playback reached end of stream");
                self.current = None;
                let _ = self.events.send(EngineEvent::EndOfStream);
            }
        }
    }
}
