//! Playback driver
//!
//! The one task that owns the engine. It executes bridge actions, reacts to
//! engine events following the gapless-transition contract, and keeps the
//! shared status snapshot current.
//!
//! **Responsibilities:**
//! - Consume `PlaybackAction`s in submission order
//! - Hand the next item to the engine ahead of time (`AboutToFinish`)
//! - Go idle and release the playing slot when nothing is left
//! - Refresh `SharedState` after every action, event and status tick

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::engine::{EngineEvent, EngineEventReceiver, PlaybackEngine};
use crate::bridge::PlaybackAction;
use crate::playlist::{PlaylistStore, QueueItem};
use crate::state::{DaemonEvent, NowPlaying, PlaybackState, SharedState};

pub struct PlaybackDriver<E: PlaybackEngine> {
    engine: E,
    store: Arc<PlaylistStore>,
    state: Arc<SharedState>,
    actions: mpsc::Receiver<PlaybackAction>,
    events: EngineEventReceiver,
    status_interval: Duration,
    /// Item the engine is rendering
    current: Option<QueueItem>,
    /// Item handed to the engine as next source, not yet started
    pending: Option<QueueItem>,
    muted: bool,
}

impl<E: PlaybackEngine> PlaybackDriver<E> {
    pub fn new(
        engine: E,
        store: Arc<PlaylistStore>,
        state: Arc<SharedState>,
        actions: mpsc::Receiver<PlaybackAction>,
        events: EngineEventReceiver,
        status_interval: Duration,
    ) -> Self {
        Self {
            engine,
            store,
            state,
            actions,
            events,
            status_interval,
            current: None,
            pending: None,
            muted: false,
        }
    }

    /// Run until `shutdown` flips to true or every bridge sender is gone.
    ///
    /// The engine is stopped on the way out and returned.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> E {
        info!("Playback driver started");

        let mut tick = interval(self.status_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                action = self.actions.recv() => match action {
                    Some(action) => self.handle_action(action).await,
                    None => {
                        debug!("Action bridge closed");
                        break;
                    }
                },
                Some(event) = self.events.recv() => self.handle_event(event).await,
                _ = tick.tick() => {
                    self.engine.poll();
                    self.refresh_status().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        self.go_idle().await;
        info!("Playback driver stopped");
        self.engine
    }

    async fn handle_action(&mut self, action: PlaybackAction) {
        debug!(?action, "Handling playback action");
        match action {
            PlaybackAction::Start => {
                if self.engine.is_stopped() {
                    self.start_next().await;
                }
            }
            PlaybackAction::Resume => {
                if self.engine.is_stopped() {
                    self.start_next().await;
                } else if self.engine.is_paused() {
                    if let Err(e) = self.engine.resume() {
                        warn!("Failed to resume: {}", e);
                    }
                }
            }
            PlaybackAction::Pause => {
                if self.engine.is_playing() {
                    if let Err(e) = self.engine.pause() {
                        warn!("Failed to pause: {}", e);
                    }
                }
            }
            PlaybackAction::Stop => self.go_idle().await,
            PlaybackAction::Skip => match self.pending.take() {
                Some(item) => self.play_item(item).await,
                None => self.advance_or_idle().await,
            },
            PlaybackAction::Previous => self.previous().await,
            PlaybackAction::ToggleMute => {
                self.muted = !self.muted;
                if let Err(e) = self.engine.set_muted(self.muted) {
                    warn!("Failed to apply mute: {}", e);
                }
                self.state.set_muted(self.muted);
                info!(muted = self.muted, "Mute toggled");
            }
        }
        self.refresh_status().await;
    }

    async fn handle_event(&mut self, event: EngineEvent) {
        debug!(?event, "Engine event");
        match event {
            EngineEvent::AboutToFinish => {
                if self.pending.is_none() {
                    if let Some(item) = self.pop_next() {
                        match self.engine.set_next(&item.uri) {
                            Ok(()) => {
                                debug!(uri = %item.uri, "Next item handed to engine");
                                self.pending = Some(item);
                            }
                            Err(e) => warn!(uri = %item.uri, "Failed to queue next item: {}", e),
                        }
                    }
                }
            }
            EngineEvent::EndOfStream => match self.pending.take() {
                Some(item) if self.engine.is_stopped() => self.play_item(item).await,
                // The engine switches to it on its own
                Some(item) => self.pending = Some(item),
                None => self.advance_or_idle().await,
            },
            EngineEvent::StateReachedPlaying => {
                if let Some(item) = self.pending.take() {
                    self.mark_started(item).await;
                }
            }
            EngineEvent::Error(message) => {
                error!("Playback error: {}", message);
                self.go_idle().await;
            }
        }
        self.refresh_status().await;
    }

    fn pop_next(&self) -> Option<QueueItem> {
        let item = self.store.pop_next();
        if item.is_some() {
            self.state.broadcast_event(DaemonEvent::QueueChanged {
                len: self.store.len(),
                timestamp: Utc::now(),
            });
        }
        item
    }

    /// Play the next queued item; nothing happens when the queue is empty
    async fn start_next(&mut self) {
        if let Some(item) = self.pop_next() {
            self.play_item(item).await;
        }
    }

    async fn advance_or_idle(&mut self) {
        match self.pop_next() {
            Some(item) => self.play_item(item).await,
            None => {
                info!("Nothing left to play");
                self.go_idle().await;
            }
        }
    }

    /// Rewind relative to the item being rendered, not to a handed-off one
    async fn previous(&mut self) {
        if let Some(item) = self.pending.take() {
            debug!(uri = %item.uri, "Dropping pending hand-off");
            if let Some(current) = &self.current {
                if !self.store.mark_playing(current.id) {
                    debug!(uri = %current.uri, "Playing item left the queue");
                }
            }
        }
        match self.store.skip_to_previous() {
            Ok(cursor) => {
                debug!(cursor, "Rewound cursor");
                self.advance_or_idle().await;
            }
            Err(e) => warn!("Previous rejected: {}", e),
        }
    }

    async fn play_item(&mut self, item: QueueItem) {
        self.pending = None;
        match self.engine.play(&item.uri) {
            Ok(()) => self.mark_started(item).await,
            Err(e) => {
                error!(uri = %item.uri, "Failed to start playback: {}", e);
                self.go_idle().await;
            }
        }
    }

    async fn mark_started(&mut self, item: QueueItem) {
        info!(uri = %item.uri, "Now playing");
        self.state
            .set_now_playing(Some(NowPlaying {
                entry_id: item.id,
                uri: item.uri.clone(),
                position: None,
                duration: None,
            }))
            .await;
        self.state.broadcast_event(DaemonEvent::ItemStarted {
            entry_id: item.id,
            uri: item.uri.clone(),
            timestamp: Utc::now(),
        });
        self.current = Some(item);
    }

    async fn go_idle(&mut self) {
        if let Err(e) = self.engine.stop() {
            warn!("Failed to stop engine: {}", e);
        }
        self.pending = None;
        if let Some(item) = self.current.take() {
            debug!(uri = %item.uri, "Playback idle");
        }
        self.store.release_current();
        self.state.set_now_playing(None).await;
        self.state.set_playback_state(PlaybackState::Stopped).await;
    }

    async fn refresh_status(&mut self) {
        let playback_state = if self.engine.is_stopped() {
            PlaybackState::Stopped
        } else if self.engine.is_playing() {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        };
        self.state.set_playback_state(playback_state).await;
        self.state
            .update_position(self.engine.position(), self.engine.duration())
            .await;
    }
}
