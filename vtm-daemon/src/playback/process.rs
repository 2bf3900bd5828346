//! External player process engine
//!
//! Each item is rendered by one run of a configurable player command with
//! the item appended as its last argument. Pause and resume stop and
//! continue the process with `SIGSTOP`/`SIGCONT`.
//!
//! A wait task per process reports its exit: success is `EndOfStream`, a
//! failure status is `Error`. Every spawn bumps a generation counter so that
//! exits of replaced processes are ignored.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::engine::{EngineEvent, EngineEventSender, PlaybackEngine};
use crate::error::{Error, Result};

struct RunningItem {
    uri: String,
    pid: Option<u32>,
    started: Instant,
    paused_at: Option<Instant>,
    paused_total: Duration,
    /// Set by the wait task once the process is gone
    exited: Arc<AtomicBool>,
    /// Tells the wait task to kill the process
    kill_tx: Option<oneshot::Sender<()>>,
}

impl RunningItem {
    fn elapsed(&self) -> Duration {
        let now = Instant::now();
        let paused_now = self
            .paused_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        now.saturating_duration_since(self.started)
            .saturating_sub(self.paused_total + paused_now)
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::Acquire)
    }
}

/// Runs one player process per item
pub struct ProcessEngine {
    command: Vec<String>,
    events: EngineEventSender,
    generation: Arc<AtomicU64>,
    current: Option<RunningItem>,
    muted: bool,
}

impl ProcessEngine {
    /// `command` is the program followed by its fixed arguments
    pub fn new(command: Vec<String>, events: EngineEventSender) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::Config("player command is empty".to_string()));
        }
        Ok(Self {
            command,
            events,
            generation: Arc::new(AtomicU64::new(0)),
            current: None,
            muted: false,
        })
    }

    fn signal(&self, signal: Signal) -> Result<()> {
        let pid = self
            .current
            .as_ref()
            .and_then(|item| item.pid)
            .ok_or_else(|| Error::Engine("no player process".to_string()))?;
        kill(Pid::from_raw(pid as i32), signal)
            .map_err(|e| Error::Engine(format!("failed to send {} to {}: {}", signal, pid, e)))
    }

    fn kill_current(&mut self) {
        if let Some(mut item) = self.current.take() {
            // Invalidate the wait task before it can report the exit
            self.generation.fetch_add(1, Ordering::AcqRel);
            if let Some(kill_tx) = item.kill_tx.take() {
                let _ = kill_tx.send(());
            }
            debug!(uri = %item.uri, "Stopped player process");
        }
    }
}

impl PlaybackEngine for ProcessEngine {
    fn play(&mut self, uri: &str) -> Result<()> {
        self.kill_current();

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let (program, args) = match self.command.split_first() {
            Some(split) => split,
            None => return Err(Error::Engine("player command is empty".to_string())),
        };

        let mut child = Command::new(program)
            .args(args)
            .arg(uri)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Engine(format!("failed to start {}: {}", program, e)))?;

        let pid = child.id();
        info!(uri, ?pid, "Started player process");

        let exited = Arc::new(AtomicBool::new(false));
        let (kill_tx, kill_rx) = oneshot::channel();

        let events = self.events.clone();
        let current_generation = Arc::clone(&self.generation);
        let exited_flag = Arc::clone(&exited);
        let item_uri = uri.to_string();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        warn!(uri = %item_uri, "Failed to kill player process: {}", e);
                    }
                    exited_flag.store(true, Ordering::Release);
                    return;
                }
            };
            exited_flag.store(true, Ordering::Release);

            if current_generation.load(Ordering::Acquire) != generation {
                debug!(uri = %item_uri, "Ignoring exit of replaced player process");
                return;
            }

            let event = match status {
                Ok(status) if status.success() => EngineEvent::EndOfStream,
                Ok(status) => EngineEvent::Error(format!("player exited with {}", status)),
                Err(e) => EngineEvent::Error(format!("failed to wait for player: {}", e)),
            };
            let _ = events.send(event);
        });

        self.current = Some(RunningItem {
            uri: uri.to_string(),
            pid,
            started: Instant::now(),
            paused_at: None,
            paused_total: Duration::ZERO,
            exited,
            kill_tx: Some(kill_tx),
        });
        let _ = self.events.send(EngineEvent::StateReachedPlaying);
        Ok(())
    }

    fn set_next(&mut self, uri: &str) -> Result<()> {
        // One file per process; the driver starts the next item on exit
        debug!(uri, "Gapless hand-off not supported by the external player");
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        if !self.is_playing() {
            return Ok(());
        }
        self.signal(Signal::SIGSTOP)?;
        if let Some(item) = self.current.as_mut() {
            item.paused_at = Some(Instant::now());
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        if !self.is_paused() {
            return Ok(());
        }
        self.signal(Signal::SIGCONT)?;
        if let Some(item) = self.current.as_mut() {
            if let Some(at) = item.paused_at.take() {
                item.paused_total += Instant::now().saturating_duration_since(at);
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.kill_current();
        Ok(())
    }

    fn set_muted(&mut self, muted: bool) -> Result<()> {
        if muted != self.muted {
            warn!(muted, "Mute is not supported by the external player; flag recorded only");
        }
        self.muted = muted;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        self.current
            .as_ref()
            .map(|item| !item.has_exited() && item.paused_at.is_none())
            .unwrap_or(false)
    }

    fn is_stopped(&self) -> bool {
        self.current
            .as_ref()
            .map(|item| item.has_exited())
            .unwrap_or(true)
    }

    fn position(&self) -> Option<Duration> {
        self.current
            .as_ref()
            .filter(|item| !item.has_exited())
            .map(RunningItem::elapsed)
    }

    fn duration(&self) -> Option<Duration> {
        None
    }

    fn current_uri(&self) -> Option<String> {
        self.current
            .as_ref()
            .filter(|item| !item.has_exited())
            .map(|item| item.uri.clone())
    }
}

impl Drop for ProcessEngine {
    fn drop(&mut self) {
        self.kill_current();
    }
}
