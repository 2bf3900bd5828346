//! Playback cursor
//!
//! One type covers both consumption modes:
//!
//! - **FIFO**: the head is always next and is removed when consumed, so the
//!   cursor carries no state and no queued slot is ever "playing".
//! - **Loop**: the sequence is cyclic. `playing` is the slot most recently
//!   handed to the engine; the next slot is either an explicit override (set
//!   after a rewind or a release) or the one after `playing`, wrapping.
//!
//! Every method that takes a length keeps the indices below it.

use vtm_common::config::ConsumptionMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    mode: ConsumptionMode,
    /// 0-based slot currently dispatched to the engine (Loop only)
    playing: Option<usize>,
    /// 0-based slot to dispatch next, overriding `playing + 1` (Loop only)
    next_override: Option<usize>,
}

impl Cursor {
    pub fn new(mode: ConsumptionMode) -> Self {
        Self {
            mode,
            playing: None,
            next_override: None,
        }
    }

    pub fn mode(&self) -> ConsumptionMode {
        self.mode
    }

    /// 0-based slot of the item that is currently playing
    pub fn playing(&self) -> Option<usize> {
        self.playing
    }

    /// 0-based slot `pop_next` will hand out for a sequence of `len` items
    pub fn next_index(&self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        match self.mode {
            ConsumptionMode::Fifo => Some(0),
            ConsumptionMode::Loop => {
                let next = match (self.next_override, self.playing) {
                    (Some(next), _) => next,
                    (None, Some(playing)) => playing + 1,
                    (None, None) => 0,
                };
                Some(next % len)
            }
        }
    }

    /// External cursor value: next slot, or `-1` when nothing is queued
    pub fn value(&self, len: usize) -> i64 {
        self.next_index(len).map(|i| i as i64).unwrap_or(-1)
    }

    /// Whether `index` (0-based) is the playing slot
    pub fn is_busy(&self, index: usize) -> bool {
        self.playing == Some(index)
    }

    /// Record that the item at `index` was dispatched
    pub fn dispatched(&mut self, index: usize) {
        if self.mode == ConsumptionMode::Loop {
            self.playing = Some(index);
            self.next_override = None;
        }
    }

    /// An item was inserted at `index`; `len` is the new length
    pub fn inserted(&mut self, index: usize, len: usize) {
        if let Some(playing) = self.playing {
            if index <= playing {
                self.playing = Some(playing + 1);
            }
        }
        // The overridden target keeps its turn even when something lands on
        // its slot
        if let Some(next) = self.next_override {
            if index <= next {
                self.next_override = Some(next + 1);
            }
        }
        self.clamp(len);
    }

    /// The item at `index` was removed; `len` is the new length
    pub fn removed(&mut self, index: usize, len: usize) {
        if len == 0 {
            self.reset();
            return;
        }
        if let Some(playing) = self.playing {
            if index < playing {
                self.playing = Some(playing - 1);
            }
        }
        if let Some(next) = self.next_override {
            if index < next {
                self.next_override = Some(next - 1);
            }
        }
        self.clamp(len);
    }

    /// Step back so that the item before the playing one comes next:
    /// `cursor = (cursor - 2) mod len`
    pub fn rewind(&mut self, len: usize) {
        if len == 0 {
            self.reset();
            return;
        }
        let cursor = self.next_index(len).unwrap_or(0) as i64;
        let target = (cursor - 2).rem_euclid(len as i64) as usize;
        self.next_override = Some(target);
    }

    /// The engine went idle: nothing is playing any more, but the next slot
    /// stays where it was
    pub fn release(&mut self, len: usize) {
        if self.playing.is_none() {
            return;
        }
        self.next_override = self.next_index(len);
        self.playing = None;
    }

    pub fn reset(&mut self) {
        self.playing = None;
        self.next_override = None;
    }

    fn clamp(&mut self, len: usize) {
        if len == 0 {
            self.reset();
            return;
        }
        if matches!(self.playing, Some(p) if p >= len) {
            self.playing = None;
        }
        if let Some(next) = self.next_override {
            if next >= len {
                self.next_override = Some(0);
            }
        }
    }
}
