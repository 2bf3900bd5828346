//! # VTmpeg Playback Daemon Library (vtm-daemon)
//!
//! Local video-playback control daemon.
//!
//! **Purpose:** Keep a playlist of media items, accept commands over a local
//! socket, and drive a playback engine through the queue in FIFO or Loop
//! mode with gapless hand-off between items.
//!
//! **Architecture:** Connection server and playback driver run as separate
//! tasks. They share only the mutex-guarded playlist store; transport
//! requests cross over through the bounded action bridge.

pub mod bridge;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod playback;
pub mod playlist;
pub mod server;
pub mod state;

pub use error::{Error, Result};
pub use state::SharedState;
