//! Playback engine and driver

pub mod driver;
pub mod engine;
pub mod process;
pub mod simulated;

pub use driver::PlaybackDriver;
pub use engine::{event_channel, EngineEvent, EngineEventReceiver, EngineEventSender, PlaybackEngine};
pub use process::ProcessEngine;
pub use simulated::{PlayHistory, SimulatedEngine};
