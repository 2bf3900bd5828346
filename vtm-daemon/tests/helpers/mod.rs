//! Test helper modules for vtmpegd integration tests
//!
//! - TestDaemon: run the full daemon in-process on a temporary socket
//! - Driver harness: playback driver wired to the simulated engine

pub mod test_daemon;

pub use test_daemon::{DriverHarness, TestDaemon, TestOptions};
