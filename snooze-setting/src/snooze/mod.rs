// Snooze module: registry core plus the pieces shared by the daemon and CLI

pub mod config;
pub mod error;
pub mod notify;
pub mod persistence;
pub mod protocol;
pub mod registry;
pub mod settings;

// Daemon client (Unix only for now)
#[cfg(unix)]
pub mod daemon_client;

pub use error::{SnoozeError, SnoozeResult};
pub use registry::{LoadReport, SnoozeRegistry};
