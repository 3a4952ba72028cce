// Snooze registry, shared between the daemon and the CLI
pub mod snooze;

// Locating the daemon binary from the CLI
pub mod cli_paths;

// Async polling helpers for daemon tests
pub mod test_utils;
