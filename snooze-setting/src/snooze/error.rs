//! Error types for the snooze registry

use thiserror::Error;

/// Errors returned by [`SnoozeRegistry`](super::registry::SnoozeRegistry) operations.
///
/// `UnknownKey`, `InvalidValue` and `InvalidDuration` are raised before any
/// state is touched; the caller reports them and carries on.
#[derive(Error, Debug)]
pub enum SnoozeError {
    #[error("Setting \"{0}\" not found")]
    UnknownKey(String),

    #[error("Invalid JSON value: {0}")]
    InvalidValue(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Config or durable store failure, passed through untouched
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type SnoozeResult<T> = std::result::Result<T, SnoozeError>;
