// Snooze protocol - shared structs for daemon <-> CLI communication
// Uses framed JSON messages over Unix sockets

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bumped whenever a request or response shape changes
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest request line the daemon will parse
pub const MAX_REQUEST_FRAME_SIZE: usize = 1024 * 1024;

const MILLIS_PER_MINUTE: i64 = 60_000;

/// One pending override.
///
/// Persisted field names (`setting`, `originalValue`, ...) are kept stable so
/// existing state files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnoozeRecord {
    #[serde(rename = "setting")]
    pub key: String,
    pub original_value: Value,
    pub snoozed_value: Value,
    /// Milliseconds since epoch on the wire
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl SnoozeRecord {
    pub fn new(
        key: String,
        original_value: Value,
        snoozed_value: Value,
        now: DateTime<Utc>,
        duration_minutes: i64,
    ) -> Self {
        Self {
            key,
            original_value,
            snoozed_value,
            expires_at: now + Duration::milliseconds(duration_minutes * MILLIS_PER_MINUTE),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Whole minutes left, rounded up, never negative
    pub fn minutes_remaining(&self, now: DateTime<Utc>) -> i64 {
        let left_ms = (self.expires_at - now).num_milliseconds().max(0);
        (left_ms + MILLIS_PER_MINUTE - 1) / MILLIS_PER_MINUTE
    }
}

/// A row of the snooze listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnoozeEntry {
    pub key: String,
    pub snoozed_value: Value,
    pub minutes_remaining: i64,
}

// ============================================================================
// Client -> Daemon requests
// ============================================================================

/// Request message from CLI to daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonRequest {
    /// Protocol version check, sent first on every connection
    Handshake { client_version: u32 },
    /// Override a setting for a number of minutes
    Snooze {
        /// Setting key, e.g. "editor.fontSize"
        key: String,
        /// New value as JSON text, parsed by the daemon
        value: String,
        /// Duration in minutes
        minutes: i64,
    },
    /// List active snoozes
    List,
    /// Restore every snoozed setting and forget them
    Clear,
    /// Ping to check if daemon is alive
    Ping,
    /// Request daemon to shut down gracefully
    Shutdown,
}

// ============================================================================
// Daemon -> Client responses
// ============================================================================

/// Machine-readable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonErrorCode {
    UnknownKey,
    InvalidValue,
    InvalidDuration,
    InvalidRequest,
    VersionMismatch,
    Internal,
}

/// Response message from daemon to CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonResponse {
    Handshake { protocol_version: u32 },
    /// Override applied
    Snoozed { record: SnoozeRecord },
    /// Active snoozes at the time of the request
    SnoozeList { entries: Vec<SnoozeEntry> },
    /// Keys whose original values were written back
    Cleared { restored: Vec<String> },
    Pong,
    ShuttingDown,
    Error {
        code: DaemonErrorCode,
        message: String,
    },
}

// ============================================================================
// Helpers for message framing
// ============================================================================

/// Serialize a message to JSON bytes with newline delimiter
pub fn serialize_message<T: Serialize>(msg: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec(msg)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Deserialize a message from JSON bytes (strips trailing newline)
pub fn deserialize_message<T: for<'de> Deserialize<'de>>(
    bytes: &[u8],
) -> Result<T, serde_json::Error> {
    let trimmed = if bytes.last() == Some(&b'\n') {
        &bytes[..bytes.len() - 1]
    } else {
        bytes
    };
    serde_json::from_slice(trimmed)
}
