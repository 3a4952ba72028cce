//! User-facing messages and notifications.
//!
//! The registry only returns data; this module turns it into text and pushes
//! that text to the terminal (CLI) or the desktop (daemon).

use std::io::{self, Write};

use chrono::{DateTime, Local};

use crate::snooze::protocol::{SnoozeEntry, SnoozeRecord};

const NOTIFICATION_TITLE: &str = "Snooze Setting";

pub const NOTHING_SNOOZED: &str = "No settings are currently snoozed";

pub fn snoozed_message(record: &SnoozeRecord, minutes: i64) -> String {
    let expiry: DateTime<Local> = record.expires_at.with_timezone(&Local);
    format!(
        "Snoozed \"{}\" for {} minutes (expires at {})",
        record.key,
        minutes,
        expiry.format("%H:%M:%S")
    )
}

pub fn applied_message(record: &SnoozeRecord) -> String {
    format!(
        "Applied snoozed setting: {} = {}",
        record.key, record.snoozed_value
    )
}

pub fn restored_message(keys: &[String]) -> String {
    format!(
        "Restored {} setting(s) that were snoozed: {}",
        keys.len(),
        keys.join(", ")
    )
}

pub fn cleared_message() -> &'static str {
    "All snoozed settings have been cleared"
}

/// Render the listing, or the empty message
pub fn list_message(entries: &[SnoozeEntry]) -> String {
    if entries.is_empty() {
        return NOTHING_SNOOZED.to_string();
    }

    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            format!(
                "• {}: {} ({} min left)",
                entry.key, entry.snoozed_value, entry.minutes_remaining
            )
        })
        .collect();
    format!("Snoozed Settings:\n{}", lines.join("\n"))
}

/// Emits terminal notification escape codes to stdout.
///
/// - BEL (`\x07`) - Universal terminal bell
/// - OSC 9 (iTerm2) - Desktop notification
/// - OSC 777 (Konsole/VTE/Gnome Terminal) - Desktop notification
pub fn emit_terminal_notifications(title: &str, message: &str) {
    let mut stdout = io::stdout();

    let _ = stdout.write_all(b"\x07");

    // Format: ESC ] 9 ; message BEL
    let osc9 = format!("\x1b]9;{}\x07", escape_osc(message));
    let _ = stdout.write_all(osc9.as_bytes());

    // Format: ESC ] 777 ; notify ; title ; message BEL
    let osc777 = format!(
        "\x1b]777;notify;{};{}\x07",
        escape_osc(title),
        escape_osc(message)
    );
    let _ = stdout.write_all(osc777.as_bytes());

    let _ = stdout.flush();
}

/// Escapes special characters for OSC sequences
fn escape_osc(s: &str) -> String {
    // OSC sequences are terminated by BEL or ST
    s.replace('\x07', "")
        .replace('\x1b', "")
        .replace('\n', " ")
        .replace('\r', "")
}

/// Shows a desktop notification from a process with no terminal.
///
/// On macOS, uses `osascript`. On Linux, uses `notify-send`.
/// Spawned detached; failures are ignored.
pub fn desktop_notify(message: &str) {
    #[cfg(target_os = "macos")]
    {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(message),
            NOTIFICATION_TITLE
        );
        let _ = std::process::Command::new("osascript")
            .arg("-e")
            .arg(script)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
    }

    #[cfg(target_os = "linux")]
    {
        let _ = std::process::Command::new("notify-send")
            .arg(NOTIFICATION_TITLE)
            .arg(message)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn();
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        let _ = message;
    }
}

#[cfg(target_os = "macos")]
fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Notify on the terminal the CLI runs in
pub fn notify_terminal(message: &str) {
    emit_terminal_notifications(NOTIFICATION_TITLE, message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn escape_osc_removes_control_chars() {
        assert_eq!(escape_osc("hello\x07world"), "helloworld");
        assert_eq!(escape_osc("test\x1b[0m"), "test[0m");
        assert_eq!(escape_osc("line1\nline2"), "line1 line2");
    }

    #[test]
    fn list_message_for_empty_listing() {
        assert_eq!(list_message(&[]), NOTHING_SNOOZED);
    }

    #[test]
    fn list_message_renders_json_values() {
        let entries = vec![
            SnoozeEntry {
                key: "editor.fontSize".to_string(),
                snoozed_value: json!(18),
                minutes_remaining: 1,
            },
            SnoozeEntry {
                key: "editor.wordWrap".to_string(),
                snoozed_value: json!("on"),
                minutes_remaining: 12,
            },
        ];

        assert_eq!(
            list_message(&entries),
            "Snoozed Settings:\n• editor.fontSize: 18 (1 min left)\n• editor.wordWrap: \"on\" (12 min left)"
        );
    }

    #[test]
    fn restored_message_counts_keys() {
        let keys = vec!["a.b".to_string(), "c.d".to_string()];
        assert_eq!(
            restored_message(&keys),
            "Restored 2 setting(s) that were snoozed: a.b, c.d"
        );
    }

    #[test]
    fn snoozed_message_names_key_and_duration() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let record = SnoozeRecord::new("editor.fontSize".to_string(), json!(14), json!(18), now, 15);

        let message = snoozed_message(&record, 15);
        assert!(message.starts_with("Snoozed \"editor.fontSize\" for 15 minutes (expires at "));
    }
}
