use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const INITIAL_DELAY_MS: u64 = 50;
const MAX_DELAY_MS: u64 = 500;

/// Error returned when waiting for file content times out.
#[derive(Debug)]
pub struct WaitError {
    path: PathBuf,
    attempts: u32,
    waited: Duration,
    last_content: Option<String>,
    last_error: Option<String>,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timed out after {} attempts over {:?} waiting for {}. Last content: {}. Last error: {}",
            self.attempts,
            self.waited,
            self.path.display(),
            self.last_content
                .as_deref()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or("<empty>"),
            self.last_error
                .as_deref()
                .unwrap_or("file not created or unreadable")
        )
    }
}

impl std::error::Error for WaitError {}

/// Poll a file until `predicate` accepts its content, backing off up to 500ms.
pub fn wait_for_file_content<P, F>(
    path: P,
    predicate: F,
    timeout: Duration,
) -> Result<String, WaitError>
where
    P: AsRef<Path>,
    F: Fn(&str) -> bool,
{
    let path = path.as_ref();
    let start = Instant::now();
    let mut delay = Duration::from_millis(INITIAL_DELAY_MS);
    let mut attempts = 0;
    let mut last_error = None;
    let mut last_content = None;

    loop {
        attempts += 1;
        match fs::read_to_string(path) {
            Ok(content) if predicate(&content) => return Ok(content),
            Ok(content) => last_content = Some(content),
            Err(err) if err.kind() != ErrorKind::NotFound => last_error = Some(err.to_string()),
            Err(_) => {}
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            return Err(WaitError {
                path: path.to_path_buf(),
                attempts,
                waited: start.elapsed(),
                last_content,
                last_error,
            });
        }

        thread::sleep(delay.min(remaining));
        delay = (delay * 2).min(Duration::from_millis(MAX_DELAY_MS));
    }
}

/// Wait until the JSON document at `path` satisfies `predicate`
pub fn wait_for_json<F>(
    path: &Path,
    predicate: F,
    timeout: Duration,
) -> Result<serde_json::Value, WaitError>
where
    F: Fn(&serde_json::Value) -> bool,
{
    let content = wait_for_file_content(
        path,
        |text| {
            serde_json::from_str::<serde_json::Value>(text)
                .map(|value| predicate(&value))
                .unwrap_or(false)
        },
        timeout,
    )?;
    // The predicate only passes on valid JSON
    Ok(serde_json::from_str(&content).unwrap_or(serde_json::Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn wait_for_file_content_returns_existing_content() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("value.txt");
        fs::write(&file, "ready").unwrap();

        let content =
            wait_for_file_content(&file, |text| text.contains("ready"), Duration::from_secs(1))
                .expect("should read file immediately");
        assert_eq!(content, "ready");
    }

    #[test]
    fn wait_for_file_content_times_out_with_context() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("missing.txt");

        let err = wait_for_file_content(&file, |_| true, Duration::from_millis(1))
            .expect_err("should time out");
        assert!(err.to_string().contains("missing.txt"));
    }
}
