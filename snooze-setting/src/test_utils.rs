//! Polling assertions for timer-driven daemon tests
//!
//! The sweep runs on an interval, so tests wait for its effects with a
//! deadline instead of sleeping for a guessed amount of time.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry `f` every `interval` until it returns `Ok`, panicking after `timeout`.
///
/// ```rust,ignore
/// use snooze_setting_lib::test_utils::assert_eventually;
///
/// assert_eventually(
///     "snooze to expire",
///     Duration::from_secs(3),
///     Duration::from_millis(50),
///     || async {
///         let registry = state.registry.lock().await;
///         match registry.get("editor.fontSize") {
///             None => Ok(()),
///             Some(record) => Err(format!("still snoozed until {}", record.expires_at)),
///         }
///     },
/// )
/// .await;
/// ```
pub async fn assert_eventually<F, Fut, T, E>(
    desc: &str,
    timeout: Duration,
    interval: Duration,
    mut f: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let last_error = match f().await {
            Ok(value) => return value,
            Err(e) => e.to_string(),
        };

        if start.elapsed() >= timeout {
            panic!(
                "Timeout waiting for {}\n\
                 Duration: {:?}\n\
                 Attempts: {}\n\
                 Last error: {}",
                desc,
                start.elapsed(),
                attempts,
                last_error
            );
        }

        tokio::time::sleep(interval).await;
    }
}

/// [`assert_eventually`] for a plain boolean condition
pub async fn assert_eventually_bool<F, Fut>(desc: &str, timeout: Duration, interval: Duration, mut f: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    assert_eventually(desc, timeout, interval, || {
        let fut = f();
        async move {
            if fut.await {
                Ok(())
            } else {
                Err("condition never became true")
            }
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_assert_eventually_succeeds_after_retries() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);

        let result = assert_eventually(
            "counter to reach 3",
            Duration::from_secs(2),
            Duration::from_millis(20),
            move || {
                let c = Arc::clone(&counter_clone);
                async move {
                    let val = c.fetch_add(1, Ordering::SeqCst);
                    if val >= 2 {
                        Ok(val)
                    } else {
                        Err(format!("counter only at {}", val))
                    }
                }
            },
        )
        .await;

        assert!(result >= 2);
    }

    #[tokio::test]
    #[should_panic(expected = "Timeout waiting for never true")]
    async fn test_assert_eventually_bool_times_out() {
        assert_eventually_bool(
            "never true",
            Duration::from_millis(100),
            Duration::from_millis(20),
            || async { false },
        )
        .await;
    }
}
