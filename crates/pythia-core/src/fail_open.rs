//! Fail-open utilities for graceful degradation
//!
//! Side work around an action (snapshots before a rewrite, knowledge-store
//! writes, startup reconciliation) must never abort the action itself. These
//! helpers log the failure and hand back `None` instead.
//!
//! DO NOT use fail-open for:
//! - The file write that completes an action
//! - Classification reads (the event is simply ignored instead)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
///
/// # Usage
///
/// ```no_run
/// use pythia_core::fail_open::fail_open;
/// use pythia_core::Result;
///
/// async fn memorize() -> Result<()> {
///     Ok(())
/// }
///
/// async fn example() {
///     let stored = fail_open("memorize", || memorize()).await;
///     // stored is None if memorize() failed
/// }
/// ```
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Synchronous variant of [`fail_open`] for filesystem side work.
pub fn fail_open_sync<F, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Result<T>,
{
    match f() {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

/// Like fail_open but with retries
///
/// Retries the operation up to `max_retries` times. The wait before the next
/// attempt is `100ms * attempt`.
///
/// # Usage
///
/// ```no_run
/// use pythia_core::fail_open::fail_open_with_retries;
/// use pythia_core::Result;
///
/// async fn load_store() -> Result<usize> {
///     Ok(0)
/// }
///
/// async fn example() {
///     let entries = fail_open_with_retries("load_store", || load_store(), 3).await;
///     // Retries up to 3 times with 100ms, 200ms delays between attempts
/// }
/// ```
pub async fn fail_open_with_retries<F, Fut, T>(
    operation_name: &str,
    mut f: F,
    max_retries: usize,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    for attempt in 1..=max_retries {
        match f().await {
            Ok(val) => return Some(val),
            Err(e) => {
                if attempt == max_retries {
                    warn!(
                        "{} failed after {} retries (fail-open): {}",
                        operation_name, max_retries, e
                    );
                    return None;
                }
                warn!(
                    "{} failed (attempt {}/{}): {}",
                    operation_name, attempt, max_retries, e
                );
                let delay_ms = 100 * attempt as u64;
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PythiaError;

    #[tokio::test]
    async fn test_fail_open_success() {
        let result = fail_open("test_op", || async { Ok::<_, PythiaError>(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_fail_open_failure() {
        let result = fail_open("test_op", || async {
            Err::<i32, _>(PythiaError::Store("store offline".to_string()))
        })
        .await;
        assert_eq!(result, None);
    }

    #[test]
    fn test_fail_open_sync_failure() {
        let result = fail_open_sync("snapshot", || {
            Err::<(), _>(PythiaError::Backup("disk full".to_string()))
        });
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_fail_open_with_retries_success_after_retry() {
        let mut attempts = 0;
        let result = fail_open_with_retries(
            "test_op",
            || {
                attempts += 1;
                async move {
                    if attempts < 2 {
                        Err(PythiaError::Other("transient error".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
        )
        .await;
        assert_eq!(result, Some(42));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn test_fail_open_with_retries_all_failures() {
        let mut attempts = 0;
        let result = fail_open_with_retries(
            "test_op",
            || {
                attempts += 1;
                async move { Err::<i32, _>(PythiaError::Other("persistent error".to_string())) }
            },
            3,
        )
        .await;
        assert_eq!(result, None);
        assert_eq!(attempts, 3);
    }
}
