use crate::config::RetryConfig;
use std::fmt::Debug;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff shared by the Cache Gateway's `Put` and the Manager
/// Client's transport calls. `is_retriable` decides whether a given error is worth
/// retrying at all (e.g. a 404 from a manager is never retriable).
pub async fn with_retries<I, T, E, F>(
    component: &str,
    operation: &str,
    input: I,
    config: &RetryConfig,
    mut call: F,
    is_retriable: impl Fn(&E) -> bool,
) -> Result<T, E>
where
    I: Clone,
    E: Debug,
    F: FnMut(I) -> Pin<Box<dyn Future<Output = Result<T, E>> + Send>>,
{
    let mut delay = config.min_delay;
    let mut attempt = 1;
    loop {
        match call(input.clone()).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < config.max_attempts && is_retriable(&error) => {
                warn!(
                    component,
                    operation, attempt, max_attempts = config.max_attempts,
                    error = ?error,
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(
                    Duration::from_secs_f64(delay.as_secs_f64() * config.multiplier),
                    config.max_delay,
                );
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn retries_until_success_within_budget() {
        let attempts = Arc::new(AtomicU32::new(0));
        let config = RetryConfig {
            max_attempts: 5,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        };

        let result: Result<u32, &'static str> = with_retries(
            "cache",
            "put",
            (),
            &config,
            {
                let attempts = attempts.clone();
                move |_| {
                    let attempts = attempts.clone();
                    Box::pin(async move {
                        let n = attempts.fetch_add(1, Ordering::SeqCst);
                        if n < 2 {
                            Err("unavailable")
                        } else {
                            Ok(n)
                        }
                    })
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_when_error_is_not_retriable() {
        let config = RetryConfig::default();
        let result: Result<(), &'static str> =
            with_retries("cache", "put", (), &config, |_| Box::pin(async { Err("bad request") }), |_| false)
                .await;
        assert_eq!(result, Err("bad request"));
    }

    #[tokio::test]
    async fn exhausts_retry_budget_and_returns_last_error() {
        let config = RetryConfig {
            max_attempts: 3,
            min_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            multiplier: 2.0,
        };
        let attempts = Arc::new(AtomicU32::new(0));
        let result: Result<(), &'static str> = with_retries(
            "cache",
            "put",
            (),
            &config,
            {
                let attempts = attempts.clone();
                move |_| {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Box::pin(async { Err("unavailable") })
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result, Err("unavailable"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
