use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter for transient Mongo/Redis failures.
#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter_max: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
            jitter_max: Some(Duration::from_millis(50)),
        }
    }
}

impl RetryConfig {
    /// For writes that must land (attempt archive, level persistence).
    pub fn aggressive() -> Self {
        Self {
            max_attempts: 7,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_millis(1000),
            jitter_max: Some(Duration::from_millis(100)),
        }
    }

    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_backoff);

        match self.jitter_max {
            Some(jitter_max) if !jitter_max.is_zero() => {
                let jitter_ms = rand::rng().random_range(0..=jitter_max.as_millis() as u64);
                exp + Duration::from_millis(jitter_ms)
            }
            _ => exp,
        }
    }
}

pub async fn retry_async_with_config<F, Fut, T, E>(config: RetryConfig, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let last_attempt = config.max_attempts.saturating_sub(1);

    for attempt in 0..=last_attempt {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt == last_attempt => return Err(e),
            Err(_) => tokio::time::sleep(config.backoff_for(attempt)).await,
        }
    }

    unreachable!("retry loop always returns from its final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter_max: None,
        }
    }

    #[tokio::test]
    async fn succeeds_once_the_underlying_call_recovers() {
        let calls = AtomicU32::new(0);

        let res: Result<u32, &'static str> = retry_async_with_config(fast(3), || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err("transient")
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(res, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);

        let res: Result<(), &'static str> = retry_async_with_config(fast(2), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err("down")
        })
        .await;

        assert_eq!(res, Err("down"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn backoff_is_capped() {
        let cfg = fast(10);
        assert!(cfg.backoff_for(9) <= cfg.max_backoff);
    }
}
