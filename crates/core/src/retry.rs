use std::future::Future;
use std::time::Duration;

/// `2^(attempt-1)` seconds before every attempt after the first: 0s, 2s, 4s, ...
pub fn exponential_delay(attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    Duration::from_secs(1u64 << (attempt - 1).min(32))
}

/// Runs `op` up to `max_attempts` times, sleeping `delay(attempt)` before each retry.
/// Returns the first success, or the error of the final attempt.
pub async fn retry_with_backoff<T, E, F, Fut, D>(
    max_attempts: u32,
    delay: D,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    D: Fn(u32) -> Duration,
    E: std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        if attempt > 1 {
            let backoff = delay(attempt);
            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
        }

        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts {
                    return Err(err);
                }
                tracing::warn!(attempt, max_attempts, error = %err, "attempt failed; retrying");
            }
        }
    }
}
