//! Retry executor for transient source failures
//!
//! Every polling loop and re-attempt in the pipeline goes through
//! [`run_with_retry`] with a named [`RetryPolicy`] from the configuration,
//! so each wait has exactly one visible timeout/backoff definition.
//!
//! Retryability is injected per call site rather than derived from the error
//! type: the same driver error can be transient for one stage (a selection
//! against a repopulating option list) and fatal for another. The standard
//! classifier is [`retryable_by_message`], which matches the error's display
//! text against the configured vocabulary of transient source messages.
//!
//! # Example
//!
//! ```no_run
//! use afr_harvest::config::RetryPolicy;
//! use afr_harvest::retry::{retryable_by_message, run_with_retry};
//! use afr_harvest::{Error, error::DriverError};
//!
//! # async fn example() -> Result<(), Error> {
//! let policy = RetryPolicy::default();
//! let vocabulary = vec!["being updated".to_string()];
//! run_with_retry(&policy, |e| retryable_by_message(e, &vocabulary), || async {
//!     Err::<(), _>(Error::Driver(DriverError::Busy(
//!         "The report or page is being updated".to_string(),
//!     )))
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryPolicy;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Whether an error's display text matches the transient-message vocabulary
///
/// Substring match, as the source emits free-form page text rather than
/// structured codes.
pub fn retryable_by_message(error: &impl std::fmt::Display, vocabulary: &[String]) -> bool {
    let message = error.to_string();
    vocabulary.iter().any(|fragment| message.contains(fragment))
}

/// Execute an async operation under a retry policy
///
/// Makes at most `policy.max_attempts` attempts (including the first). After
/// a retryable failure on attempt `n`, waits `backoff_base * n` capped at
/// `max_delay` (jittered when the policy says so) and tries again. A
/// non-retryable error, or exhausting the attempts, surfaces the last error.
pub async fn run_with_retry<F, Fut, T, P>(
    policy: &RetryPolicy,
    is_retryable: P,
    mut operation: F,
) -> Result<T, crate::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, crate::Error>>,
    P: Fn(&crate::Error) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::info!(attempts = attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if is_retryable(&e) && attempt < policy.max_attempts => {
                let delay = backoff_delay(policy, attempt);
                tracing::warn!(
                    error = %e,
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis(),
                    "operation failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if is_retryable(&e) {
                    tracing::error!(
                        error = %e,
                        attempts = attempt,
                        "operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Delay before the retry following attempt number `attempt`
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    let delay = policy
        .backoff_base
        .saturating_mul(attempt)
        .min(policy.max_delay);
    if policy.jitter { add_jitter(delay) } else { delay }
}

/// Add random jitter between 0% and 100% of the delay
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
}
