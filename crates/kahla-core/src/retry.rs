//! Retry configuration, backoff calculation and the async retry driver.
//!
//! - [`RetryConfig`]: serializable retry parameters (attempts, backoff, jitter)
//! - [`Backoff`]: delay schedule between attempts
//! - [`RetryPolicy`]: attempts + backoff + injected failure callback
//! - [`retry`]: run a fallible async operation under a policy
//!
//! Policies compose by nesting: an operation passed to [`retry`] may itself
//! call [`retry`] with a different policy, giving each failure domain its own
//! budget (for example login, push-channel setup and socket connect).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::warn;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Default maximum attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
/// Default base delay in milliseconds.
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
/// Default maximum delay in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 60_000;
/// Default jitter factor (0.0–1.0).
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Serializable retry parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    /// Maximum number of attempts, first one included. `0` retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for exponential backoff in ms. `0` disables waiting.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay between attempts in ms.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter factor 0.0–1.0.
    #[serde(default = "default_jitter_factor")]
    pub jitter_factor: f64,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}
fn default_base_delay_ms() -> u64 {
    DEFAULT_BASE_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_jitter_factor() -> f64 {
    DEFAULT_JITTER_FACTOR
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Same parameters with an unbounded attempt count.
    #[must_use]
    pub fn unbounded(mut self) -> Self {
        self.max_attempts = 0;
        self
    }

    /// Backoff schedule described by this config.
    pub fn backoff(&self) -> Backoff {
        if self.base_delay_ms == 0 {
            Backoff::None
        } else {
            Backoff::Exponential {
                base_delay_ms: self.base_delay_ms,
                max_delay_ms: self.max_delay_ms,
                jitter_factor: self.jitter_factor,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backoff calculation
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate backoff delay with explicit randomness.
///
/// `random` should be a value in `[0.0, 1.0)`; it maps to a multiplier in
/// `[1 - jitter, 1 + jitter]`.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_backoff_delay_with_random(
    attempt: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(31));
    let capped = exponential.min(max_delay_ms);

    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    let with_jitter = (capped as f64) * jitter;

    with_jitter.round().max(0.0) as u64
}

/// Delay schedule between attempts.
#[derive(Clone, Debug, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Wait the same amount after every failure.
    Fixed(Duration),
    /// Exponential growth with random jitter.
    Exponential {
        /// Delay after the first failure, before jitter.
        base_delay_ms: u64,
        /// Cap before jitter.
        max_delay_ms: u64,
        /// Jitter factor 0.0–1.0.
        jitter_factor: f64,
    },
}

impl Backoff {
    /// Delay to wait after the `failed_attempt`-th failure (1-based).
    pub fn delay(&self, failed_attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => *delay,
            Self::Exponential {
                base_delay_ms,
                max_delay_ms,
                jitter_factor,
            } => Duration::from_millis(calculate_backoff_delay_with_random(
                failed_attempt.saturating_sub(1),
                *base_delay_ms,
                *max_delay_ms,
                *jitter_factor,
                rand::random::<f64>(),
            )),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Policy
// ─────────────────────────────────────────────────────────────────────────────

/// One failed attempt, as reported to the failure callback.
#[derive(Debug)]
pub struct AttemptFailure<'a, E> {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Configured maximum, `0` for unbounded.
    pub max_attempts: u32,
    /// The error the attempt returned.
    pub error: &'a E,
    /// Delay before the next attempt, `None` when the driver gives up.
    pub next_delay: Option<Duration>,
}

impl<E> AttemptFailure<'_, E> {
    /// Whether the driver stops after this failure.
    pub fn is_final(&self) -> bool {
        self.next_delay.is_none()
    }
}

type FailureCallback<E> = Box<dyn Fn(&AttemptFailure<'_, E>) + Send + Sync>;
type RetryPredicate<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

/// Attempt budget, backoff schedule and injected callbacks for [`retry`].
pub struct RetryPolicy<E> {
    max_attempts: u32,
    backoff: Backoff,
    on_failure: FailureCallback<E>,
    retry_if: RetryPredicate<E>,
    cancel: Option<CancellationToken>,
}

impl<E: 'static> RetryPolicy<E> {
    /// A silent policy with `max_attempts` (`0` = unbounded) and no backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::None,
            on_failure: Box::new(|_| {}),
            retry_if: Box::new(|_| true),
            cancel: None,
        }
    }

    /// A policy that retries forever.
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Set the delay schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Set the per-attempt failure callback.
    #[must_use]
    pub fn on_failure(
        mut self,
        callback: impl Fn(&AttemptFailure<'_, E>) + Send + Sync + 'static,
    ) -> Self {
        self.on_failure = Box::new(callback);
        self
    }

    /// Only retry errors for which `predicate` returns `true`.
    #[must_use]
    pub fn retry_if(mut self, predicate: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.retry_if = Box::new(predicate);
        self
    }

    /// Stop waiting and give up when `token` is cancelled.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl<E> RetryPolicy<E> {
    /// Configured maximum, `0` for unbounded.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    fn exhausted(&self, attempt: u32) -> bool {
        self.max_attempts != 0 && attempt >= self.max_attempts
    }
}

impl<E: Display + 'static> RetryPolicy<E> {
    /// Build a policy from [`RetryConfig`] that logs every failure under `operation`.
    pub fn from_config(operation: &'static str, config: &RetryConfig) -> Self {
        Self::new(config.max_attempts)
            .with_backoff(config.backoff())
            .on_failure(move |failure| log_failure(operation, failure))
    }
}

fn log_failure<E: Display>(operation: &str, failure: &AttemptFailure<'_, E>) {
    match failure.next_delay {
        Some(delay) => warn!(
            operation,
            attempt = failure.attempt,
            max_attempts = failure.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %failure.error,
            "{operation} failed, retrying"
        ),
        None => warn!(
            operation,
            attempt = failure.attempt,
            max_attempts = failure.max_attempts,
            error = %failure.error,
            "{operation} failed, giving up"
        ),
    }
}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Driver
// ─────────────────────────────────────────────────────────────────────────────

/// Run `operation` until it succeeds or `policy` gives up.
///
/// Returns the first `Ok`, or the error of the last attempt once the budget
/// is spent, the predicate rejects an error, or the policy's cancellation
/// token fires during a backoff wait.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy<E>, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let give_up = policy.exhausted(attempt)
            || !(policy.retry_if)(&error)
            || policy.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
        let next_delay = (!give_up).then(|| policy.backoff.delay(attempt));

        (policy.on_failure)(&AttemptFailure {
            attempt,
            max_attempts: policy.max_attempts,
            error: &error,
            next_delay,
        });

        let Some(delay) = next_delay else {
            return Err(error);
        };
        if delay.is_zero() {
            continue;
        }
        match &policy.cancel {
            Some(token) => {
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = token.cancelled() => return Err(error),
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
