//! Retry delay strategies and predicates
//!
//! This module implements the backoff strategies used to space out attempts
//! and the predicates that classify faults as transient or permanent.

use crate::types::{RetrySettings, RetryStrategy};
use rand::Rng;
use std::error::Error;
use std::time::Duration;

use super::fault::Fault;

/// Calculate the delay before the next retry attempt
///
/// # Arguments
///
/// * `settings` - The retry settings containing strategy and timing parameters
/// * `attempt_index` - The index of the attempt that is about to run (0-indexed)
/// * `jitter` - Whether to apply random jitter to the delay
///
/// # Returns
///
/// The duration to wait if this attempt fails and is retried
///
/// # Example
///
/// ```rust
/// use transient_core::retry::calculate_delay;
/// use transient_core::types::{RetrySettings, RetryStrategy};
///
/// let settings = RetrySettings {
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 1000,
///     max_delay_ms: 30000,
///     ..RetrySettings::default()
/// };
///
/// assert_eq!(calculate_delay(&settings, 0, false).as_millis(), 1000);
/// assert_eq!(calculate_delay(&settings, 1, false).as_millis(), 2000);
/// ```
pub fn calculate_delay(settings: &RetrySettings, attempt_index: u32, jitter: bool) -> Duration {
    let base_delay_ms = match settings.strategy {
        RetryStrategy::None => 0,

        RetryStrategy::FixedDelay => settings.initial_delay_ms,

        RetryStrategy::ExponentialBackoff => {
            let multiplier = settings.backoff_multiplier.powf(f64::from(attempt_index));
            // Float to int casts saturate, so overflow lands on u64::MAX
            (settings.initial_delay_ms as f64 * multiplier) as u64
        }

        RetryStrategy::LinearBackoff => settings
            .initial_delay_ms
            .saturating_mul(u64::from(attempt_index) + 1),
    };

    let capped_delay_ms = base_delay_ms.min(settings.max_delay_ms);

    // Up to 25% random variation on top of the capped delay
    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        let jitter_value = rand::rng().random_range(0..=jitter_range);
        capped_delay_ms.saturating_add(jitter_value)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// A predicate that determines whether a fault is transient
///
/// The executor classifies faults with a `RetryPredicate<Fault<E>>`. Any
/// predicate over `E` can be lifted to faults with [`OperationPredicate`].
///
/// # Example
///
/// ```rust
/// use transient_core::retry::RetryPredicate;
/// use std::io::{Error, ErrorKind};
///
/// struct IoRetryPredicate;
///
/// impl RetryPredicate<Error> for IoRetryPredicate {
///     fn should_retry(&self, error: &Error) -> bool {
///         !matches!(
///             error.kind(),
///             ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::InvalidInput
///         )
///     }
/// }
/// ```
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    /// Determine whether the given error should be retried
    fn should_retry(&self, error: &E) -> bool;
}

impl<E: ?Sized, P: RetryPredicate<E> + ?Sized> RetryPredicate<E> for std::sync::Arc<P> {
    fn should_retry(&self, error: &E) -> bool {
        (**self).should_retry(error)
    }
}

impl<E: ?Sized, P: RetryPredicate<E> + ?Sized> RetryPredicate<E> for Box<P> {
    fn should_retry(&self, error: &E) -> bool {
        (**self).should_retry(error)
    }
}

/// A predicate that always returns true (all faults are transient)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}

/// A predicate that never retries (no faults are transient)
#[derive(Debug, Clone, Copy)]
pub struct NeverRetry;

impl<E: ?Sized> RetryPredicate<E> for NeverRetry {
    fn should_retry(&self, _error: &E) -> bool {
        false
    }
}

/// A predicate that uses a closure to determine retryability
pub struct ClosurePredicate<F> {
    predicate: F,
}

impl<F> ClosurePredicate<F> {
    /// Create a new closure-based predicate
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

impl<E, F> RetryPredicate<E> for ClosurePredicate<F>
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }
}

/// Lifts a predicate over operation errors to a predicate over faults
///
/// Operation faults are delegated to the wrapped predicate. Latency faults
/// get a fixed verdict, transient unless configured otherwise.
#[derive(Debug, Clone)]
pub struct OperationPredicate<P> {
    inner: P,
    latency_transient: bool,
}

impl<P> OperationPredicate<P> {
    /// Wrap a predicate over operation errors
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            latency_transient: true,
        }
    }

    /// Decide whether latency faults are transient
    pub fn latency_transient(mut self, transient: bool) -> Self {
        self.latency_transient = transient;
        self
    }
}

impl<E, P> RetryPredicate<Fault<E>> for OperationPredicate<P>
where
    P: RetryPredicate<E>,
{
    fn should_retry(&self, fault: &Fault<E>) -> bool {
        match fault {
            Fault::Operation(err) => self.inner.should_retry(err),
            Fault::LatencyExceeded { .. } => self.latency_transient,
            Fault::Exhausted(_) => false,
        }
    }
}

/// A predicate that retries only on specific error messages
#[derive(Debug, Clone)]
pub struct MessagePredicate {
    /// Patterns that indicate retryable errors
    retryable_patterns: Vec<String>,
}

impl MessagePredicate {
    /// Create a new message predicate with the given patterns
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            retryable_patterns: patterns,
        }
    }

    /// Create a predicate for common network errors
    pub fn network_errors() -> Self {
        Self::new(vec![
            "timeout".to_string(),
            "timed out".to_string(),
            "connection reset".to_string(),
            "connection refused".to_string(),
            "network unreachable".to_string(),
            "temporary failure".to_string(),
        ])
    }
}

impl<E: Error> RetryPredicate<E> for MessagePredicate {
    fn should_retry(&self, error: &E) -> bool {
        let error_msg = error.to_string().to_lowercase();
        self.retryable_patterns
            .iter()
            .any(|pattern| error_msg.contains(&pattern.to_lowercase()))
    }
}
