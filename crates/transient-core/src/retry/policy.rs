//! Retry policy definition
//!
//! A [`RetryPolicy`] bundles everything the executor needs to decide when
//! to retry: the retry budget, the backoff function, the fault classifier
//! and the latency ceiling. Policies are immutable once built and cheap to
//! clone.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::fault::Fault;
use super::strategies::{AlwaysRetry, ClosurePredicate, RetryPredicate};

/// Backoff function mapping an attempt index to the wait before the next attempt
pub type RetryStrategyFn = dyn Fn(u32) -> Duration + Send + Sync;

/// Immutable retry configuration for operations failing with `E`
///
/// The default policy disables recovery: one attempt, failure propagated
/// unmodified.
pub struct RetryPolicy<E> {
    max_attempts: u32,
    retry_strategy: Arc<RetryStrategyFn>,
    detection_strategy: Arc<dyn RetryPredicate<Fault<E>>>,
    maximum_allowed_latency: Duration,
    recovery_enabled: bool,
}

impl<E> RetryPolicy<E> {
    /// Start building a policy
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Policy that retries every fault up to `max_attempts` times without waiting
    pub fn retrying(max_attempts: u32) -> Self {
        Self::builder()
            .recovery_enabled(true)
            .max_attempts(max_attempts)
            .build()
    }

    /// Retries permitted after the first attempt
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether failed attempts are retried at all
    pub fn recovery_enabled(&self) -> bool {
        self.recovery_enabled
    }

    /// Ceiling on execution time, excluding backoff waits
    pub fn maximum_allowed_latency(&self) -> Duration {
        self.maximum_allowed_latency
    }

    /// Wait before the attempt following `attempt_index`
    pub fn wait_for(&self, attempt_index: u32) -> Duration {
        (self.retry_strategy)(attempt_index)
    }

    /// Classify a fault
    pub fn is_transient(&self, fault: &Fault<E>) -> bool {
        self.detection_strategy.should_retry(fault)
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        RetryPolicyBuilder::new().build()
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            retry_strategy: Arc::clone(&self.retry_strategy),
            detection_strategy: Arc::clone(&self.detection_strategy),
            maximum_allowed_latency: self.maximum_allowed_latency,
            recovery_enabled: self.recovery_enabled,
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("maximum_allowed_latency", &self.maximum_allowed_latency)
            .field("recovery_enabled", &self.recovery_enabled)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryPolicy`]
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use transient_core::retry::{Fault, RetryPolicy};
///
/// let policy: RetryPolicy<std::io::Error> = RetryPolicy::builder()
///     .recovery_enabled(true)
///     .max_attempts(3)
///     .retry_strategy(|attempt| Duration::from_millis(100 * 2u64.pow(attempt)))
///     .detect(|fault: &Fault<std::io::Error>| {
///         fault
///             .operation_error()
///             .is_some_and(|e| e.kind() == std::io::ErrorKind::TimedOut)
///     })
///     .build();
///
/// assert_eq!(policy.wait_for(2), Duration::from_millis(400));
/// ```
pub struct RetryPolicyBuilder<E> {
    max_attempts: u32,
    retry_strategy: Arc<RetryStrategyFn>,
    detection_strategy: Arc<dyn RetryPredicate<Fault<E>>>,
    maximum_allowed_latency: Duration,
    recovery_enabled: bool,
}

impl<E> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryPolicyBuilder<E> {
    /// Create a builder with recovery disabled and no backoff
    pub fn new() -> Self {
        Self {
            max_attempts: 0,
            retry_strategy: Arc::new(|_: u32| Duration::ZERO),
            detection_strategy: Arc::new(AlwaysRetry),
            maximum_allowed_latency: Duration::MAX,
            recovery_enabled: false,
        }
    }

    /// Enable or disable recovery
    pub fn recovery_enabled(mut self, enabled: bool) -> Self {
        self.recovery_enabled = enabled;
        self
    }

    /// Set the number of retries permitted after the first attempt
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the backoff function
    pub fn retry_strategy<F>(mut self, strategy: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        self.retry_strategy = Arc::new(strategy);
        self
    }

    /// Set a shared backoff function
    pub fn retry_strategy_arc(mut self, strategy: Arc<RetryStrategyFn>) -> Self {
        self.retry_strategy = strategy;
        self
    }

    /// Set the fault classifier
    pub fn detection_strategy<P>(mut self, predicate: P) -> Self
    where
        P: RetryPredicate<Fault<E>> + 'static,
    {
        self.detection_strategy = Arc::new(predicate);
        self
    }

    /// Set the fault classifier from a closure
    pub fn detect<F>(self, predicate: F) -> Self
    where
        F: Fn(&Fault<E>) -> bool + Send + Sync + 'static,
    {
        self.detection_strategy(ClosurePredicate::new(predicate))
    }

    /// Set the latency ceiling
    pub fn maximum_allowed_latency(mut self, latency: Duration) -> Self {
        self.maximum_allowed_latency = latency;
        self
    }

    /// Build the policy
    pub fn build(self) -> RetryPolicy<E> {
        RetryPolicy {
            max_attempts: self.max_attempts,
            retry_strategy: self.retry_strategy,
            detection_strategy: self.detection_strategy,
            maximum_allowed_latency: self.maximum_allowed_latency,
            recovery_enabled: self.recovery_enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::strategies::NeverRetry;
    use std::io;

    #[test]
    fn test_default_policy_disables_recovery() {
        let policy: RetryPolicy<io::Error> = RetryPolicy::default();

        assert!(!policy.recovery_enabled());
        assert_eq!(policy.max_attempts(), 0);
        assert_eq!(policy.maximum_allowed_latency(), Duration::MAX);
        assert_eq!(policy.wait_for(0), Duration::ZERO);
        assert!(policy.is_transient(&Fault::Operation(io::Error::other("x"))));
    }

    #[test]
    fn test_retrying_shortcut() {
        let policy: RetryPolicy<io::Error> = RetryPolicy::retrying(4);

        assert!(policy.recovery_enabled());
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.wait_for(3), Duration::ZERO);
    }

    #[test]
    fn test_builder_sets_every_field() {
        let policy: RetryPolicy<io::Error> = RetryPolicy::builder()
            .recovery_enabled(true)
            .max_attempts(2)
            .retry_strategy(|attempt| Duration::from_millis(10 * u64::from(attempt + 1)))
            .detection_strategy(NeverRetry)
            .maximum_allowed_latency(Duration::from_secs(1))
            .build();

        assert!(policy.recovery_enabled());
        assert_eq!(policy.max_attempts(), 2);
        assert_eq!(policy.wait_for(0), Duration::from_millis(10));
        assert_eq!(policy.wait_for(1), Duration::from_millis(20));
        assert_eq!(policy.maximum_allowed_latency(), Duration::from_secs(1));
        assert!(!policy.is_transient(&Fault::Operation(io::Error::other("x"))));
    }

    #[test]
    fn test_clone_shares_strategies() {
        let policy: RetryPolicy<io::Error> = RetryPolicy::builder()
            .retry_strategy(|_| Duration::from_millis(7))
            .detect(|fault: &Fault<io::Error>| fault.is_latency_exceeded())
            .build();
        let cloned = policy.clone();

        assert_eq!(cloned.wait_for(5), Duration::from_millis(7));
        assert!(cloned.is_transient(&Fault::LatencyExceeded {
            latency: Duration::from_millis(2),
            maximum: Duration::from_millis(1),
        }));
        assert!(!cloned.is_transient(&Fault::Operation(io::Error::other("x"))));
    }

    #[test]
    fn test_debug_omits_closures() {
        let policy: RetryPolicy<io::Error> = RetryPolicy::retrying(1);
        let debug = format!("{:?}", policy);
        assert!(debug.contains("max_attempts: 1"));
        assert!(debug.contains(".."));
    }
}
