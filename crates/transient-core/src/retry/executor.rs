//! Retry execution engine
//!
//! This module provides the core retry execution logic. One state machine
//! ([`RetryAttemptState`]) drives both entry points: [`RetryExecutor::execute`]
//! suspends on `tokio::time::sleep` between attempts, while
//! [`RetryExecutor::execute_blocking`] parks the calling thread.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use super::error::RetryError;
use super::fault::Fault;
use super::observer::{fault_observer, FaultObserver, RetryObserver, TracingObserver};
use super::policy::RetryPolicy;
use super::state::{Abandonment, RetryAttemptState, Step};

/// Run a blocking operation under a retry policy
///
/// `None` applies the default policy, which disables recovery.
///
/// # Example
///
/// ```rust
/// use transient_core::retry::{execute_with_retry, RetryPolicy};
///
/// let mut calls = 0;
/// let result = execute_with_retry(
///     || {
///         calls += 1;
///         if calls < 2 { Err("not yet") } else { Ok(calls) }
///     },
///     Some(&RetryPolicy::retrying(3)),
/// );
///
/// assert_eq!(result.unwrap(), 2);
/// ```
pub fn execute_with_retry<F, T, E>(op: F, policy: Option<&RetryPolicy<E>>) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    RetryExecutor::new(policy.cloned().unwrap_or_default()).execute_blocking(op)
}

/// Run a blocking operation without a result under a retry policy
pub fn execute_action_with_retry<F, E>(op: F, policy: Option<&RetryPolicy<E>>) -> Result<(), RetryError<E>>
where
    F: FnMut() -> Result<(), E>,
    E: Display,
{
    RetryExecutor::new(policy.cloned().unwrap_or_default()).execute_action_blocking(op)
}

/// Run an async operation under a retry policy
///
/// `None` applies the default policy, which disables recovery.
///
/// # Example
///
/// ```rust,no_run
/// use transient_core::retry::{execute_with_retry_async, RetryError, RetryPolicy};
///
/// async fn example() -> Result<String, RetryError<std::io::Error>> {
///     let policy = RetryPolicy::retrying(3);
///
///     execute_with_retry_async(|| async {
///         Ok("success".to_string())
///     }, Some(&policy)).await
/// }
/// ```
pub async fn execute_with_retry_async<F, Fut, T, E>(
    op: F,
    policy: Option<&RetryPolicy<E>>,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    RetryExecutor::new(policy.cloned().unwrap_or_default())
        .execute(op)
        .await
}

/// Run an async operation without a result under a retry policy
pub async fn execute_action_with_retry_async<F, Fut, E>(
    op: F,
    policy: Option<&RetryPolicy<E>>,
) -> Result<(), RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: Display,
{
    RetryExecutor::new(policy.cloned().unwrap_or_default())
        .execute_action(op)
        .await
}

/// Where an executor sends evidence of exhausted retry sequences
#[derive(Clone, Default)]
enum FaultObserverSource {
    /// The process-wide slot, read at abandonment time
    #[default]
    Global,
    Injected(Arc<dyn FaultObserver>),
    Disabled,
}

impl FaultObserverSource {
    fn resolve(&self) -> Option<Arc<dyn FaultObserver>> {
        match self {
            FaultObserverSource::Global => fault_observer(),
            FaultObserverSource::Injected(observer) => Some(Arc::clone(observer)),
            FaultObserverSource::Disabled => None,
        }
    }
}

/// A retry executor with a policy, an attempt observer and a fault observer
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use transient_core::retry::{EvidenceLog, RetryExecutor, RetryPolicy};
///
/// let log = Arc::new(EvidenceLog::new());
/// let executor = RetryExecutor::named("download", RetryPolicy::retrying(2))
///     .with_fault_observer(log.clone());
///
/// let result: Result<(), _> = executor.execute_blocking(|| Err("offline"));
///
/// assert!(result.is_err());
/// assert_eq!(log.len(), 1);
/// ```
pub struct RetryExecutor<E, O = TracingObserver> {
    policy: RetryPolicy<E>,
    observer: O,
    fault_observer: FaultObserverSource,
    operation: Option<String>,
}

impl<E> RetryExecutor<E, TracingObserver> {
    /// Create an executor that logs through `tracing`
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self {
            policy,
            observer: TracingObserver::default(),
            fault_observer: FaultObserverSource::Global,
            operation: None,
        }
    }

    /// Create an executor for a named operation
    ///
    /// The name shows up in log fields and in fault evidence.
    pub fn named(operation: impl Into<String>, policy: RetryPolicy<E>) -> Self {
        let operation = operation.into();
        Self {
            policy,
            observer: TracingObserver::new(operation.clone()),
            fault_observer: FaultObserverSource::Global,
            operation: Some(operation),
        }
    }
}

impl<E, O> RetryExecutor<E, O> {
    /// Set the attempt observer
    pub fn with_observer<O2>(self, observer: O2) -> RetryExecutor<E, O2> {
        RetryExecutor {
            policy: self.policy,
            observer,
            fault_observer: self.fault_observer,
            operation: self.operation,
        }
    }

    /// Notify this observer instead of the process-wide one
    pub fn with_fault_observer(mut self, observer: Arc<dyn FaultObserver>) -> Self {
        self.fault_observer = FaultObserverSource::Injected(observer);
        self
    }

    /// Never notify a fault observer, not even the process-wide one
    pub fn without_fault_observer(mut self) -> Self {
        self.fault_observer = FaultObserverSource::Disabled;
        self
    }

    /// Set the operation descriptor used in fault evidence
    pub fn with_operation_name(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// The policy this executor applies
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    fn describe<F>(&self) -> String {
        self.operation
            .clone()
            .unwrap_or_else(|| std::any::type_name::<F>().to_string())
    }
}

impl<E, O> RetryExecutor<E, O>
where
    E: Display,
    O: RetryObserver,
{
    /// Execute an async operation with retry logic
    ///
    /// # Arguments
    ///
    /// * `op` - A closure that returns a future representing one attempt
    ///
    /// # Returns
    ///
    /// The result of the operation, or a `RetryError` if it did not succeed.
    pub async fn execute<F, Fut, T>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.policy.recovery_enabled() {
            return op().await.map_err(RetryError::operation);
        }

        let operation = self.describe::<F>();
        let mut state = RetryAttemptState::new();

        loop {
            self.observer
                .on_attempt_start(state.attempt_index(), self.policy.max_attempts());

            let outcome = match state.latency_fault(&self.policy) {
                Some(fault) => Err(fault),
                None => op().await.map_err(Fault::Operation),
            };

            let fault = match outcome {
                Ok(value) => {
                    self.observer
                        .on_success(state.attempt_index(), state.elapsed());
                    return Ok(value);
                }
                Err(fault) => fault,
            };

            match self.handle_failure(&mut state, fault, &operation) {
                Step::Retry(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    state.resume();
                }
                Step::Abandon(abandonment) => return Err(self.finish(abandonment)),
            }
        }
    }

    /// Execute an async operation that produces no value
    pub async fn execute_action<F, Fut>(&self, op: F) -> Result<(), RetryError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        self.execute(op).await
    }

    /// Execute a blocking operation with retry logic
    ///
    /// Backoff waits park the calling thread.
    pub fn execute_blocking<F, T>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
    {
        if !self.policy.recovery_enabled() {
            return op().map_err(RetryError::operation);
        }

        let operation = self.describe::<F>();
        let mut state = RetryAttemptState::new();

        loop {
            self.observer
                .on_attempt_start(state.attempt_index(), self.policy.max_attempts());

            let outcome = match state.latency_fault(&self.policy) {
                Some(fault) => Err(fault),
                None => op().map_err(Fault::Operation),
            };

            let fault = match outcome {
                Ok(value) => {
                    self.observer
                        .on_success(state.attempt_index(), state.elapsed());
                    return Ok(value);
                }
                Err(fault) => fault,
            };

            match self.handle_failure(&mut state, fault, &operation) {
                Step::Retry(delay) => {
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    state.resume();
                }
                Step::Abandon(abandonment) => return Err(self.finish(abandonment)),
            }
        }
    }

    /// Execute a blocking operation that produces no value
    pub fn execute_action_blocking<F>(&self, op: F) -> Result<(), RetryError<E>>
    where
        F: FnMut() -> Result<(), E>,
    {
        self.execute_blocking(op)
    }

    fn handle_failure(
        &self,
        state: &mut RetryAttemptState<E>,
        fault: Fault<E>,
        operation: &str,
    ) -> Step<E> {
        let attempt_index = state.attempt_index();
        let step = state.record_failure(fault, &self.policy, operation);

        match &step {
            Step::Retry(delay) => {
                if let Some(fault) = state.failures().front() {
                    self.observer.on_attempt_failed(attempt_index, fault, *delay);
                }
            }
            Step::Abandon(abandonment) => {
                if let Some(fault) = abandonment.error.faults().iter().find(|f| !f.is_exhaustion_marker()) {
                    if abandonment.evidence.is_some() {
                        self.observer.on_abandoned(attempt_index, fault);
                    } else {
                        self.observer.on_permanent_fault(attempt_index, fault);
                    }
                }
            }
        }

        step
    }

    fn finish(&self, abandonment: Abandonment<E>) -> RetryError<E> {
        if let Some(evidence) = &abandonment.evidence {
            if let Some(observer) = self.fault_observer.resolve() {
                observer.on_transient_fault(evidence);
            }
        }
        abandonment.error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::observer::{EvidenceLog, StatsObserver};
    use crate::retry::strategies::{ClosurePredicate, OperationPredicate};
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn test_policy(max_attempts: u32) -> RetryPolicy<io::Error> {
        RetryPolicy::builder()
            .recovery_enabled(true)
            .max_attempts(max_attempts)
            .retry_strategy(|_| Duration::from_millis(1))
            .build()
    }

    #[tokio::test]
    async fn test_immediate_success() {
        let observer = Arc::new(StatsObserver::new());

        let result: Result<&str, RetryError<io::Error>> = RetryExecutor::new(test_policy(3))
            .with_observer(observer.clone())
            .execute(|| async { Ok("success") })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.successes(), 1);
        assert_eq!(observer.failures(), 0);
    }

    #[tokio::test]
    async fn test_success_after_retry() {
        let observer = Arc::new(StatsObserver::new());
        let attempts = Arc::new(AtomicU32::new(0));
        let attempts_clone = attempts.clone();

        let result: Result<&str, RetryError<io::Error>> = RetryExecutor::new(test_policy(3))
            .with_observer(observer.clone())
            .execute(|| {
                let attempts = attempts_clone.clone();
                async move {
                    let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if attempt < 2 {
                        Err(io::Error::new(io::ErrorKind::TimedOut, "timeout"))
                    } else {
                        Ok("success")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "success");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(observer.attempt_starts(), 2);
        assert_eq!(observer.failures(), 1);
        assert_eq!(observer.successes(), 1);
    }

    #[tokio::test]
    async fn test_all_attempts_exhausted() {
        let observer = Arc::new(StatsObserver::new());
        let log = Arc::new(EvidenceLog::new());

        let result: Result<&str, RetryError<io::Error>> = RetryExecutor::new(test_policy(2))
            .with_observer(observer.clone())
            .with_fault_observer(log.clone())
            .with_operation_name("always-fails")
            .execute(|| async { Err(io::Error::new(io::ErrorKind::TimedOut, "always fails")) })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        assert_eq!(observer.attempt_starts(), 3);
        assert_eq!(observer.failures(), 2); // The last failure is an abandonment
        assert_eq!(observer.abandonments(), 1);

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation, "always-fails");
        assert_eq!(entries[0].attempt_index, 2);
    }

    #[tokio::test]
    async fn test_non_transient_first_attempt_is_unwrapped() {
        let observer = Arc::new(StatsObserver::new());
        let log = Arc::new(EvidenceLog::new());
        let policy: RetryPolicy<io::Error> = RetryPolicy::builder()
            .recovery_enabled(true)
            .max_attempts(3)
            .detection_strategy(OperationPredicate::new(ClosurePredicate::new(
                |err: &io::Error| err.kind() != io::ErrorKind::NotFound,
            )))
            .build();

        let result: Result<&str, RetryError<io::Error>> = RetryExecutor::new(policy)
            .with_observer(observer.clone())
            .with_fault_observer(log.clone())
            .execute(|| async { Err(io::Error::new(io::ErrorKind::NotFound, "not found")) })
            .await;

        let err = result.unwrap_err();
        assert!(err.is_failed());
        assert_eq!(err.source_ref().unwrap().kind(), io::ErrorKind::NotFound);
        assert_eq!(observer.attempt_starts(), 1);
        assert_eq!(observer.permanent_faults(), 1);
        assert!(log.is_empty());
    }

    #[test]
    fn test_blocking_recovery_disabled_runs_once() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::builder().max_attempts(5).build();

        let result: Result<(), RetryError<io::Error>> = RetryExecutor::new(policy)
            .without_fault_observer()
            .execute_blocking(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(io::Error::other("boom"))
            });

        let err = result.unwrap_err();
        assert!(err.is_failed());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_blocking_action_form() {
        let attempts = AtomicU32::new(0);

        let result = RetryExecutor::new(test_policy(4)).execute_action_blocking(|| {
            if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                Err(io::Error::other("flaky"))
            } else {
                Ok(())
            }
        });

        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_default_operation_name_is_closure_type() {
        let log = Arc::new(EvidenceLog::new());
        let _ = RetryExecutor::new(test_policy(0))
            .with_fault_observer(log.clone())
            .execute_blocking(|| Err::<(), _>(io::Error::other("x")));

        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].operation.contains("test_default_operation_name_is_closure_type"));
    }
}
