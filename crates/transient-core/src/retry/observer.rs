//! Retry observation and logging
//!
//! Two kinds of observers exist:
//!
//! - [`RetryObserver`] receives attempt-level events (start, failure,
//!   success, abandonment). [`TracingObserver`] logs them with `tracing`.
//! - [`FaultObserver`] is notified once when a retry sequence runs out of
//!   attempts on a transient fault. Executors take one by injection and
//!   otherwise fall back to the process-wide slot managed by
//!   [`set_fault_observer`].

use std::fmt::Display;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::fault::TransientFaultEvidence;

/// Observer trait for retry attempt events
///
/// Implement this trait to receive callbacks during retry execution.
/// This is useful for logging, metrics collection, or debugging.
///
/// # Example
///
/// ```rust
/// use transient_core::retry::RetryObserver;
/// use std::fmt::Display;
/// use std::time::Duration;
///
/// struct MetricsObserver;
///
/// impl RetryObserver for MetricsObserver {
///     fn on_attempt_start(&self, attempt_index: u32, max_attempts: u32) {}
///
///     fn on_attempt_failed(&self, attempt_index: u32, fault: &dyn Display, delay: Duration) {}
///
///     fn on_success(&self, attempt_index: u32, elapsed: Duration) {}
///
///     fn on_abandoned(&self, attempt_index: u32, fault: &dyn Display) {}
/// }
/// ```
pub trait RetryObserver: Send + Sync {
    /// Called when an attempt is about to start
    ///
    /// # Arguments
    ///
    /// * `attempt_index` - The attempt index (0 is the first attempt)
    /// * `max_attempts` - Retries permitted after the first attempt
    fn on_attempt_start(&self, attempt_index: u32, max_attempts: u32);

    /// Called when an attempt fails and will be retried
    ///
    /// # Arguments
    ///
    /// * `attempt_index` - The attempt that failed
    /// * `fault` - The fault that caused the failure
    /// * `delay` - The delay before the next attempt
    fn on_attempt_failed(&self, attempt_index: u32, fault: &dyn Display, delay: Duration);

    /// Called when the operation succeeds
    ///
    /// # Arguments
    ///
    /// * `attempt_index` - The attempt that succeeded
    /// * `elapsed` - Wall-clock time since the first attempt started
    fn on_success(&self, attempt_index: u32, elapsed: Duration);

    /// Called when the retry budget runs out on a transient fault
    ///
    /// # Arguments
    ///
    /// * `attempt_index` - The final attempt
    /// * `fault` - The fault from the final attempt
    fn on_abandoned(&self, attempt_index: u32, fault: &dyn Display);

    /// Called when a fault is classified as non-transient
    ///
    /// # Arguments
    ///
    /// * `attempt_index` - The attempt that produced the fault
    /// * `fault` - The permanent fault
    fn on_permanent_fault(&self, attempt_index: u32, fault: &dyn Display) {
        let _ = (attempt_index, fault);
    }
}

/// A no-op observer that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl RetryObserver for NoOpObserver {
    fn on_attempt_start(&self, _attempt_index: u32, _max_attempts: u32) {}

    fn on_attempt_failed(&self, _attempt_index: u32, _fault: &dyn Display, _delay: Duration) {}

    fn on_success(&self, _attempt_index: u32, _elapsed: Duration) {}

    fn on_abandoned(&self, _attempt_index: u32, _fault: &dyn Display) {}
}

/// An observer that logs retry events using the `tracing` crate
///
/// # Log Levels
///
/// - `on_attempt_start`: TRACE
/// - `on_attempt_failed`: WARN
/// - `on_success`: INFO after a retry, DEBUG on the first attempt
/// - `on_abandoned`: ERROR
/// - `on_permanent_fault`: WARN
#[derive(Debug, Clone)]
pub struct TracingObserver {
    /// Name of the operation being retried (for log context)
    operation: String,
}

impl TracingObserver {
    /// Create a new tracing observer
    ///
    /// # Arguments
    ///
    /// * `operation` - A descriptive name for the operation being retried
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
        }
    }

    /// Get the operation name
    pub fn operation(&self) -> &str {
        &self.operation
    }
}

impl Default for TracingObserver {
    fn default() -> Self {
        Self::new("retry")
    }
}

impl RetryObserver for TracingObserver {
    fn on_attempt_start(&self, attempt_index: u32, max_attempts: u32) {
        tracing::trace!(
            operation = %self.operation,
            attempt_index = attempt_index,
            max_attempts = max_attempts,
            "starting attempt"
        );
    }

    fn on_attempt_failed(&self, attempt_index: u32, fault: &dyn Display, delay: Duration) {
        tracing::warn!(
            operation = %self.operation,
            attempt_index = attempt_index,
            error = %fault,
            delay_ms = delay.as_millis() as u64,
            "attempt failed, will retry"
        );
    }

    fn on_success(&self, attempt_index: u32, elapsed: Duration) {
        if attempt_index > 0 {
            tracing::info!(
                operation = %self.operation,
                attempt_index = attempt_index,
                elapsed_ms = elapsed.as_millis() as u64,
                "succeeded after retry"
            );
        } else {
            tracing::debug!(
                operation = %self.operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "succeeded on first attempt"
            );
        }
    }

    fn on_abandoned(&self, attempt_index: u32, fault: &dyn Display) {
        tracing::error!(
            operation = %self.operation,
            attempt_index = attempt_index,
            error = %fault,
            "retry budget exhausted"
        );
    }

    fn on_permanent_fault(&self, attempt_index: u32, fault: &dyn Display) {
        tracing::warn!(
            operation = %self.operation,
            attempt_index = attempt_index,
            error = %fault,
            "fault is not transient, giving up"
        );
    }
}

/// An observer that counts retry events
///
/// Useful for testing and metrics collection.
#[derive(Debug, Default)]
pub struct StatsObserver {
    /// Attempt start events
    pub attempt_starts: AtomicU32,
    /// Failed attempt events (followed by a retry)
    pub failures: AtomicU32,
    /// Success events
    pub successes: AtomicU32,
    /// Budget exhaustion events
    pub abandonments: AtomicU32,
    /// Non-transient classification events
    pub permanent_faults: AtomicU32,
}

impl StatsObserver {
    /// Create a new stats observer
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of attempt starts
    pub fn attempt_starts(&self) -> u32 {
        self.attempt_starts.load(Ordering::SeqCst)
    }

    /// Get the number of failures that led to a retry
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Get the number of successes
    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    /// Get the number of exhausted retry sequences
    pub fn abandonments(&self) -> u32 {
        self.abandonments.load(Ordering::SeqCst)
    }

    /// Get the number of non-transient classifications
    pub fn permanent_faults(&self) -> u32 {
        self.permanent_faults.load(Ordering::SeqCst)
    }
}

impl RetryObserver for StatsObserver {
    fn on_attempt_start(&self, _attempt_index: u32, _max_attempts: u32) {
        self.attempt_starts.fetch_add(1, Ordering::SeqCst);
    }

    fn on_attempt_failed(&self, _attempt_index: u32, _fault: &dyn Display, _delay: Duration) {
        self.failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_success(&self, _attempt_index: u32, _elapsed: Duration) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_abandoned(&self, _attempt_index: u32, _fault: &dyn Display) {
        self.abandonments.fetch_add(1, Ordering::SeqCst);
    }

    fn on_permanent_fault(&self, _attempt_index: u32, _fault: &dyn Display) {
        self.permanent_faults.fetch_add(1, Ordering::SeqCst);
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Arc<T> {
    fn on_attempt_start(&self, attempt_index: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt_index, max_attempts)
    }

    fn on_attempt_failed(&self, attempt_index: u32, fault: &dyn Display, delay: Duration) {
        (**self).on_attempt_failed(attempt_index, fault, delay)
    }

    fn on_success(&self, attempt_index: u32, elapsed: Duration) {
        (**self).on_success(attempt_index, elapsed)
    }

    fn on_abandoned(&self, attempt_index: u32, fault: &dyn Display) {
        (**self).on_abandoned(attempt_index, fault)
    }

    fn on_permanent_fault(&self, attempt_index: u32, fault: &dyn Display) {
        (**self).on_permanent_fault(attempt_index, fault)
    }
}

impl<T: RetryObserver + ?Sized> RetryObserver for Box<T> {
    fn on_attempt_start(&self, attempt_index: u32, max_attempts: u32) {
        (**self).on_attempt_start(attempt_index, max_attempts)
    }

    fn on_attempt_failed(&self, attempt_index: u32, fault: &dyn Display, delay: Duration) {
        (**self).on_attempt_failed(attempt_index, fault, delay)
    }

    fn on_success(&self, attempt_index: u32, elapsed: Duration) {
        (**self).on_success(attempt_index, elapsed)
    }

    fn on_abandoned(&self, attempt_index: u32, fault: &dyn Display) {
        (**self).on_abandoned(attempt_index, fault)
    }

    fn on_permanent_fault(&self, attempt_index: u32, fault: &dyn Display) {
        (**self).on_permanent_fault(attempt_index, fault)
    }
}

/// Callback notified when a retry sequence runs out of attempts
///
/// Implemented for any `Fn(&TransientFaultEvidence) + Send + Sync`. A
/// panicking observer is not caught by the executor.
pub trait FaultObserver: Send + Sync {
    /// Called exactly once per exhausted retry sequence
    fn on_transient_fault(&self, evidence: &TransientFaultEvidence);
}

impl<F> FaultObserver for F
where
    F: Fn(&TransientFaultEvidence) + Send + Sync,
{
    fn on_transient_fault(&self, evidence: &TransientFaultEvidence) {
        self(evidence)
    }
}

/// Collects every piece of evidence it is handed
///
/// Useful in tests and for post-mortem reporting.
#[derive(Debug, Default)]
pub struct EvidenceLog {
    entries: std::sync::Mutex<Vec<TransientFaultEvidence>>,
}

impl EvidenceLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded evidence, oldest first
    pub fn entries(&self) -> Vec<TransientFaultEvidence> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of notifications received
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if no notification was received
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FaultObserver for EvidenceLog {
    fn on_transient_fault(&self, evidence: &TransientFaultEvidence) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(evidence.clone());
    }
}

/// Process-wide fault observer slot
///
/// Global mutable state: set it once at startup, read it thereafter.
static FAULT_OBSERVER: RwLock<Option<Arc<dyn FaultObserver>>> = RwLock::new(None);

/// Register the process-wide fault observer, replacing any previous one
///
/// Pass `None` to unset it. Executors with an injected observer ignore the
/// slot.
pub fn set_fault_observer(observer: Option<Arc<dyn FaultObserver>>) {
    let mut slot = FAULT_OBSERVER
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    *slot = observer;
}

/// Get the process-wide fault observer, if one is registered
pub fn fault_observer() -> Option<Arc<dyn FaultObserver>> {
    FAULT_OBSERVER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
