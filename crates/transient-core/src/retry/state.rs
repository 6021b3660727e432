//! Per-invocation retry state
//!
//! A [`RetryAttemptState`] lives for exactly one call into the executor. The
//! sync and async entry points drive the same state machine; they differ
//! only in how they wait.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::error::{RetryError, RetryExhausted};
use super::fault::{Fault, TransientFaultEvidence};
use super::policy::RetryPolicy;

/// What the executor must do after a failed attempt
#[derive(Debug)]
pub(crate) enum Step<E> {
    /// Wait for the given delay, then run the next attempt
    Retry(Duration),
    /// Stop and report the error
    Abandon(Abandonment<E>),
}

/// Terminal outcome of a retry sequence that did not succeed
#[derive(Debug)]
pub(crate) struct Abandonment<E> {
    pub(crate) error: RetryError<E>,
    /// Set when a transient fault ran out of attempts
    pub(crate) evidence: Option<TransientFaultEvidence>,
}

/// Mutable state scoped to one invocation of the executor
#[derive(Debug)]
pub struct RetryAttemptState<E> {
    attempt_index: u32,
    start: Instant,
    total_wait: Duration,
    last_wait: Duration,
    latency: Duration,
    failures: VecDeque<Fault<E>>,
    is_transient_fault: bool,
}

impl<E> RetryAttemptState<E> {
    /// Create state for an invocation starting now
    pub fn new() -> Self {
        Self::started_at(Instant::now())
    }

    /// Create state for an invocation that started at `start`
    pub fn started_at(start: Instant) -> Self {
        Self {
            attempt_index: 0,
            start,
            total_wait: Duration::ZERO,
            last_wait: Duration::ZERO,
            latency: Duration::ZERO,
            failures: VecDeque::new(),
            is_transient_fault: false,
        }
    }

    /// Index of the current attempt (0 is the first attempt)
    pub fn attempt_index(&self) -> u32 {
        self.attempt_index
    }

    /// Sum of every backoff delay taken so far
    pub fn total_wait(&self) -> Duration {
        self.total_wait
    }

    /// The most recent backoff delay
    pub fn last_wait(&self) -> Duration {
        self.last_wait
    }

    /// Wall-clock time since the invocation started, waits included
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Execution time excluding waits, as of the last recomputation
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Failures observed so far, newest first
    pub fn failures(&self) -> &VecDeque<Fault<E>> {
        &self.failures
    }

    /// Result of the last classification
    pub fn is_transient_fault(&self) -> bool {
        self.is_transient_fault
    }

    /// The fault to record instead of running the attempt, if the latency
    /// ceiling has been crossed
    pub fn latency_fault(&self, policy: &RetryPolicy<E>) -> Option<Fault<E>> {
        let maximum = policy.maximum_allowed_latency();
        (self.latency > maximum).then_some(Fault::LatencyExceeded {
            latency: self.latency,
            maximum,
        })
    }

    /// Record a failed attempt and decide what happens next
    ///
    /// The retry strategy is only consulted once a retry has been decided.
    pub(crate) fn record_failure(
        &mut self,
        fault: Fault<E>,
        policy: &RetryPolicy<E>,
        operation: &str,
    ) -> Step<E> {
        self.is_transient_fault = policy.is_transient(&fault);
        self.failures.push_front(fault);

        if self.is_transient_fault && self.attempt_index < policy.max_attempts() {
            let candidate_wait = policy.wait_for(self.attempt_index);
            self.last_wait = candidate_wait;
            self.total_wait = self.total_wait.saturating_add(candidate_wait);
            self.attempt_index += 1;
            return Step::Retry(candidate_wait);
        }

        Step::Abandon(self.abandon(operation))
    }

    /// Recompute latency after a backoff wait
    pub fn resume(&mut self) {
        self.latency = self
            .start
            .elapsed()
            .saturating_sub(self.total_wait);
    }

    /// Snapshot the current state
    pub fn evidence(&self, operation: &str) -> TransientFaultEvidence {
        TransientFaultEvidence {
            attempt_index: self.attempt_index,
            last_wait: self.last_wait,
            total_wait: self.total_wait,
            latency: self.latency,
            operation: operation.to_string(),
        }
    }

    fn abandon(&mut self, operation: &str) -> Abandonment<E> {
        let evidence = self.evidence(operation);

        if self.is_transient_fault {
            // Budget ran out while the fault was still transient
            let mut failures = std::mem::take(&mut self.failures);
            failures.push_front(Fault::Exhausted(evidence.clone()));
            return Abandonment {
                error: RetryError::Exhausted(RetryExhausted::new(failures.into(), evidence.clone())),
                evidence: Some(evidence),
            };
        }

        if self.attempt_index == 0 {
            if let Some(fault) = self.failures.pop_front() {
                return Abandonment {
                    error: RetryError::Failed(fault),
                    evidence: None,
                };
            }
        }

        let failures = std::mem::take(&mut self.failures);
        Abandonment {
            error: RetryError::Exhausted(RetryExhausted::new(failures.into(), evidence)),
            evidence: None,
        }
    }
}

impl<E> Default for RetryAttemptState<E> {
    fn default() -> Self {
        Self::new()
    }
}
