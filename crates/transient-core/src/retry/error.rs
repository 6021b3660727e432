//! Error types for the retry execution engine
//!
//! A retried operation ends in one of two ways when it does not succeed:
//! the failure is handed back as-is, or the whole failure history is wrapped
//! in a [`RetryExhausted`] aggregate.

use std::error::Error;
use std::fmt;

use super::fault::{Fault, TransientFaultEvidence};

/// Errors that can occur during retry execution
///
/// The error type is generic over `E`, the underlying error type from the
/// operation being retried.
#[derive(Debug)]
pub enum RetryError<E> {
    /// The failure is propagated unwrapped
    ///
    /// Returned when recovery is disabled, or when the first attempt fails
    /// with a fault classified as non-transient.
    Failed(Fault<E>),

    /// Retrying was attempted and then abandoned
    ///
    /// Carries every failure observed, newest first.
    Exhausted(RetryExhausted<E>),
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryError::Failed(fault) => write!(f, "{}", fault),
            RetryError::Exhausted(aggregate) => write!(f, "{}", aggregate),
        }
    }
}

impl<E: Error + 'static> Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RetryError::Failed(fault) => fault.source(),
            RetryError::Exhausted(aggregate) => aggregate.latest().map(|f| f as &dyn Error),
        }
    }
}

impl<E> RetryError<E> {
    /// Create an unwrapped failure from an operation error
    pub fn operation(source: E) -> Self {
        RetryError::Failed(Fault::Operation(source))
    }

    /// Get the number of attempt slots used
    ///
    /// Slots rejected by the latency ceiling count even though the operation
    /// was not run for them.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Failed(_) => 1,
            RetryError::Exhausted(aggregate) => aggregate.evidence().attempt_index + 1,
        }
    }

    /// Check if this error is an aggregate of a retry history
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted(_))
    }

    /// Check if this error is the unwrapped failure of a single attempt
    pub fn is_failed(&self) -> bool {
        matches!(self, RetryError::Failed(_))
    }

    /// Get the aggregate, if retrying was abandoned
    pub fn aggregate(&self) -> Option<&RetryExhausted<E>> {
        match self {
            RetryError::Exhausted(aggregate) => Some(aggregate),
            RetryError::Failed(_) => None,
        }
    }

    /// Every recorded fault, newest first
    pub fn faults(&self) -> &[Fault<E>] {
        match self {
            RetryError::Failed(fault) => std::slice::from_ref(fault),
            RetryError::Exhausted(aggregate) => aggregate.faults(),
        }
    }

    /// Get the most recent operation error, consuming this error
    pub fn into_source(self) -> Option<E> {
        match self {
            RetryError::Failed(fault) => fault.into_operation_error(),
            RetryError::Exhausted(aggregate) => aggregate
                .into_faults()
                .into_iter()
                .find_map(Fault::into_operation_error),
        }
    }

    /// Get a reference to the most recent operation error
    pub fn source_ref(&self) -> Option<&E> {
        self.faults().iter().find_map(Fault::operation_error)
    }

    /// Map the error type using a closure
    pub fn map_err<F, E2>(self, mut f: F) -> RetryError<E2>
    where
        F: FnMut(E) -> E2,
    {
        match self {
            RetryError::Failed(fault) => RetryError::Failed(fault.map_err(f)),
            RetryError::Exhausted(aggregate) => RetryError::Exhausted(RetryExhausted {
                faults: aggregate
                    .faults
                    .into_iter()
                    .map(|fault| fault.map_err(&mut f))
                    .collect(),
                evidence: aggregate.evidence,
            }),
        }
    }
}

/// Aggregate of every failure observed across a retry sequence
#[derive(Debug)]
pub struct RetryExhausted<E> {
    faults: Vec<Fault<E>>,
    evidence: TransientFaultEvidence,
}

impl<E> RetryExhausted<E> {
    pub(crate) fn new(faults: Vec<Fault<E>>, evidence: TransientFaultEvidence) -> Self {
        Self { faults, evidence }
    }

    /// Every recorded fault, newest first
    ///
    /// When the retry budget ran out the exhaustion marker is the first entry.
    pub fn faults(&self) -> &[Fault<E>] {
        &self.faults
    }

    /// Consume the aggregate and return the faults, newest first
    pub fn into_faults(self) -> Vec<Fault<E>> {
        self.faults
    }

    /// Snapshot of the retry state at abandonment
    pub fn evidence(&self) -> &TransientFaultEvidence {
        &self.evidence
    }

    /// Check if the exhaustion marker was recorded
    ///
    /// False when retrying stopped on a non-transient fault.
    pub fn budget_exhausted(&self) -> bool {
        self.faults.first().is_some_and(Fault::is_exhaustion_marker)
    }

    /// The most recent fault that is not the exhaustion marker
    pub fn latest(&self) -> Option<&Fault<E>> {
        self.faults.iter().find(|f| !f.is_exhaustion_marker())
    }

    /// Number of recorded faults, marker included
    pub fn len(&self) -> usize {
        self.faults.len()
    }

    /// Check if no faults were recorded
    pub fn is_empty(&self) -> bool {
        self.faults.is_empty()
    }
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attempts = self.evidence.attempt_index + 1;
        if self.budget_exhausted() {
            write!(f, "retry exhausted after {} attempts", attempts)?;
        } else {
            write!(f, "retry abandoned after {} attempts", attempts)?;
        }
        write!(
            f,
            " over {:.2}s of execution",
            self.evidence.latency.as_secs_f64()
        )?;
        if let Some(latest) = self.latest() {
            write!(f, ": {}", latest)?;
        }
        Ok(())
    }
}

impl<E: Error + 'static> Error for RetryExhausted<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.latest().map(|f| f as &dyn Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    fn evidence(attempt_index: u32) -> TransientFaultEvidence {
        TransientFaultEvidence {
            attempt_index,
            last_wait: Duration::from_millis(10),
            total_wait: Duration::from_millis(20),
            latency: Duration::from_millis(1500),
            operation: "sync".to_string(),
        }
    }

    fn exhausted() -> RetryError<io::Error> {
        RetryError::Exhausted(RetryExhausted::new(
            vec![
                Fault::Exhausted(evidence(2)),
                Fault::Operation(io::Error::new(io::ErrorKind::TimedOut, "third")),
                Fault::Operation(io::Error::new(io::ErrorKind::TimedOut, "second")),
                Fault::Operation(io::Error::new(io::ErrorKind::TimedOut, "first")),
            ],
            evidence(2),
        ))
    }

    #[test]
    fn test_failed_error() {
        let err: RetryError<io::Error> =
            RetryError::operation(io::Error::new(io::ErrorKind::NotFound, "not found"));

        assert!(err.is_failed());
        assert!(!err.is_exhausted());
        assert_eq!(err.attempts(), 1);
        assert_eq!(err.faults().len(), 1);
        assert!(err.aggregate().is_none());
    }

    #[test]
    fn test_exhausted_error() {
        let err = exhausted();

        assert!(err.is_exhausted());
        assert_eq!(err.attempts(), 3);
        let aggregate = err.aggregate().unwrap();
        assert!(aggregate.budget_exhausted());
        assert_eq!(aggregate.len(), 4);
        assert_eq!(aggregate.latest().unwrap().to_string(), "third");
    }

    #[test]
    fn test_source_ref_skips_marker() {
        let err = exhausted();
        assert_eq!(err.source_ref().unwrap().to_string(), "third");
        assert_eq!(err.into_source().unwrap().to_string(), "third");
    }

    #[test]
    fn test_abandoned_without_marker() {
        let aggregate: RetryExhausted<String> = RetryExhausted::new(
            vec![
                Fault::Operation("permanent".to_string()),
                Fault::Operation("transient".to_string()),
            ],
            evidence(1),
        );
        assert!(!aggregate.budget_exhausted());
        assert!(aggregate.to_string().starts_with("retry abandoned after 2 attempts"));
    }

    #[test]
    fn test_map_err() {
        let err: RetryError<i32> = RetryError::Exhausted(RetryExhausted::new(
            vec![Fault::Exhausted(evidence(1)), Fault::Operation(2), Fault::Operation(1)],
            evidence(1),
        ));

        let mapped = err.map_err(|n| format!("error code: {}", n));
        let faults = mapped.faults();
        assert!(faults[0].is_exhaustion_marker());
        assert_eq!(
            faults[1].operation_error().map(String::as_str),
            Some("error code: 2")
        );
    }

    #[test]
    fn test_display() {
        let display = format!("{}", exhausted());
        assert!(display.contains("retry exhausted"));
        assert!(display.contains("3 attempts"));
        assert!(display.contains("1.50s"));
        assert!(display.contains("third"));
    }
}
