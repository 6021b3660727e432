//! Failure values observed by the retry engine
//!
//! Every failed attempt is recorded as a [`Fault`]. Operation errors and
//! latency violations flow through the same classification path; the
//! exhaustion marker is only ever produced by the executor when it gives up.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// A single failure recorded during retry execution
#[derive(Debug)]
pub enum Fault<E> {
    /// The operation itself returned an error
    Operation(E),

    /// The time spent executing (excluding backoff waits) went over the
    /// policy's ceiling before the attempt started
    LatencyExceeded {
        /// Measured latency at the start of the attempt
        latency: Duration,
        /// The configured maximum
        maximum: Duration,
    },

    /// Marker placed at the front of the failure log when a transient fault
    /// ran out of attempts
    Exhausted(TransientFaultEvidence),
}

impl<E> Fault<E> {
    /// Get the operation error, if this fault carries one
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            Fault::Operation(err) => Some(err),
            _ => None,
        }
    }

    /// Consume the fault and return the operation error, if any
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Fault::Operation(err) => Some(err),
            _ => None,
        }
    }

    /// Check if this fault was raised by the latency ceiling
    pub fn is_latency_exceeded(&self) -> bool {
        matches!(self, Fault::LatencyExceeded { .. })
    }

    /// Check if this fault is the exhaustion marker
    pub fn is_exhaustion_marker(&self) -> bool {
        matches!(self, Fault::Exhausted(_))
    }

    /// Get the evidence carried by the exhaustion marker
    pub fn evidence(&self) -> Option<&TransientFaultEvidence> {
        match self {
            Fault::Exhausted(evidence) => Some(evidence),
            _ => None,
        }
    }

    /// Map the operation error type using a closure
    pub fn map_err<F, E2>(self, f: F) -> Fault<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Fault::Operation(err) => Fault::Operation(f(err)),
            Fault::LatencyExceeded { latency, maximum } => {
                Fault::LatencyExceeded { latency, maximum }
            }
            Fault::Exhausted(evidence) => Fault::Exhausted(evidence),
        }
    }
}

impl<E: fmt::Display> fmt::Display for Fault<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Operation(err) => write!(f, "{}", err),
            Fault::LatencyExceeded { latency, maximum } => write!(
                f,
                "latency of {}ms exceeded the maximum allowed {}ms",
                latency.as_millis(),
                maximum.as_millis()
            ),
            Fault::Exhausted(evidence) => write!(f, "transient fault exhausted: {}", evidence),
        }
    }
}

impl<E: Error + 'static> Error for Fault<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Fault::Operation(err) => Some(err),
            _ => None,
        }
    }
}

/// Snapshot of the retry state taken when recovery is abandoned
///
/// Handed to the fault observer and embedded in the exhaustion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransientFaultEvidence {
    /// Index of the final attempt (0 is the first attempt)
    pub attempt_index: u32,
    /// The most recent backoff delay
    #[serde(rename = "last_wait_ms", serialize_with = "as_millis")]
    pub last_wait: Duration,
    /// Sum of every backoff delay taken
    #[serde(rename = "total_wait_ms", serialize_with = "as_millis")]
    pub total_wait: Duration,
    /// Elapsed time spent executing, excluding waits
    #[serde(rename = "latency_ms", serialize_with = "as_millis")]
    pub latency: Duration,
    /// Human-readable name of the operation that was retried
    pub operation: String,
}

fn as_millis<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

impl fmt::Display for TransientFaultEvidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "operation '{}' gave up at attempt index {} (last wait {}ms, total wait {}ms, latency {}ms)",
            self.operation,
            self.attempt_index,
            self.last_wait.as_millis(),
            self.total_wait.as_millis(),
            self.latency.as_millis()
        )
    }
}
