//! Retry execution engine with policy-based configuration
//!
//! This module runs fallible operations under a [`RetryPolicy`]: faults are
//! classified as transient or permanent, transient faults are retried after
//! a backoff delay, and exhausted sequences are reported to a fault observer
//! together with [`TransientFaultEvidence`].
//!
//! # Features
//!
//! - Blocking and async entry points driving one state machine
//! - Multiple backoff strategies: None, Fixed, Exponential, Linear
//! - Latency ceiling measured on execution time, excluding waits
//! - Observable attempts via the `RetryObserver` trait
//! - Process-wide or per-executor `FaultObserver` for exhausted retries
//! - Thread-safe with Send + Sync bounds
//!
//! # Example
//!
//! ```rust,no_run
//! use transient_core::retry::{execute_with_retry_async, RetryError, RetryPolicy};
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     let policy = RetryPolicy::retrying(3);
//!
//!     execute_with_retry_async(|| async {
//!         // Your fallible operation here
//!         Ok("success".to_string())
//!     }, Some(&policy)).await
//! }
//! ```

mod error;
mod executor;
mod fault;
mod observer;
mod policy;
mod state;
mod strategies;

pub use error::{RetryError, RetryExhausted};
pub use executor::{
    execute_action_with_retry, execute_action_with_retry_async, execute_with_retry,
    execute_with_retry_async, RetryExecutor,
};
pub use fault::{Fault, TransientFaultEvidence};
pub use observer::{
    fault_observer, set_fault_observer, EvidenceLog, FaultObserver, NoOpObserver, RetryObserver,
    StatsObserver, TracingObserver,
};
pub use policy::{RetryPolicy, RetryPolicyBuilder, RetryStrategyFn};
pub use state::RetryAttemptState;
pub use strategies::{
    calculate_delay, AlwaysRetry, ClosurePredicate, MessagePredicate, NeverRetry,
    OperationPredicate, RetryPredicate,
};
