//! # transient-core
//!
//! Core library for the transient CLI providing:
//! - Retry execution engine with blocking and async entry points
//! - Backoff strategies and fault classification predicates
//! - Fault observers notified when retrying is abandoned
//! - Hierarchical runtime configuration (embedded defaults, YAML, environment)

pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod utils;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use retry::{RetryError, RetryExecutor, RetryPolicy};
pub use types::{RetrySettings, RuntimeConfig};
pub use utils::get_home_dir;
