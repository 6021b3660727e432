//! Type definitions for transient configuration

mod runtime_config;

pub use runtime_config::*;
