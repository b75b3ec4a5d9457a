//! Core types and utilities for op-runtime
//!
//! # Modules
//!
//! - `config`: Environment loading and runtime settings
//! - `error`: Error types and Result alias
//! - `types`: Payloads, lifecycle/job states, error envelopes, outcomes

pub mod config;
pub mod error;
pub mod types;

// Re-exports
pub use config::RuntimeConfig;
pub use error::{Error, Result};
pub use types::*;
