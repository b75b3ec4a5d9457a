//! op-tools: Plugin Registry and Governed Execution
//!
//! Provides the plugin trait, the registry with per-plugin execution
//! metrics, request/response validation, error envelopes, and the tool
//! runner through which every plugin invocation passes.

pub mod builtin;
pub mod envelope;
pub mod plugin;
pub mod registry;
pub mod runner;
pub mod schema;
pub mod validation;

// Re-export main types
pub use builtin::register_builtin_plugins;
pub use plugin::{BoxedPlugin, FnPlugin, Plugin};
pub use registry::{ExecutionMetrics, PluginRegistry, PluginStatus};
pub use runner::ToolRunner;
pub use schema::{FieldType, InputSchema};
