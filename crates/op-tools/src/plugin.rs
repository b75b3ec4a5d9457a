//! Core Plugin trait and types
//!
//! Defines the single interface every analysis plugin implements. Plugins
//! are only ever invoked by the tool runner.

use anyhow::Result;
use async_trait::async_trait;
use op_core::Payload;
use serde_json::Value;
use std::sync::Arc;

use crate::schema::InputSchema;

/// Core trait for all plugins
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Get the plugin name (unique identifier)
    fn name(&self) -> &str;

    /// Get human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Schema the request payload is validated against before invocation
    fn input_schema(&self) -> InputSchema {
        InputSchema::default()
    }

    /// Check if the plugin is available (e.g., dependencies met)
    fn is_available(&self) -> bool {
        true
    }

    /// Run the operation. Errors are classified by downcasting to
    /// [`op_core::Error`]; anything else is an execution error.
    async fn invoke(&self, request: Payload) -> Result<Value>;
}

/// Type alias for shared plugin handles
pub type BoxedPlugin = Arc<dyn Plugin>;

type Handler = Arc<dyn Fn(Payload) -> Result<Value> + Send + Sync>;

/// Closure-backed plugin
#[derive(Clone)]
pub struct FnPlugin {
    name: String,
    description: String,
    schema: InputSchema,
    handler: Handler,
}

impl FnPlugin {
    pub fn new<F>(name: &str, handler: F) -> Self
    where
        F: Fn(Payload) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            description: String::new(),
            schema: InputSchema::default(),
            handler: Arc::new(handler),
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn boxed(self) -> BoxedPlugin {
        Arc::new(self)
    }
}

#[async_trait]
impl Plugin for FnPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> InputSchema {
        self.schema.clone()
    }

    async fn invoke(&self, request: Payload) -> Result<Value> {
        (self.handler)(request)
    }
}
