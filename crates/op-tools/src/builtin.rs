//! Built-in Plugins
//!
//! - **echo**: returns the request unchanged
//! - **inspect**: summarizes the request (key count and JSON type per key)

use anyhow::Result;
use async_trait::async_trait;
use op_core::Payload;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::plugin::Plugin;
use crate::registry::PluginRegistry;
use crate::validation::json_type_name;

/// Returns its request unchanged
pub struct EchoPlugin;

#[async_trait]
impl Plugin for EchoPlugin {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Return the request payload unchanged"
    }

    async fn invoke(&self, request: Payload) -> Result<Value> {
        Ok(Value::Object(request))
    }
}

/// Reports the shape of its request
pub struct InspectPlugin;

#[async_trait]
impl Plugin for InspectPlugin {
    fn name(&self) -> &str {
        "inspect"
    }

    fn description(&self) -> &str {
        "Summarize the keys and JSON types of the request payload"
    }

    async fn invoke(&self, request: Payload) -> Result<Value> {
        let types: Payload = request
            .iter()
            .map(|(key, value)| (key.clone(), json!(json_type_name(value))))
            .collect();

        Ok(json!({
            "key_count": request.len(),
            "types": types,
        }))
    }
}

/// Register all built-in plugins with the registry
pub fn register_builtin_plugins(registry: &PluginRegistry) {
    registry.register_plugin(Arc::new(EchoPlugin));
    registry.register_plugin(Arc::new(InspectPlugin));
    info!(count = 2, "Registered built-in plugins");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ToolRunner;

    #[test]
    fn test_register_builtin_plugins() {
        let registry = PluginRegistry::new();
        register_builtin_plugins(&registry);
        assert_eq!(registry.names(), vec!["echo".to_string(), "inspect".to_string()]);
    }

    #[tokio::test]
    async fn test_inspect_through_runner() {
        let registry = Arc::new(PluginRegistry::new());
        register_builtin_plugins(&registry);
        let runner = ToolRunner::with_defaults(registry);

        let request = json!({"image": "a.png", "rois": [1, 2], "scale": 0.5});
        let outcome = runner
            .run("inspect", request.as_object().cloned().unwrap())
            .await;
        let result = outcome.result().unwrap();

        assert_eq!(result["key_count"], json!(3));
        assert_eq!(result["types"]["image"], json!("string"));
        assert_eq!(result["types"]["rois"], json!("array"));
        assert_eq!(result["types"]["scale"], json!("number"));
    }
}
