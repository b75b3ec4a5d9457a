//! Plugin execution service
//!
//! Stable seam between orchestration and the tool runner. Upstream services
//! depend on this type, never on how the runner is built.

use op_core::{ExecutionOutcome, Payload};
use op_tools::{PluginRegistry, ToolRunner};
use std::sync::Arc;

pub struct PluginExecutionService {
    runner: Arc<ToolRunner>,
}

impl PluginExecutionService {
    pub fn new(runner: Arc<ToolRunner>) -> Self {
        Self { runner }
    }

    /// Run `plugin_name` through the tool runner
    pub async fn execute(&self, plugin_name: &str, payload: Payload) -> ExecutionOutcome {
        self.runner.run(plugin_name, payload).await
    }

    /// Read-only access for observability
    pub fn registry(&self) -> &Arc<PluginRegistry> {
        self.runner.registry()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use op_tools::FnPlugin;
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_execute_delegates_to_runner() {
        let registry = Arc::new(PluginRegistry::new());
        registry.register_plugin(FnPlugin::new("echo", |request| Ok(Value::Object(request))).boxed());
        let service = PluginExecutionService::new(Arc::new(ToolRunner::with_defaults(registry)));

        let request = json!({"frame": 7}).as_object().cloned().unwrap();
        let outcome = service.execute("echo", request.clone()).await;

        assert_eq!(outcome.result(), Some(&request));
        assert_eq!(service.registry().get_status("echo").unwrap().success_count, 1);
    }
}
