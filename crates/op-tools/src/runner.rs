//! Tool runner: the single governed entry point for plugin invocation
//!
//! Every call goes through the same pipeline: resolve, validate input,
//! invoke (with optional concurrency cap and timeout), validate output,
//! record metrics, and turn any failure into an [`op_core::ErrorEnvelope`].
//! Metrics are recorded by a drop guard, so they are written on every exit
//! path, including plugin panics and callers dropping the future.

use futures::FutureExt;
use op_core::{Error, ExecutionOutcome, LifecycleState, Payload, RuntimeConfig};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::envelope::{build_error_envelope, panic_message, validation_envelope};
use crate::plugin::BoxedPlugin;
use crate::registry::PluginRegistry;
use crate::schema::InputSchema;
use crate::validation::{validate_input, validate_output};

/// Records one metrics update for the invocation when dropped.
///
/// Armed pessimistically: an invocation that never settles counts as failed.
struct MetricsGuard<'a> {
    registry: &'a PluginRegistry,
    plugin_name: &'a str,
    started: Instant,
    state: LifecycleState,
    had_error: bool,
}

impl<'a> MetricsGuard<'a> {
    fn arm(registry: &'a PluginRegistry, plugin_name: &'a str) -> Self {
        Self {
            registry,
            plugin_name,
            started: Instant::now(),
            state: LifecycleState::Failed,
            had_error: true,
        }
    }

    fn settle(&mut self, state: LifecycleState, had_error: bool) {
        self.state = state;
        self.had_error = had_error;
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

impl Drop for MetricsGuard<'_> {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        self.registry.update_execution_metrics(
            self.plugin_name,
            self.state,
            elapsed_ms,
            self.had_error,
        );
    }
}

/// Governed plugin invoker
pub struct ToolRunner {
    registry: Arc<PluginRegistry>,
    config: RuntimeConfig,
    semaphore: Option<Arc<Semaphore>>,
}

impl ToolRunner {
    pub fn new(registry: Arc<PluginRegistry>, config: RuntimeConfig) -> Self {
        let semaphore = config
            .max_concurrent_plugins
            .map(|max| Arc::new(Semaphore::new(max)));
        Self {
            registry,
            config,
            semaphore,
        }
    }

    /// Create with default configuration: no timeout, no concurrency cap
    pub fn with_defaults(registry: Arc<PluginRegistry>) -> Self {
        Self::new(registry, RuntimeConfig::default())
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run one plugin invocation. Never panics and never returns an error;
    /// failures come back as [`ExecutionOutcome::Failure`].
    #[instrument(skip_all, fields(plugin = %plugin_name))]
    pub async fn run(&self, plugin_name: &str, payload: Payload) -> ExecutionOutcome {
        let mut guard = MetricsGuard::arm(&self.registry, plugin_name);
        let handle = self.registry.get(plugin_name);

        let schema = match handle.as_ref().map(|plugin| contain(|| plugin.input_schema())) {
            None => InputSchema::default(),
            Some(Ok(schema)) => schema,
            Some(Err(panic)) => {
                guard.settle(LifecycleState::Failed, true);
                return self.failure(panic, plugin_name);
            }
        };
        if let Err(errors) = validate_input(&payload, &schema, self.config.max_payload_depth) {
            // Input was rejected before the plugin ran; its health is unchanged.
            let state = self.registry.current_state(plugin_name).unwrap_or_default();
            guard.settle(state, true);
            warn!(violations = errors.len(), "Rejected request payload");
            return ExecutionOutcome::Failure(validation_envelope(&errors, Some(plugin_name)));
        }

        let plugin = match handle {
            Some(plugin) => match contain(|| plugin.is_available()) {
                Ok(true) => plugin,
                Ok(false) => {
                    guard.settle(LifecycleState::Unavailable, true);
                    return self.failure(Error::PluginUnavailable(plugin_name.to_string()).into(), plugin_name);
                }
                Err(panic) => {
                    guard.settle(LifecycleState::Unavailable, true);
                    return self.failure(panic, plugin_name);
                }
            },
            None => {
                guard.settle(LifecycleState::Unavailable, true);
                return self.failure(Error::PluginNotFound(plugin_name.to_string()).into(), plugin_name);
            }
        };

        match self.invoke(&plugin, plugin_name, payload).await {
            Ok(result) => {
                guard.settle(LifecycleState::Initialized, false);
                info!(elapsed_ms = guard.elapsed_ms(), "Plugin execution succeeded");
                ExecutionOutcome::Success(result)
            }
            Err(err) => {
                guard.settle(LifecycleState::Failed, true);
                self.failure(err, plugin_name)
            }
        }
    }

    async fn invoke(
        &self,
        plugin: &BoxedPlugin,
        plugin_name: &str,
        payload: Payload,
    ) -> anyhow::Result<Payload> {
        let _permit = match &self.semaphore {
            Some(semaphore) => Some(
                Arc::clone(semaphore)
                    .acquire_owned()
                    .await
                    .map_err(|_| Error::execution("Runner is shut down"))?,
            ),
            None => None,
        };

        let call = AssertUnwindSafe(plugin.invoke(payload)).catch_unwind();
        let returned = match self.config.plugin_timeout() {
            Some(limit) => timeout(limit, call).await.map_err(|_| Error::Timeout {
                plugin: plugin_name.to_string(),
                timeout_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
            })?,
            None => call.await,
        };

        let value = match returned {
            Ok(result) => result?,
            Err(panic) => return Err(panicked(panic.as_ref())),
        };

        Ok(validate_output(value)?)
    }

    fn failure(&self, err: anyhow::Error, plugin_name: &str) -> ExecutionOutcome {
        let envelope = build_error_envelope(&err, Some(plugin_name));
        warn!(
            error_type = %envelope.kind,
            message = %envelope.message,
            "Plugin execution failed"
        );
        debug!(diagnostic = ?envelope.diagnostic, "Failure diagnostic");
        ExecutionOutcome::Failure(envelope)
    }
}

/// Run synchronous plugin code, turning a panic into an execution error
fn contain<T>(call: impl FnOnce() -> T) -> anyhow::Result<T> {
    std::panic::catch_unwind(AssertUnwindSafe(call)).map_err(|panic| panicked(panic.as_ref()))
}

fn panicked(panic: &(dyn Any + Send)) -> anyhow::Error {
    Error::execution(format!("Plugin panicked: {}", panic_message(panic))).into()
}
