//! Plugin Registry with per-plugin execution metrics
//!
//! Provides a registry for plugins with:
//! - Handle lookup by unique plugin name
//! - Cumulative execution metrics and lifecycle state per plugin
//! - Per-plugin locking so unrelated plugins never serialize on each other
//!
//! Locks are synchronous: every operation here is a short in-memory
//! update, and the runner's drop guard must be able to record metrics
//! without an executor.

use chrono::{DateTime, Utc};
use op_core::LifecycleState;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use crate::plugin::BoxedPlugin;

/// Cumulative execution metrics for one plugin name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub success_count: u64,
    pub error_count: u64,
    pub last_execution_time_ms: Option<u64>,
    /// Cumulative mean over every recorded execution
    pub avg_execution_time_ms: Option<u64>,
    pub total_execution_time_ms: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub state: LifecycleState,
}

impl ExecutionMetrics {
    pub fn executions(&self) -> u64 {
        self.success_count + self.error_count
    }

    fn record(&mut self, state: LifecycleState, elapsed_ms: u64, had_error: bool) {
        if had_error {
            self.error_count += 1;
        } else {
            self.success_count += 1;
        }
        self.total_execution_time_ms = self.total_execution_time_ms.saturating_add(elapsed_ms);
        self.last_execution_time_ms = Some(elapsed_ms);
        self.avg_execution_time_ms = Some(self.total_execution_time_ms / self.executions());
        self.last_used = Some(Utc::now());
        self.state = state;
    }
}

/// Metrics snapshot tagged with its plugin name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginStatus {
    pub name: String,
    #[serde(flatten)]
    pub metrics: ExecutionMetrics,
}

/// Plugin registry
///
/// Construct one per process and hand it to the runner and services.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: RwLock<HashMap<String, BoxedPlugin>>,
    metrics: RwLock<HashMap<String, Arc<Mutex<ExecutionMetrics>>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin handle under a name.
    ///
    /// Re-registering replaces the handle but keeps the existing metrics.
    pub fn register(&self, name: &str, plugin: BoxedPlugin) {
        let replaced = write(&self.plugins)
            .insert(name.to_string(), plugin)
            .is_some();
        self.metrics_entry(name);

        if replaced {
            info!(plugin = %name, "Replaced plugin handle, metrics preserved");
        } else {
            debug!(plugin = %name, "Registered plugin");
        }
    }

    /// Register a plugin under its own name
    pub fn register_plugin(&self, plugin: BoxedPlugin) {
        let name = plugin.name().to_string();
        self.register(&name, plugin);
    }

    /// Resolve a plugin handle
    pub fn get(&self, name: &str) -> Option<BoxedPlugin> {
        read(&self.plugins).get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        read(&self.plugins).contains_key(name)
    }

    /// Registered plugin names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = read(&self.plugins).keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        read(&self.plugins).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.plugins).is_empty()
    }

    /// Record one execution.
    ///
    /// Creates the metrics record if the name was never registered.
    pub fn update_execution_metrics(
        &self,
        name: &str,
        state: LifecycleState,
        elapsed_ms: u64,
        had_error: bool,
    ) {
        let entry = self.metrics_entry(name);
        let mut metrics = lock(&entry);
        metrics.record(state, elapsed_ms, had_error);

        debug!(
            plugin = %name,
            state = %state,
            elapsed_ms,
            had_error,
            success_count = metrics.success_count,
            error_count = metrics.error_count,
            "Updated execution metrics"
        );
    }

    /// Snapshot of a plugin's metrics
    pub fn get_status(&self, name: &str) -> Option<ExecutionMetrics> {
        let entry = read(&self.metrics).get(name).cloned()?;
        let metrics = lock(&entry).clone();
        Some(metrics)
    }

    pub fn current_state(&self, name: &str) -> Option<LifecycleState> {
        self.get_status(name).map(|m| m.state)
    }

    /// Snapshot of every metrics record, sorted by name
    pub fn list_status(&self) -> Vec<PluginStatus> {
        let entries: Vec<_> = read(&self.metrics)
            .iter()
            .map(|(name, entry)| (name.clone(), Arc::clone(entry)))
            .collect();

        let mut statuses: Vec<_> = entries
            .into_iter()
            .map(|(name, entry)| PluginStatus {
                name,
                metrics: lock(&entry).clone(),
            })
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    fn metrics_entry(&self, name: &str) -> Arc<Mutex<ExecutionMetrics>> {
        if let Some(entry) = read(&self.metrics).get(name) {
            return Arc::clone(entry);
        }

        let mut metrics = write(&self.metrics);
        Arc::clone(metrics.entry(name.to_string()).or_default())
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
