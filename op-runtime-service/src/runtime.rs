//! Service wiring: registry -> runner -> plugin, job and analysis services

use anyhow::{bail, Context, Result};
use op_core::{Payload, RuntimeConfig};
use op_execution_tracker::{
    AnalysisExecutionService, JobEvent, JobExecutionService, JobMetrics, JobRecord,
    PluginExecutionService,
};
use op_tools::validation::json_type_name;
use op_tools::{register_builtin_plugins, PluginRegistry, ToolRunner};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

pub struct Runtime {
    pub registry: Arc<PluginRegistry>,
    pub jobs: Arc<JobExecutionService>,
    pub analysis: AnalysisExecutionService,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        let registry = Arc::new(PluginRegistry::new());
        register_builtin_plugins(&registry);

        let event_capacity = config.job_event_capacity;
        info!(
            plugins = registry.len(),
            timeout_ms = ?config.plugin_timeout_ms,
            max_concurrent = ?config.max_concurrent_plugins,
            "Initialized plugin registry"
        );

        let runner = Arc::new(ToolRunner::new(registry.clone(), config));
        let plugins = Arc::new(PluginExecutionService::new(runner));
        let metrics = Arc::new(JobMetrics::new().context("Failed to register job metrics")?);
        let jobs = Arc::new(JobExecutionService::with_event_capacity(
            plugins,
            metrics,
            event_capacity,
        ));
        let analysis = AnalysisExecutionService::new(jobs.clone());

        Ok(Self {
            registry,
            jobs,
            analysis,
        })
    }

    /// Submit a job, run it on a worker task and wait for its terminal event
    pub async fn submit_and_wait(&self, plugin: &str, payload: Payload) -> Result<JobRecord> {
        let mut events = self.jobs.subscribe();
        let job_id = self.analysis.submit_analysis(plugin, payload).await;

        let jobs = self.jobs.clone();
        let worker_id = job_id.clone();
        let worker = tokio::spawn(async move { jobs.run_job(&worker_id).await });

        loop {
            match events.recv().await {
                Ok(JobEvent::Completed(job)) | Ok(JobEvent::Cancelled(job)) if job.id == job_id => {
                    break;
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Job event receiver lagged");
                    if self.jobs.get_job(&job_id).await?.status.is_terminal() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }

        worker.await.context("Job worker task failed")??;
        let job = self.jobs.get_job(&job_id).await?;
        if !job.status.is_terminal() {
            bail!("job {} did not finish (status {})", job.id, job.status);
        }
        Ok(job)
    }
}

/// Parse a JSON object given on the command line
pub fn parse_payload(raw: &str) -> Result<Payload> {
    match serde_json::from_str::<Value>(raw).context("Payload is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("payload must be a JSON object, got {}", json_type_name(&other)),
    }
}
