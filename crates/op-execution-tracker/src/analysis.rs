//! Analysis entry point
//!
//! `analyze` runs a request to completion and hands back the outcome.
//! `submit_analysis` only records the job; the caller runs it later
//! through [`JobExecutionService::run_job`].

use op_core::{ErrorEnvelope, ErrorKind, ExecutionOutcome, Payload};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::job_service::JobExecutionService;

#[derive(Clone)]
pub struct AnalysisExecutionService {
    jobs: Arc<JobExecutionService>,
}

impl AnalysisExecutionService {
    pub fn new(jobs: Arc<JobExecutionService>) -> Self {
        Self { jobs }
    }

    pub fn jobs(&self) -> &Arc<JobExecutionService> {
        &self.jobs
    }

    /// Create a job and run it immediately
    #[instrument(skip(self, payload))]
    pub async fn analyze(&self, plugin_name: &str, payload: Payload) -> ExecutionOutcome {
        let job_id = self.jobs.create_job(plugin_name, payload).await;

        match self.jobs.run_job(&job_id).await {
            Ok(outcome) => outcome,
            Err(err) => {
                // Another caller cancelled or started the job between create and run
                warn!(job_id = %job_id, error = %err, "Analysis job could not be run");
                match self.jobs.get_job(&job_id).await.ok().and_then(|job| job.outcome()) {
                    Some(outcome) => outcome,
                    None => ExecutionOutcome::Failure(ErrorEnvelope::new(
                        ErrorKind::ExecutionError,
                        err.to_string(),
                        Some(plugin_name),
                    )),
                }
            }
        }
    }

    /// Record a PENDING job without running it
    #[instrument(skip(self, payload))]
    pub async fn submit_analysis(&self, plugin_name: &str, payload: Payload) -> String {
        self.jobs.create_job(plugin_name, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::JobMetrics;
    use crate::plugin_service::PluginExecutionService;
    use op_core::JobStatus;
    use op_tools::{register_builtin_plugins, PluginRegistry, ToolRunner};
    use serde_json::json;

    fn analysis() -> AnalysisExecutionService {
        let registry = Arc::new(PluginRegistry::new());
        register_builtin_plugins(&registry);
        let plugins = Arc::new(PluginExecutionService::new(Arc::new(ToolRunner::with_defaults(
            registry,
        ))));
        let jobs = JobExecutionService::new(plugins, Arc::new(JobMetrics::new().unwrap()));
        AnalysisExecutionService::new(Arc::new(jobs))
    }

    #[tokio::test]
    async fn test_analyze_runs_to_completion() {
        let service = analysis();
        let request = json!({"x": 1}).as_object().cloned().unwrap();

        let outcome = service.analyze("echo", request.clone()).await;
        assert_eq!(outcome.result(), Some(&request));

        let jobs = service.jobs().list_jobs().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Success);
    }

    #[tokio::test]
    async fn test_analyze_unknown_plugin() {
        let service = analysis();
        let outcome = service.analyze("missing", Payload::new()).await;

        let error = outcome.error().unwrap();
        assert_eq!(error.kind, ErrorKind::PluginError);
        assert_eq!(error.plugin.as_deref(), Some("missing"));
    }

    #[tokio::test]
    async fn test_submit_leaves_job_pending() {
        let service = analysis();
        let job_id = service.submit_analysis("echo", Payload::new()).await;

        let job = service.jobs().get_job(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let outcome = service.jobs().run_job(&job_id).await.unwrap();
        assert!(outcome.is_success());
    }
}
