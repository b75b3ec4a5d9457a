use op_core::config::DEFAULT_JOB_EVENT_CAPACITY;
use op_core::{Error, ExecutionOutcome, JobStatus, Payload, Result};
use op_tools::envelope::cancelled_envelope;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, instrument, warn};

use crate::job::JobRecord;
use crate::metrics::JobMetrics;
use crate::plugin_service::PluginExecutionService;

/// Event emitted when a job changes state
#[derive(Clone, Debug)]
pub enum JobEvent {
    Created(JobRecord),
    Started(String),
    Completed(JobRecord),
    Cancelled(JobRecord),
}

/// Owns in-memory job records and drives them through
/// `PENDING -> RUNNING -> SUCCESS | FAILED`.
///
/// Records live for the lifetime of the service; nothing is persisted.
#[derive(Clone)]
pub struct JobExecutionService {
    jobs: Arc<RwLock<HashMap<String, JobRecord>>>,

    next_sequence: Arc<AtomicU64>,

    plugins: Arc<PluginExecutionService>,

    metrics: Arc<JobMetrics>,

    event_sender: broadcast::Sender<JobEvent>,
}

impl JobExecutionService {
    pub fn new(plugins: Arc<PluginExecutionService>, metrics: Arc<JobMetrics>) -> Self {
        Self::with_event_capacity(plugins, metrics, DEFAULT_JOB_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(
        plugins: Arc<PluginExecutionService>,
        metrics: Arc<JobMetrics>,
        capacity: usize,
    ) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            next_sequence: Arc::new(AtomicU64::new(0)),
            plugins,
            metrics,
            event_sender: tx,
        }
    }

    /// Subscribe to job events
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_sender.subscribe()
    }

    pub fn metrics(&self) -> &Arc<JobMetrics> {
        &self.metrics
    }

    pub fn plugin_service(&self) -> &Arc<PluginExecutionService> {
        &self.plugins
    }

    /// Store a new PENDING job and return its id
    #[instrument(skip(self, payload))]
    pub async fn create_job(&self, plugin_name: &str, payload: Payload) -> String {
        let mut job = JobRecord::new(plugin_name, payload);
        let job_id = job.id.clone();

        {
            let mut jobs = self.jobs.write().await;
            job.sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
            jobs.insert(job_id.clone(), job.clone());
        }
        self.metrics.job_created();
        let _ = self.event_sender.send(JobEvent::Created(job));

        info!(job_id = %job_id, plugin = %plugin_name, "Created job");
        job_id
    }

    /// Run a PENDING job to completion.
    ///
    /// Fails with `JobNotFound` for unknown ids and `JobConflict` for jobs
    /// that already left PENDING. If the job is cancelled while the plugin
    /// runs, the late outcome is discarded and the cancelled outcome is
    /// returned.
    #[instrument(skip(self))]
    pub async fn run_job(&self, job_id: &str) -> Result<ExecutionOutcome> {
        let (plugin_name, payload) = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(job_id)
                .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;
            if job.status != JobStatus::Pending {
                return Err(Error::JobConflict {
                    id: job_id.to_string(),
                    status: job.status,
                });
            }
            job.start();
            (job.plugin.clone(), job.payload.clone())
        };

        self.metrics.job_started();
        let _ = self.event_sender.send(JobEvent::Started(job_id.to_string()));
        info!(job_id = %job_id, plugin = %plugin_name, "Job running");

        let started = Instant::now();
        let outcome = self.plugins.execute(&plugin_name, payload).await;

        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

        if job.status != JobStatus::Running {
            warn!(
                job_id = %job_id,
                status = %job.status,
                success = outcome.is_success(),
                "Discarding late outcome for cancelled job"
            );
            return Ok(job.outcome().unwrap_or(outcome));
        }

        job.finish(outcome.clone());
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.metrics.job_finished(outcome.is_success(), elapsed_ms);
        let _ = self.event_sender.send(JobEvent::Completed(job.clone()));

        info!(
            job_id = %job_id,
            status = %job.status,
            elapsed_ms,
            "Job finished"
        );
        Ok(outcome)
    }

    pub async fn get_job(&self, job_id: &str) -> Result<JobRecord> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))
    }

    /// All jobs in creation order
    pub async fn list_jobs(&self) -> Vec<JobRecord> {
        let mut jobs: Vec<_> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.sequence);
        jobs
    }

    /// Force a non-terminal job to FAILED with a cancelled error.
    ///
    /// Terminal jobs are left untouched and reported as a conflict. An
    /// in-flight plugin call is not interrupted.
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: &str) -> Result<JobRecord> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| Error::JobNotFound(job_id.to_string()))?;

        if job.status.is_terminal() {
            return Err(Error::JobConflict {
                id: job_id.to_string(),
                status: job.status,
            });
        }

        let was_running = job.status == JobStatus::Running;
        job.finish(ExecutionOutcome::Failure(cancelled_envelope(&job.plugin)));
        self.metrics.job_cancelled(was_running);
        let _ = self.event_sender.send(JobEvent::Cancelled(job.clone()));

        info!(job_id = %job_id, was_running, "Job cancelled");
        Ok(job.clone())
    }
}
