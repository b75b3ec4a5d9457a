use chrono::{DateTime, Utc};
use op_core::{ErrorEnvelope, ExecutionOutcome, JobStatus, Payload};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tracked unit of work binding a plugin and payload to an eventual
/// result or error
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobRecord {
    /// Unique job ID
    pub id: String,

    /// Creation order within the owning service
    #[serde(default)]
    pub sequence: u64,

    /// Plugin name the job runs against
    pub plugin: String,

    /// Request payload, fixed at creation
    pub payload: Payload,

    pub status: JobStatus,

    /// Set only when status is SUCCESS
    pub result: Option<Payload>,

    /// Set only when status is FAILED
    pub error: Option<ErrorEnvelope>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a new pending job
    pub fn new(plugin: &str, payload: Payload) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            sequence: 0,
            plugin: plugin.to_string(),
            payload,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn start(&mut self) {
        self.status = JobStatus::Running;
        self.updated_at = Utc::now();
    }

    /// Move to the terminal state matching the outcome
    pub(crate) fn finish(&mut self, outcome: ExecutionOutcome) {
        match outcome {
            ExecutionOutcome::Success(result) => {
                self.status = JobStatus::Success;
                self.result = Some(result);
                self.error = None;
            }
            ExecutionOutcome::Failure(error) => {
                self.status = JobStatus::Failed;
                self.result = None;
                self.error = Some(error);
            }
        }
        self.updated_at = Utc::now();
    }

    /// Terminal outcome, if the job has one
    pub fn outcome(&self) -> Option<ExecutionOutcome> {
        match (self.status, &self.result, &self.error) {
            (JobStatus::Success, Some(result), _) => Some(ExecutionOutcome::Success(result.clone())),
            (JobStatus::Failed, _, Some(error)) => Some(ExecutionOutcome::Failure(error.clone())),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(ErrorEnvelope::is_cancelled)
    }

    /// Run time from creation to last update, once terminal
    pub fn duration_ms(&self) -> Option<u64> {
        self.status.is_terminal().then(|| {
            (self.updated_at - self.created_at)
                .num_milliseconds()
                .max(0) as u64
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use op_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_new_job_is_pending() {
        let job = JobRecord::new("echo", Payload::new());
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.result.is_none());
        assert!(job.error.is_none());
        assert!(job.outcome().is_none());
        assert!(job.duration_ms().is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_finish_keeps_result_and_error_exclusive() {
        let mut job = JobRecord::new("echo", Payload::new());
        job.start();
        assert_eq!(job.status, JobStatus::Running);

        let mut result = Payload::new();
        result.insert("x".into(), json!(1));
        job.finish(ExecutionOutcome::Success(result.clone()));
        assert_eq!(job.status, JobStatus::Success);
        assert_eq!(job.result, Some(result));
        assert!(job.error.is_none());
        assert!(job.outcome().unwrap().is_success());

        let mut job = JobRecord::new("boom", Payload::new());
        job.finish(ExecutionOutcome::Failure(ErrorEnvelope::new(
            ErrorKind::ExecutionError,
            "kaboom",
            Some("boom"),
        )));
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.result.is_none());
        assert_eq!(job.error.as_ref().unwrap().message, "kaboom");
        assert!(!job.is_cancelled());
    }

    #[test]
    fn test_unique_ids() {
        let a = JobRecord::new("echo", Payload::new());
        let b = JobRecord::new("echo", Payload::new());
        assert_ne!(a.id, b.id);
    }
}
