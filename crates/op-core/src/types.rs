//! Common types used across op-runtime

use chrono::Utc;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Request and response mapping exchanged with plugins
pub type Payload = Map<String, Value>;

/// Process-health state of a registered plugin.
///
/// Distinct from [`JobStatus`]; the two must never share names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    /// Registered, never executed
    #[default]
    Loaded,
    /// Completed at least one execution successfully
    Initialized,
    /// Execution in progress
    Running,
    /// Most recent execution failed
    Failed,
    /// Plugin could not be resolved or reports itself unavailable
    Unavailable,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Loaded => write!(f, "LOADED"),
            LifecycleState::Initialized => write!(f, "INITIALIZED"),
            LifecycleState::Running => write!(f, "RUNNING"),
            LifecycleState::Failed => write!(f, "FAILED"),
            LifecycleState::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}

/// Outcome state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    /// Terminal states are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "PENDING"),
            JobStatus::Running => write!(f, "RUNNING"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Closed classification of failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input before invocation or malformed output after it
    ValidationError,
    /// Plugin not found, unavailable, or signalled a domain failure
    PluginError,
    /// Anything else raised during invocation
    ExecutionError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::ValidationError => write!(f, "ValidationError"),
            ErrorKind::PluginError => write!(f, "PluginError"),
            ErrorKind::ExecutionError => write!(f, "ExecutionError"),
        }
    }
}

/// Structured failure record, safe to hand to external callers.
///
/// `diagnostic` carries the internal error chain for logs and is never
/// serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default)]
    pub details: Payload,
    #[serde(default)]
    pub plugin: Option<String>,
    pub timestamp: String,
    #[serde(skip)]
    pub diagnostic: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(kind: ErrorKind, message: impl Into<String>, plugin: Option<&str>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Payload::new(),
            plugin: plugin.map(str::to_string),
            timestamp: Utc::now().to_rfc3339(),
            diagnostic: None,
        }
    }

    /// Add a single detail entry
    pub fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.details.insert(key.to_string(), value);
        self
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    /// Whether this envelope marks a cancelled job
    pub fn is_cancelled(&self) -> bool {
        self.details.get("cancelled") == Some(&Value::Bool(true))
    }
}

/// Exactly one of a result or an error.
///
/// Serializes as `{"result": {...}, "error": {...}}` with the absent side
/// rendered as an empty object. An empty success therefore reads as
/// `{"result": {}, "error": {}}`; a failure is recognised by the `type`
/// key every error envelope carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Success(Payload),
    Failure(ErrorEnvelope),
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Success(_))
    }

    pub fn result(&self) -> Option<&Payload> {
        match self {
            ExecutionOutcome::Success(result) => Some(result),
            ExecutionOutcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorEnvelope> {
        match self {
            ExecutionOutcome::Success(_) => None,
            ExecutionOutcome::Failure(error) => Some(error),
        }
    }

    /// Split into the `(result, error)` pair; the result is empty on failure
    pub fn into_parts(self) -> (Payload, Option<ErrorEnvelope>) {
        match self {
            ExecutionOutcome::Success(result) => (result, None),
            ExecutionOutcome::Failure(error) => (Payload::new(), Some(error)),
        }
    }
}

impl Serialize for ExecutionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let empty = Payload::new();
        let mut state = serializer.serialize_struct("ExecutionOutcome", 2)?;
        match self {
            ExecutionOutcome::Success(result) => {
                state.serialize_field("result", result)?;
                state.serialize_field("error", &empty)?;
            }
            ExecutionOutcome::Failure(error) => {
                state.serialize_field("result", &empty)?;
                state.serialize_field("error", error)?;
            }
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lifecycle_state_wire_names() {
        assert_eq!(serde_json::to_value(LifecycleState::Loaded).unwrap(), json!("LOADED"));
        assert_eq!(
            serde_json::to_value(LifecycleState::Unavailable).unwrap(),
            json!("UNAVAILABLE")
        );
        assert_eq!(LifecycleState::Initialized.to_string(), "INITIALIZED");
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Success.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert_eq!(serde_json::to_value(JobStatus::Success).unwrap(), json!("SUCCESS"));
    }

    #[test]
    fn test_envelope_hides_diagnostic() {
        let envelope = ErrorEnvelope::new(ErrorKind::ExecutionError, "kaboom", Some("boom"))
            .with_diagnostic("stack frames");
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], json!("ExecutionError"));
        assert_eq!(value["message"], json!("kaboom"));
        assert_eq!(value["plugin"], json!("boom"));
        assert!(value.get("diagnostic").is_none());
        assert!(chrono::DateTime::parse_from_rfc3339(value["timestamp"].as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_outcome_wire_shape() {
        let mut result = Payload::new();
        result.insert("x".into(), json!(1));
        let value = serde_json::to_value(ExecutionOutcome::Success(result)).unwrap();
        assert_eq!(value, json!({"result": {"x": 1}, "error": {}}));

        let failure = ExecutionOutcome::Failure(ErrorEnvelope::new(
            ErrorKind::PluginError,
            "nope",
            None,
        ));
        let value = serde_json::to_value(&failure).unwrap();
        assert_eq!(value["result"], json!({}));
        assert_eq!(value["error"]["type"], json!("PluginError"));

        let (result, error) = failure.into_parts();
        assert!(result.is_empty());
        assert!(error.is_some());
    }

    #[test]
    fn test_empty_success_is_still_success() {
        let outcome = ExecutionOutcome::Success(Payload::new());
        assert!(outcome.is_success());
        assert!(outcome.error().is_none());

        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value, json!({"result": {}, "error": {}}));
        assert!(value["error"].get("type").is_none());
    }

    #[test]
    fn test_cancelled_flag() {
        let envelope = ErrorEnvelope::new(ErrorKind::ExecutionError, "cancelled", None)
            .with_detail("cancelled", json!(true));
        assert!(envelope.is_cancelled());
    }
}
