//! Error envelope construction
//!
//! Every failure that leaves the runner is turned into an [`ErrorEnvelope`]
//! here. Classification walks the `anyhow` cause chain looking for an
//! [`op_core::Error`]; anything without one is an `ExecutionError`.

use op_core::{Error, ErrorEnvelope, ErrorKind};
use serde_json::{json, Value};
use std::any::Any;

/// Deterministic classification of a plugin failure
pub fn classify(err: &anyhow::Error) -> ErrorKind {
    find_core_error(err)
        .map(Error::kind)
        .unwrap_or(ErrorKind::ExecutionError)
}

/// Build the envelope for any error raised during an invocation
pub fn build_error_envelope(err: &anyhow::Error, plugin: Option<&str>) -> ErrorEnvelope {
    let core = find_core_error(err);
    let kind = core.map(Error::kind).unwrap_or(ErrorKind::ExecutionError);
    let message = core.map(Error::message).unwrap_or_else(|| err.to_string());

    let mut envelope = ErrorEnvelope::new(kind, message, plugin).with_diagnostic(format!("{:?}", err));
    if let Some(Error::Timeout { timeout_ms, .. }) = core {
        envelope = envelope.with_detail("timeout_ms", json!(timeout_ms));
    }
    envelope
}

/// Envelope for a request payload rejected before invocation
pub fn validation_envelope(errors: &[String], plugin: Option<&str>) -> ErrorEnvelope {
    let message = format!("Invalid request payload: {}", errors.join("; "));
    ErrorEnvelope::new(ErrorKind::ValidationError, message, plugin)
        .with_detail("errors", Value::from(errors.to_vec()))
}

/// Envelope stored on a job that was cancelled before reaching a terminal state
pub fn cancelled_envelope(plugin: &str) -> ErrorEnvelope {
    ErrorEnvelope::new(ErrorKind::ExecutionError, "Job cancelled", Some(plugin))
        .with_detail("cancelled", json!(true))
}

/// Text carried by a caught panic
pub fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

fn find_core_error(err: &anyhow::Error) -> Option<&Error> {
    err.chain().find_map(|cause| cause.downcast_ref::<Error>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_plain_error_is_execution_error() {
        let err = anyhow::anyhow!("kaboom");
        let envelope = build_error_envelope(&err, Some("boom"));

        assert_eq!(envelope.kind, ErrorKind::ExecutionError);
        assert_eq!(envelope.message, "kaboom");
        assert_eq!(envelope.plugin.as_deref(), Some("boom"));
        assert!(envelope.details.is_empty());
        assert!(envelope.diagnostic.is_some());
    }

    #[test]
    fn test_core_errors_classified() {
        let err = anyhow::Error::new(Error::plugin("model file corrupt"));
        assert_eq!(classify(&err), ErrorKind::PluginError);
        assert_eq!(build_error_envelope(&err, None).message, "model file corrupt");

        let err = anyhow::Error::new(Error::validation("bad roi"));
        assert_eq!(classify(&err), ErrorKind::ValidationError);

        let err = anyhow::Error::new(Error::output_validation("not an object"));
        assert_eq!(classify(&err), ErrorKind::ValidationError);
    }

    #[test]
    fn test_classification_sees_through_context() {
        let err = Err::<(), _>(Error::plugin("decoder failed"))
            .context("while reading frame 3")
            .unwrap_err();
        assert_eq!(classify(&err), ErrorKind::PluginError);
        assert_eq!(build_error_envelope(&err, None).message, "decoder failed");
    }

    #[test]
    fn test_timeout_details() {
        let err = anyhow::Error::new(Error::Timeout {
            plugin: "slow".into(),
            timeout_ms: 50,
        });
        let envelope = build_error_envelope(&err, Some("slow"));
        assert_eq!(envelope.kind, ErrorKind::ExecutionError);
        assert_eq!(envelope.details["timeout_ms"], json!(50));
    }

    #[test]
    fn test_validation_envelope() {
        let errors = vec!["Missing required field: image".to_string()];
        let envelope = validation_envelope(&errors, Some("detect"));
        assert_eq!(envelope.kind, ErrorKind::ValidationError);
        assert_eq!(envelope.details["errors"], json!(["Missing required field: image"]));
    }

    #[test]
    fn test_cancelled_envelope() {
        let envelope = cancelled_envelope("echo");
        assert!(envelope.is_cancelled());
        assert_eq!(envelope.plugin.as_deref(), Some("echo"));
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("index out of bounds");
        assert_eq!(panic_message(boxed.as_ref()), "index out of bounds");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }
}
