use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepErrorKind {
    InvalidParams,
    Denied,
    NotFound,
    Conflict,
    Timeout,
    Retryable,
    Internal,
}

/// Infrastructure-level failure of a pipeline step: bad parameters, SSH/SFTP
/// transport problems, or classified protocol statuses. Application-level
/// failures reported by the remote utility are a separate type
/// (`GenevaError`) so callers can route them differently.
#[derive(Debug, Clone, Serialize)]
pub struct StepError {
    pub kind: StepErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl StepError {
    pub fn new(kind: StepErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(kind, StepErrorKind::Timeout | StepErrorKind::Retryable),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Denied, "DENIED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::NotFound, "NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Conflict, "CONFLICT", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Retryable, "RETRYABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StepErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for StepError {}

impl From<std::io::Error> for StepError {
    fn from(err: std::io::Error) -> Self {
        StepError::internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{StepError, StepErrorKind};

    #[test]
    fn timeout_and_retryable_kinds_are_retryable() {
        assert!(StepError::timeout("t").retryable);
        assert!(StepError::retryable("r").retryable);
        assert!(!StepError::not_found("n").retryable);
    }

    #[test]
    fn display_uses_message_only() {
        let err = StepError::invalid_params("bad input").with_hint("fix it");
        assert_eq!(err.to_string(), "bad input");
        assert_eq!(err.kind, StepErrorKind::InvalidParams);
    }
}
