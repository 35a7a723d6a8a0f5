use thiserror::Error;

use super::StepError;

/// Application-level failure reported by the remote runrep utility: a stderr
/// line matched one of the error keywords. Carries the matching line verbatim
/// and the redacted command only, so the credential-bearing text never reaches
/// logs or attributes.
#[derive(Debug, Clone, Error)]
#[error("{message}: {geneva_error}")]
pub struct GenevaError {
    message: String,
    geneva_error: String,
    command: String,
}

impl GenevaError {
    pub fn new(
        message: impl Into<String>,
        geneva_error: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            geneva_error: geneva_error.into(),
            command: command.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The remote tool's own error line, exactly as read from stderr.
    pub fn geneva_error(&self) -> &str {
        &self.geneva_error
    }

    /// The redacted command that produced the failure.
    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn detailed_report(&self) -> String {
        format!(
            "Error occurred during command execution: {}\nError Message: {}\nDetailed Message: {}",
            self.command, self.geneva_error, self.message
        )
    }
}

/// Outcome of `execute`: the remote tool reported a business failure, or the
/// transport failed. Kept as two arms so callers can route work items to
/// different failure paths.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Geneva(#[from] GenevaError),
    #[error(transparent)]
    Transport(#[from] StepError),
}

#[cfg(test)]
mod tests {
    use super::GenevaError;

    #[test]
    fn display_combines_message_and_remote_line() {
        let err = GenevaError::new("Failed to run command in runrep", "Error: bad report", "cmd");
        assert_eq!(
            err.to_string(),
            "Failed to run command in runrep: Error: bad report"
        );
    }

    #[test]
    fn detailed_report_includes_command_and_remote_line() {
        let err = GenevaError::new("msg", "remote line", "redacted cmd");
        let report = err.detailed_report();
        assert!(report.contains("redacted cmd"));
        assert!(report.contains("remote line"));
    }
}
