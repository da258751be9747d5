//! Error types for mail-triage.

use std::time::Duration;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors while obtaining mailbox credentials. Always fatal to a run.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Token file {path} could not be read: {reason}")]
    TokenUnreadable { path: String, reason: String },

    #[error("Token file {path} has no usable access or refresh token")]
    NoCredentials { path: String },

    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("Failed to persist refreshed token: {0}")]
    Persist(String),
}

/// Mail provider errors. Recoverable per message unless raised at startup.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("Request to {endpoint} failed: {reason}")]
    RequestFailed { endpoint: String, reason: String },

    #[error("{endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },

    #[error("Failed to build draft: {0}")]
    DraftBuild(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a yes/no classification or reply generation.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("Unparseable answer: {0:?}")]
    Unparseable(String),

    #[error("Empty completion")]
    Empty,
}

/// A single message could not be triaged. The run continues with the next.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to load metadata: {0}")]
    Metadata(#[source] MailError),

    #[error("{stage} check failed: {source}")]
    Classifier {
        stage: &'static str,
        #[source]
        source: ClassifierError,
    },

    #[error("failed to create draft: {0}")]
    DraftCreation(#[source] MailError),
}

/// Failure of the external draft editor.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    #[error("Editor I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Editor {command} exited with {status}")]
    ExitStatus { command: String, status: String },

    #[error("No editor command configured")]
    NoCommand,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_error_wraps_llm_error() {
        let err: ClassifierError = LlmError::Timeout {
            provider: "openai-compat".into(),
            timeout: Duration::from_secs(15),
        }
        .into();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn metadata_error_keeps_mail_source() {
        use std::error::Error as _;

        let err = PipelineError::Metadata(MailError::Status {
            endpoint: "messages.get".into(),
            status: 404,
            body: "not found".into(),
        });
        assert!(err.to_string().contains("404"));
        assert!(err.source().is_some_and(|s| s.is::<MailError>()));
    }

    #[test]
    fn pipeline_error_names_stage() {
        let err = PipelineError::Classifier {
            stage: "relevance",
            source: ClassifierError::Unparseable("Maybe".into()),
        };
        assert_eq!(err.to_string(), "relevance check failed: Unparseable answer: \"Maybe\"");
    }
}
