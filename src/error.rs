use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot reach search service: {0}")]
    Connection(String),

    #[error("Collection '{0}' does not exist")]
    MissingIndex(String),

    #[error("Search service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// How the caller should react to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the run.
    Fatal,
    /// Log it and carry on with the remaining work.
    Recoverable,
}

impl PipelineError {
    pub fn severity(&self) -> Severity {
        match self {
            PipelineError::Connection(_)
            | PipelineError::MissingIndex(_)
            | PipelineError::Io(_)
            | PipelineError::Csv(_)
            | PipelineError::Config(_)
            | PipelineError::Toml(_) => Severity::Fatal,
            PipelineError::Http(_)
            | PipelineError::Json(_)
            | PipelineError::Api { .. }
            | PipelineError::Storage(_) => Severity::Recoverable,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        assert!(PipelineError::Connection("refused".into()).is_fatal());
        assert!(PipelineError::MissingIndex("it-assets".into()).is_fatal());
        assert!(PipelineError::Config("CLOUD_URL is not set".into()).is_fatal());
        assert!(!PipelineError::Api { status: 409, message: "conflict".into() }.is_fatal());
        assert_eq!(
            PipelineError::Storage("poisoned".into()).severity(),
            Severity::Recoverable
        );
    }
}
