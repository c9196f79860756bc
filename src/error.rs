use thiserror::Error;

/// Error type for language detection and report analysis.
#[derive(Debug, Error)]
pub enum LarkError {
    /// Input text could not be converted to token ids.
    #[error("Tokenization error: {0}")]
    Tokenization(String),

    /// The scoring backend failed or returned malformed output.
    #[error("Scoring unavailable: {message}")]
    ScoringUnavailable {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Model weights could not be loaded.
    #[error("Failed to load weights from '{path}': {message}")]
    WeightsLoad { path: String, message: String },

    /// A caller-supplied parameter is out of range.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration or label file is unreadable or malformed.
    #[error("Config error: {0}")]
    Config(String),

    /// File access failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LarkError {
    pub fn scoring(message: impl Into<String>) -> Self {
        LarkError::ScoringUnavailable {
            message: message.into(),
            source: None,
        }
    }
}

impl From<candle_core::Error> for LarkError {
    fn from(err: candle_core::Error) -> Self {
        LarkError::ScoringUnavailable {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for LarkError {
    fn from(err: serde_json::Error) -> Self {
        LarkError::Config(format!("JSON error: {}", err))
    }
}
