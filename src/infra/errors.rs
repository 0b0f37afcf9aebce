// src/infra/errors.rs — Error types for selfevolve

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelfEvolveError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Configuration errors (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown {kind} '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    // External collaborators
    #[error("Evaluator failed: {0}")]
    Evaluator(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    // Persistence
    #[error("Failed to write {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt result record at {}: {content:?}", path.display())]
    CorruptRecord { path: PathBuf, content: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SelfEvolveError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            SelfEvolveError::Provider {
                retriable: true,
                ..
            } | SelfEvolveError::RateLimited { .. }
        )
    }

    /// Wrap an IO error with the path it happened on.
    pub fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SelfEvolveError::Persistence {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SelfEvolveError>;
