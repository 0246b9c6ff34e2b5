//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A store could not be reached or refused the liveness check.
    #[error("Connection to {store} failed: {message}")]
    Connection { store: String, message: String },

    /// Reading from the source cursor failed mid-stream.
    #[error("Source read failed: {0}")]
    Source(String),

    /// A flush to a destination relation failed.
    #[error("Write failed for relation {relation}: {message}")]
    Write { relation: String, message: String },

    /// The pipeline driver was asked to make an illegal phase transition.
    #[error("Invalid pipeline transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was interrupted (SIGINT, SIGTERM).
    #[error("Migration cancelled after {processed} documents")]
    Cancelled { processed: u64 },
}

impl MigrateError {
    /// Create a Connection error for the named store.
    pub fn connection(store: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            store: store.into(),
            message: message.to_string(),
        }
    }

    /// Create a Write error for the named relation.
    pub fn write(relation: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Write {
            relation: relation.into(),
            message: message.to_string(),
        }
    }

    /// Create a Source error.
    pub fn source(message: impl ToString) -> Self {
        MigrateError::Source(message.to_string())
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } => 3,
            MigrateError::Source(_) | MigrateError::Write { .. } => 4,
            MigrateError::Cancelled { .. } => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
