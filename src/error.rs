use std::io;

use thiserror::Error;

use crate::config::ConfigError;
use crate::query::{CompileError, Value};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, JobscopeError>;

/// Errors surfaced by the board and its collaborators.
#[derive(Debug, Error)]
pub enum JobscopeError {
    /// Filesystem failure while reading or materializing a dataset.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Criteria could not be compiled.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// The relational engine rejected or failed a statement.
    #[error("query failed: {source} (sql: {sql}; params: {params:?})")]
    QueryFailed {
        /// Statement text.
        sql: String,
        /// Bound parameters.
        params: Vec<Value>,
        /// Engine error.
        #[source]
        source: rusqlite::Error,
    },
    /// The dataset could not be fetched or opened. Shared by every caller
    /// that waited on the same attempt.
    #[error("dataset load attempt {attempt} failed: {reason}")]
    DatasetLoad {
        /// 1-based attempt number.
        attempt: u64,
        /// Failure description.
        reason: String,
    },
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// A statement ran but its result did not have the expected shape.
    #[error("unexpected result: {detail} (sql: {sql})")]
    UnexpectedResult {
        /// Statement text.
        sql: String,
        /// What was wrong with the result.
        detail: String,
    },
    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// Caller supplied an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A result could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl JobscopeError {
    /// Wraps an engine error with the statement that triggered it.
    pub fn query_failed(sql: &str, params: &[Value], source: rusqlite::Error) -> Self {
        JobscopeError::QueryFailed {
            sql: sql.to_owned(),
            params: params.to_vec(),
            source,
        }
    }

    /// Machine-readable code for CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            JobscopeError::Io(_) => "Io",
            JobscopeError::Compile(err) => err.code(),
            JobscopeError::QueryFailed { .. } => "QueryFailed",
            JobscopeError::DatasetLoad { .. } => "DatasetLoad",
            JobscopeError::Config(_) => "Config",
            JobscopeError::UnexpectedResult { .. } => "UnexpectedResult",
            JobscopeError::Task(_) => "Task",
            JobscopeError::InvalidArgument(_) => "InvalidArgument",
            JobscopeError::Serialization(_) => "Serialization",
        }
    }
}

impl From<serde_json::Error> for JobscopeError {
    fn from(err: serde_json::Error) -> Self {
        JobscopeError::Serialization(err.to_string())
    }
}
