//! Structured error types for waymark
//!
//! Every failure a tool or the model can produce maps onto one variant
//! here. Typed errors stay internal: before a result is handed back to
//! the model as an observation it is rendered to an `ERROR:`-tagged
//! string, so no error crosses the tool/model boundary as a panic or a
//! propagated exception.

use thiserror::Error;

/// Primary error type for waymark operations
#[derive(Error, Debug)]
pub enum AgentError {
    /// A required tool argument is missing
    #[error("missing argument '{key}' for {tool}")]
    InvalidArgument { tool: String, key: String },

    /// A tool path resolved outside the project root
    #[error("path outside project: {path}")]
    SandboxViolation { path: String },

    /// The target file does not exist
    #[error("file not found: {path}")]
    NotFound { path: String },

    /// Arithmetic input failed the allow-list or the evaluator
    #[error("{0}")]
    EvaluationFailure(String),

    /// The agent loop hit its iteration cap
    #[error("exceeded tool loop limit")]
    LoopExhausted { limit: usize },

    /// The model backend rejected or failed the request
    #[error("provider error: {0}")]
    Provider(String),

    /// Filesystem error surfaced by a tool body
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Render this error as the tagged observation string the model
    /// (and the user, on direct-command paths) sees.
    pub fn to_observation(&self) -> String {
        format!("ERROR: {self}")
    }
}
