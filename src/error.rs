//! Error types for the compute worker.

/// Top-level error type for the worker.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors talking to the coordinator over HTTP.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("Request to {endpoint} failed: {reason}")]
    Request { endpoint: String, reason: String },

    #[error("Coordinator returned {status} for {endpoint}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// Failures inside a task executor or the script sandbox. These never reach
/// [`Error`]: the dispatcher turns each one into an error result.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Invalid parameters for {kind}: {reason}")]
    InvalidParams { kind: &'static str, reason: String },

    #[error("Limit exceeded for {kind}: {reason}")]
    LimitExceeded { kind: &'static str, reason: String },

    #[error("Failed to spawn script runtime: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Executor panicked: {0}")]
    Panicked(String),
}

/// Result type alias for the worker.
pub type Result<T> = std::result::Result<T, Error>;
