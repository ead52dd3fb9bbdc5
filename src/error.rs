//! Error types for Brain Gym

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// API error
    #[error("API error: {0}")]
    Api(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Blocking task failed to complete
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// A thread panicked while holding the database connection
    #[error("Database connection lock poisoned")]
    LockPoisoned,

    /// Not found error
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for Core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors returned when establishing a passive award session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Username must not be empty")]
    InvalidUsername,

    /// Not exceptional: a duplicate start leaves the existing loop untouched
    #[error("Award session already running for {0}")]
    AlreadyRunning(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] CoreError),
}
