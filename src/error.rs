//! Error types shared across the crate

use thiserror::Error;

/// Errors surfaced by ecosphere operations
#[derive(Error, Debug)]
pub enum EcoError {
    /// A component was used without the collaborator it depends on
    /// (missing simulation, uninitialized resource pool)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The ecosystem graph failed boundary validation
    #[error("validation error: {0}")]
    Validation(String),

    /// An I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A YAML document could not be read
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for ecosphere operations
pub type EcoResult<T> = Result<T, EcoError>;
