//! Resource graph error types

use thiserror::Error;

/// Resource graph errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Resource declared twice: {0}")]
    DuplicateResource(String),

    #[error("Resource '{resource}' references undeclared resource '{target}'")]
    UnknownReference { resource: String, target: String },

    #[error("Cyclic dependency detected in resource graph: {0}")]
    CyclicDependency(String),

    #[error("Output '{resource}.{attribute}' is not available yet")]
    OutputUnavailable { resource: String, attribute: String },

    #[error("Output '{resource}.{attribute}' is not a scalar and cannot be interpolated")]
    NotInterpolable { resource: String, attribute: String },

    #[error("Lookup '{lookup}' failed: {reason}")]
    LookupFailed { lookup: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State snapshot error: {0}")]
    StateError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
