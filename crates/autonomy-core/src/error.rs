use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutonomyError {
    #[error("invalid thresholds: {0}")]
    InvalidThresholds(String),

    #[error("invalid id '{0}': must be lowercase alphanumeric with hyphens")]
    InvalidId(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("unknown benchmark dimension: {0}")]
    UnknownDimension(String),

    #[error("pattern already exists: {0}")]
    PatternExists(String),

    #[error("pattern not found: {0}")]
    PatternNotFound(String),

    #[error("adapter already registered for source: {0}")]
    AdapterExists(String),

    #[error("measurement of '{dimension}' failed: {reason}")]
    Measurement { dimension: String, reason: String },

    #[error("measurement of '{dimension}' timed out after {timeout_ms}ms")]
    MeasurementTimeout { dimension: String, timeout_ms: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AutonomyError>;
