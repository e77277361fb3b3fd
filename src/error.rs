//! Error types for the autoreg pipeline

use thiserror::Error;

/// Result type alias for autoreg operations
pub type Result<T> = std::result::Result<T, AutoRegError>;

/// Main error type shared by every pipeline stage.
///
/// The facade never wraps these: whatever a stage returns reaches the caller as-is.
#[derive(Error, Debug)]
pub enum AutoRegError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Target column not found: {0}")]
    TargetNotFound(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("No acceptable model: best was {model} with r2 = {score:.4}, expected at least {threshold:.4}")]
    NoAcceptableModel {
        model: String,
        score: f64,
        threshold: f64,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AutoRegError {
    /// Shorthand for an [`AutoRegError::InvalidParameter`].
    pub fn invalid_parameter(
        name: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        AutoRegError::InvalidParameter {
            name: name.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<polars::error::PolarsError> for AutoRegError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutoRegError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AutoRegError {
    fn from(err: serde_json::Error) -> Self {
        AutoRegError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutoRegError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutoRegError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoRegError::TargetNotFound("price".to_string());
        assert_eq!(err.to_string(), "Target column not found: price");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoRegError = io_err.into();
        assert!(matches!(err, AutoRegError::IoError(_)));
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = AutoRegError::invalid_parameter("sep", ";;", "must be a single byte");
        assert_eq!(err.to_string(), "Invalid parameter: sep = ;;, must be a single byte");
    }

    #[test]
    fn test_no_acceptable_model_display() {
        let err = AutoRegError::NoAcceptableModel {
            model: "Ridge".to_string(),
            score: 0.41,
            threshold: 0.6,
        };
        assert!(err.to_string().contains("Ridge"));
        assert!(err.to_string().contains("0.6000"));
    }
}
