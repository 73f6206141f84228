//! Error types for the blue_carbon_credits library

use thiserror::Error;

/// Result type alias for blue_carbon_credits operations
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Comprehensive error types for vegetation analysis and credit calculation
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Image bytes could not be decoded
    #[error("Failed to load image: {message}")]
    ImageLoadError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Decoded image has no pixels
    #[error("Image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// Invalid input parameters
    #[error("Invalid parameter: {parameter} = {value}")]
    InvalidParameter { parameter: String, value: String },

    /// A pipeline stage produced a value it cannot stand behind
    #[error("Computation failed in {stage}: {message}")]
    ComputationError { stage: String, message: String },

    /// Configuration could not be read, written or validated
    #[error("Configuration error: {message}")]
    ConfigError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl AnalysisError {
    /// Create an image load error with context
    pub fn image_load<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ImageLoadError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error with context
    pub fn config<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ConfigError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a computation error for the named stage
    pub fn computation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ComputationError {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create an invalid parameter error
    pub fn invalid_parameter(parameter: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value: value.to_string(),
        }
    }

    /// Check if this error indicates a recoverable condition
    ///
    /// Recoverable errors are absorbed by the credit pipeline, which substitutes
    /// a neutral default for the failed stage and keeps going.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AnalysisError::ComputationError { .. } | AnalysisError::EmptyImage { .. }
        )
    }

    /// Get user-friendly error description for application display
    pub fn user_message(&self) -> String {
        match self {
            AnalysisError::ImageLoadError { .. } => {
                "Could not read the uploaded image. Please check the file format and try again.".to_string()
            }
            AnalysisError::EmptyImage { .. } => {
                "The uploaded image is empty.".to_string()
            }
            AnalysisError::InvalidParameter { parameter, value } => {
                format!("The value '{}' is not valid for {}.", value, parameter)
            }
            AnalysisError::ConfigError { .. } => {
                "The calculator configuration is invalid.".to_string()
            }
            _ => "Credit calculation failed. Please try with different images.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(AnalysisError::computation("co2", "nan").is_recoverable());
        assert!(AnalysisError::EmptyImage { width: 0, height: 0 }.is_recoverable());
        assert!(!AnalysisError::invalid_parameter("area", -1.0).is_recoverable());
    }

    #[test]
    fn test_display_includes_context() {
        let err = AnalysisError::invalid_parameter("project_area_hectares", 0.0);
        assert_eq!(err.to_string(), "Invalid parameter: project_area_hectares = 0");

        let err = AnalysisError::computation("distribution", "total is NaN");
        assert!(err.to_string().contains("distribution"));
    }

    #[test]
    fn test_user_message() {
        let err = AnalysisError::invalid_parameter("time_period_years", -2.0);
        assert!(err.user_message().contains("time_period_years"));
    }
}
