use thiserror::Error;

/// Triage error types
#[derive(Error, Debug)]
pub enum TriageError {
    /// A required column is missing from the input table
    #[error("Missing required column: '{field}'")]
    Schema { field: String },

    /// The text classifier could not be loaded or could not predict
    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    /// Model training failed
    #[error("Training error: {0}")]
    Training(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Tabular read/write errors
    #[error("CSV error: {0}")]
    Csv(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TriageError {
    /// Build a schema error for a missing column
    pub fn missing_field(field: impl Into<String>) -> Self {
        TriageError::Schema {
            field: field.into(),
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            TriageError::Schema { .. } => "SCHEMA_ERROR",
            TriageError::ClassifierUnavailable(_) => "CLASSIFIER_UNAVAILABLE",
            TriageError::Training(_) => "TRAINING_ERROR",
            TriageError::Configuration(_) => "CONFIGURATION_ERROR",
            TriageError::Validation(_) => "VALIDATION_ERROR",
            TriageError::Io(_) => "IO_ERROR",
            TriageError::Csv(_) => "CSV_ERROR",
            TriageError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Whether this error is the fatal schema failure of a triage run
    pub fn is_schema_error(&self) -> bool {
        matches!(self, TriageError::Schema { .. })
    }
}

/// Conversion from csv::Error
impl From<csv::Error> for TriageError {
    fn from(err: csv::Error) -> Self {
        TriageError::Csv(err.to_string())
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for TriageError {
    fn from(err: serde_json::Error) -> Self {
        TriageError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for TriageError {
    fn from(err: bincode::Error) -> Self {
        TriageError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for TriageError {
    fn from(err: validator::ValidationErrors) -> Self {
        TriageError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for TriageError {
    fn from(err: config::ConfigError) -> Self {
        TriageError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, TriageError>;
