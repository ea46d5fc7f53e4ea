use crate::error::{Result, TriageError};
use crate::ml::{FeatureConfig, ModelType, TrainingOptions};
use crate::models::TableSchema;
use crate::pipeline::TriageSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "BUG_TRIAGE_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/bug-triage.toml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Triage run configuration
    #[validate(nested)]
    pub triage: TriageConfig,

    /// Model training and loading configuration
    #[validate(nested)]
    pub model: ModelConfig,

    /// Observability configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, the file named by
    /// `BUG_TRIAGE_CONFIG` (if it exists) and `BUG_TRIAGE__*` variables
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_layered(Path::new(&path), false)
    }

    /// Load configuration with an explicit file that must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::load_layered(path, true)
    }

    fn load_layered(path: &Path, required: bool) -> Result<Self> {
        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::from(path).required(required))
            // Override with environment variables (prefix: BUG_TRIAGE__)
            .add_source(
                config::Environment::with_prefix("BUG_TRIAGE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.check()?;
        Ok(config)
    }

    /// Validate field ranges and cross-field constraints
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        self.model.features.check()?;
        if self.triage.delimiter.len() != 1 {
            return Err(TriageError::Configuration(format!(
                "triage.delimiter must be a single byte, got {:?}",
                self.triage.delimiter
            )));
        }
        Ok(())
    }

    /// Settings for a triage pipeline
    pub fn triage_settings(&self) -> TriageSettings {
        TriageSettings {
            enable_ml_fallback: self.triage.enable_ml_fallback,
            schema: self.triage.schema(),
        }
    }

    /// Options for the model trainer
    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            model_type: self.model.model_type,
            features: self.model.features.clone(),
            alpha: self.model.alpha,
            max_depth: self.model.max_depth,
            test_size: self.model.test_size,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            triage: TriageConfig::default(),
            model: ModelConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TriageConfig {
    /// Send rule-unmatched rows to the trained model
    #[serde(default = "default_true")]
    pub enable_ml_fallback: bool,

    /// Free-text column name
    #[serde(default = "default_description_field")]
    #[validate(length(min = 1))]
    pub description_field: String,

    /// Assignment column name
    #[serde(default = "default_output_field")]
    #[validate(length(min = 1))]
    pub output_field: String,

    /// Identifier column, used only in logs
    #[serde(default)]
    pub id_field: Option<String>,

    /// CSV field delimiter
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

impl TriageConfig {
    pub fn schema(&self) -> TableSchema {
        TableSchema {
            id_field: self.id_field.clone(),
            description_field: self.description_field.clone(),
            output_field: self.output_field.clone(),
        }
    }

    /// Delimiter as a byte; `check` guarantees it is one byte long
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            enable_ml_fallback: true,
            description_field: default_description_field(),
            output_field: default_output_field(),
            id_field: None,
            delimiter: default_delimiter(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ModelConfig {
    /// Where the trained model artifact lives
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,

    /// Model kind used by `train`
    #[serde(default)]
    pub model_type: ModelType,

    /// Vectorizer settings
    #[serde(default)]
    #[validate(nested)]
    pub features: FeatureConfig,

    /// Logistic regression L2 penalty
    #[serde(default)]
    #[validate(range(min = 0.0))]
    pub alpha: f64,

    /// Decision tree depth limit
    #[serde(default = "default_max_depth")]
    #[validate(range(min = 1))]
    pub max_depth: u16,

    /// Text column in training data
    #[serde(default = "default_description_field")]
    #[validate(length(min = 1))]
    pub train_text_field: String,

    /// Label column in training data
    #[serde(default = "default_label_field")]
    #[validate(length(min = 1))]
    pub train_label_field: String,

    /// Fraction of training data held out for validation
    #[serde(default)]
    #[validate(range(min = 0.0, exclusive_max = 1.0))]
    pub test_size: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            artifact_path: default_artifact_path(),
            model_type: ModelType::default(),
            features: FeatureConfig::default(),
            alpha: 0.0,
            max_depth: default_max_depth(),
            train_text_field: default_description_field(),
            train_label_field: default_label_field(),
            test_size: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level filter, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1))]
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_description_field() -> String {
    crate::models::DESCRIPTION_FIELD.to_string()
}

fn default_output_field() -> String {
    crate::models::ASSIGNED_TEAM_FIELD.to_string()
}

fn default_label_field() -> String {
    "team".to_string()
}

fn default_delimiter() -> String {
    ",".to_string()
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from("models/team_classifier.bin")
}

fn default_max_depth() -> u16 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_layered(&dir.path().join("absent.toml"), false).unwrap();

        assert!(config.triage.enable_ml_fallback);
        assert_eq!(config.triage.description_field, "description");
        assert_eq!(config.triage.output_field, "assigned_team");
        assert_eq!(config.model.train_label_field, "team");
        assert_eq!(config.model.model_type, ModelType::LogisticRegression);
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.toml");
        std::fs::write(
            &path,
            r#"
[triage]
enable_ml_fallback = false
description_field = "Description"
output_field = "AssignedTeam"

[model]
train_text_field = "Description"
train_label_field = "Team"
model_type = "decision_tree"
"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        let settings = config.triage_settings();
        assert!(!settings.enable_ml_fallback);
        assert_eq!(settings.schema.description_field, "Description");
        assert_eq!(settings.schema.output_field, "AssignedTeam");
        assert_eq!(config.training_options().model_type, ModelType::DecisionTree);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(TriageError::Configuration(_))));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        assert!(config.check().is_ok());

        config.model.test_size = 1.0;
        assert!(config.check().is_err());

        let mut config = Config::default();
        config.triage.description_field.clear();
        assert!(config.check().is_err());

        let mut config = Config::default();
        config.triage.delimiter = ";;".to_string();
        assert!(matches!(config.check(), Err(TriageError::Configuration(_))));
    }
}
