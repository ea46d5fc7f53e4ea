/// Machine learning fallback for bug triage
///
/// This module provides the text classifier consulted for descriptions the
/// keyword rules cannot place:
/// - TF-IDF feature extraction from description text
/// - Logistic regression and decision tree models (smartcore)
/// - Model training with training and hold-out metrics
/// - A persisted model artifact that bundles vectorizer and model

pub mod artifact;
pub mod classifier;
pub mod features;
pub mod models;
pub mod training;

pub use artifact::{ModelArtifact, ARTIFACT_VERSION};
pub use classifier::{Classifier, TeamModel, TextClassifier};
pub use features::TfidfVectorizer;
pub use models::{
    ClassMetrics, FeatureConfig, ModelMetadata, ModelMetrics, ModelType, TrainingDataset,
};
pub use training::{Trainer, TrainingOptions};
