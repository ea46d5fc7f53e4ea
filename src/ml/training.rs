use crate::error::{Result, TriageError};
use crate::ml::artifact::{ModelArtifact, ARTIFACT_VERSION};
use crate::ml::classifier::{Classifier, TeamModel};
use crate::ml::features::TfidfVectorizer;
use crate::ml::models::{FeatureConfig, ModelMetadata, ModelMetrics, ModelType, TrainingDataset};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingOptions {
    /// Model kind
    pub model_type: ModelType,

    /// Vectorizer settings
    pub features: FeatureConfig,

    /// Logistic regression L2 penalty
    pub alpha: f64,

    /// Decision tree depth limit
    pub max_depth: u16,

    /// Fraction of the dataset held out for validation (0 disables)
    pub test_size: f64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            model_type: ModelType::LogisticRegression,
            features: FeatureConfig::default(),
            alpha: 0.0,
            max_depth: 10,
            test_size: 0.0,
        }
    }
}

/// Fits a vectorizer and a classifier on labelled descriptions
pub struct Trainer {
    options: TrainingOptions,
}

impl Trainer {
    pub fn new(options: TrainingOptions) -> Self {
        Self { options }
    }

    /// Train a model artifact on a dataset
    pub fn fit(&self, dataset: &TrainingDataset) -> Result<ModelArtifact> {
        self.options.features.check()?;
        if !(0.0..1.0).contains(&self.options.test_size) {
            return Err(TriageError::Validation(format!(
                "test_size must be in [0, 1), got {}",
                self.options.test_size
            )));
        }

        let (train, test) = if self.options.test_size > 0.0 {
            dataset.train_test_split(self.options.test_size)
        } else {
            (dataset.clone(), TrainingDataset::default())
        };

        if train.n_samples() == 0 {
            return Err(TriageError::Training("no training samples".to_string()));
        }

        let classes = train.classes();
        if classes.len() < 2 {
            return Err(TriageError::Training(format!(
                "need at least two distinct labels, found {}",
                classes.len()
            )));
        }

        info!(
            samples = train.n_samples(),
            classes = classes.len(),
            model_type = %self.options.model_type,
            "Training team classifier"
        );

        let class_index: HashMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(idx, label)| (label.as_str(), idx))
            .collect();
        let y: Vec<usize> = train
            .labels
            .iter()
            .map(|label| class_index[label.as_str()])
            .collect();

        let mut vectorizer = TfidfVectorizer::new(self.options.features.clone());
        let x = vectorizer.fit_transform(&train.texts)?;

        let mut model = TeamModel::new(
            self.options.model_type,
            self.options.alpha,
            self.options.max_depth,
        );
        model.train(&x, &y)?;

        let training_metrics = ModelMetrics::calculate(&y, &model.predict(&x)?, &classes);
        info!(
            accuracy = %format!("{:.2}%", training_metrics.accuracy * 100.0),
            f1 = %format!("{:.3}", training_metrics.f1_score),
            "Training metrics"
        );

        let validation_metrics = if test.n_samples() > 0 {
            Some(Self::evaluate(&vectorizer, &model, &test, &classes)?)
        } else {
            None
        };

        let metadata = ModelMetadata {
            name: format!("team-classifier-{}", self.options.model_type.slug()),
            version: ARTIFACT_VERSION.to_string(),
            model_type: self.options.model_type,
            trained_at: chrono::Utc::now(),
            n_training_samples: train.n_samples(),
            n_features: vectorizer.n_features(),
            labels: classes,
            training_metrics,
            validation_metrics,
            hyperparameters: self.hyperparameters(),
        };

        Ok(ModelArtifact::new(metadata, vectorizer, model))
    }

    /// Score a fitted model on held-out data. Labels the model never saw
    /// count as misses.
    pub(crate) fn evaluate(
        vectorizer: &TfidfVectorizer,
        model: &TeamModel,
        test: &TrainingDataset,
        classes: &[String],
    ) -> Result<ModelMetrics> {
        let unseen = test
            .labels
            .iter()
            .filter(|label| !classes.contains(*label))
            .count();
        if unseen > 0 {
            warn!(unseen, "Validation split contains labels absent from training");
        }

        let x = vectorizer.transform(&test.texts)?;
        let predicted = model.predict(&x)?;
        let y_true: Vec<usize> = test
            .labels
            .iter()
            .map(|label| {
                classes
                    .iter()
                    .position(|c| c == label)
                    .unwrap_or(classes.len())
            })
            .collect();

        let metrics = ModelMetrics::calculate(&y_true, &predicted, classes);
        info!(
            samples = test.n_samples(),
            accuracy = %format!("{:.2}%", metrics.accuracy * 100.0),
            "Validation metrics"
        );
        Ok(metrics)
    }

    fn hyperparameters(&self) -> HashMap<String, String> {
        let f = &self.options.features;
        let mut params = HashMap::from([
            ("min_doc_freq".to_string(), f.min_doc_freq.to_string()),
            ("use_tfidf".to_string(), f.use_tfidf.to_string()),
            (
                "ngram_range".to_string(),
                format!("{}-{}", f.ngram_min, f.ngram_max),
            ),
        ]);
        if let Some(max) = f.max_vocab_size {
            params.insert("max_vocab_size".to_string(), max.to_string());
        }
        match self.options.model_type {
            ModelType::LogisticRegression => {
                params.insert("alpha".to_string(), self.options.alpha.to_string());
            }
            ModelType::DecisionTree => {
                params.insert("max_depth".to_string(), self.options.max_depth.to_string());
            }
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::classifier::TextClassifier;
    use crate::models::TeamLabel;

    fn dataset(pairs: &[(&str, &str)]) -> TrainingDataset {
        TrainingDataset::new(
            pairs.iter().map(|(t, _)| t.to_string()).collect(),
            pairs.iter().map(|(_, l)| l.to_string()).collect(),
        )
        .unwrap()
    }

    fn corpus() -> TrainingDataset {
        dataset(&[
            ("login page rejects valid password", "Auth Team"),
            ("password reset link expired", "Auth Team"),
            ("two factor login code never arrives", "Auth Team"),
            ("monthly invoice total is wrong", "Billing Team"),
            ("invoice shows duplicate charge", "Billing Team"),
            ("refund charge not applied to invoice", "Billing Team"),
        ])
    }

    #[test]
    fn test_fit_records_metadata() {
        let artifact = Trainer::new(TrainingOptions::default())
            .fit(&corpus())
            .unwrap();

        assert_eq!(artifact.metadata.labels, vec!["Auth Team", "Billing Team"]);
        assert_eq!(artifact.metadata.n_training_samples, 6);
        assert_eq!(artifact.metadata.version, ARTIFACT_VERSION);
        assert!(artifact.metadata.n_features > 0);
        assert!(artifact.metadata.validation_metrics.is_none());
        assert_eq!(artifact.metadata.hyperparameters["alpha"], "0");
    }

    #[test]
    fn test_fit_learns_training_set() {
        let artifact = Trainer::new(TrainingOptions::default())
            .fit(&corpus())
            .unwrap();

        let labels = artifact
            .predict(&["password reset link expired", "invoice shows duplicate charge"])
            .unwrap();
        assert_eq!(
            labels,
            vec![
                TeamLabel::Other("Auth Team".to_string()),
                TeamLabel::Other("Billing Team".to_string())
            ]
        );
        assert_eq!(artifact.metadata.training_metrics.accuracy, 1.0);
    }

    #[test]
    fn test_single_label_rejected() {
        let data = dataset(&[("a crash", "Only Team"), ("another crash", "Only Team")]);
        let result = Trainer::new(TrainingOptions::default()).fit(&data);
        assert!(matches!(result, Err(TriageError::Training(_))));
    }

    #[test]
    fn test_invalid_test_size() {
        let options = TrainingOptions {
            test_size: 1.5,
            ..TrainingOptions::default()
        };
        let result = Trainer::new(options).fit(&corpus());
        assert!(matches!(result, Err(TriageError::Validation(_))));
    }

    #[test]
    fn test_holdout_produces_validation_metrics() {
        let mut pairs = Vec::new();
        for _ in 0..5 {
            pairs.push(("login password rejected", "Auth Team"));
            pairs.push(("invoice charge wrong", "Billing Team"));
        }
        let options = TrainingOptions {
            test_size: 0.2,
            ..TrainingOptions::default()
        };
        let artifact = Trainer::new(options).fit(&dataset(&pairs)).unwrap();

        assert_eq!(artifact.metadata.n_training_samples, 8);
        let validation = artifact.metadata.validation_metrics.unwrap();
        assert_eq!(validation.accuracy, 1.0);
    }

    #[test]
    fn test_decision_tree_option() {
        let options = TrainingOptions {
            model_type: ModelType::DecisionTree,
            ..TrainingOptions::default()
        };
        let artifact = Trainer::new(options).fit(&corpus()).unwrap();
        assert_eq!(artifact.metadata.model_type, ModelType::DecisionTree);
        assert!(artifact.metadata.hyperparameters.contains_key("max_depth"));
    }
}
