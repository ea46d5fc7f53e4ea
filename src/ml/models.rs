use crate::error::{Result, TriageError};
use crate::models::BugTable;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use validator::Validate;

/// Text vectorization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct FeatureConfig {
    /// Keep only the most frequent terms (unbounded when `None`)
    #[serde(default)]
    pub max_vocab_size: Option<usize>,

    /// Minimum number of documents a term must appear in
    #[validate(range(min = 1))]
    pub min_doc_freq: usize,

    /// Weight term counts by inverse document frequency
    pub use_tfidf: bool,

    /// Smallest n-gram length
    #[validate(range(min = 1, max = 5))]
    pub ngram_min: usize,

    /// Largest n-gram length
    #[validate(range(min = 1, max = 5))]
    pub ngram_max: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_vocab_size: None,
            min_doc_freq: 1,
            use_tfidf: true,
            ngram_min: 1,
            ngram_max: 1,
        }
    }
}

impl FeatureConfig {
    /// Check field ranges and that the n-gram range is ordered
    pub fn check(&self) -> Result<()> {
        self.validate()?;
        if self.ngram_min > self.ngram_max {
            return Err(TriageError::Validation(format!(
                "ngram_min ({}) must not exceed ngram_max ({})",
                self.ngram_min, self.ngram_max
            )));
        }
        Ok(())
    }
}

/// Labelled descriptions used to fit a model
#[derive(Debug, Clone, Default)]
pub struct TrainingDataset {
    /// Raw description text
    pub texts: Vec<String>,

    /// Team label per text
    pub labels: Vec<String>,
}

impl TrainingDataset {
    pub fn new(texts: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if texts.len() != labels.len() {
            return Err(TriageError::Training(format!(
                "{} texts but {} labels",
                texts.len(),
                labels.len()
            )));
        }
        Ok(Self { texts, labels })
    }

    /// Read a dataset from two columns of a table
    pub fn from_table(table: &BugTable, text_field: &str, label_field: &str) -> Result<Self> {
        let texts = table
            .column(text_field)?
            .into_iter()
            .map(str::to_string)
            .collect();
        let labels = table
            .column(label_field)?
            .into_iter()
            .map(str::to_string)
            .collect();
        Self::new(texts, labels)
    }

    pub fn n_samples(&self) -> usize {
        self.texts.len()
    }

    /// Distinct labels in sorted order
    pub fn classes(&self) -> Vec<String> {
        self.labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn text_refs(&self) -> Vec<&str> {
        self.texts.iter().map(String::as_str).collect()
    }

    /// Split into train/test sets; the last `test_size` fraction is held out
    pub fn train_test_split(&self, test_size: f64) -> (TrainingDataset, TrainingDataset) {
        let n_test = (self.n_samples() as f64 * test_size) as usize;
        let n_train = self.n_samples() - n_test;

        let train = TrainingDataset {
            texts: self.texts[..n_train].to_vec(),
            labels: self.labels[..n_train].to_vec(),
        };
        let test = TrainingDataset {
            texts: self.texts[n_train..].to_vec(),
            labels: self.labels[n_train..].to_vec(),
        };

        (train, test)
    }
}

/// Model evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Confusion matrix (rows: true class, columns: predicted class)
    pub confusion_matrix: Option<Array2<usize>>,

    /// Per-class metrics keyed by label
    pub per_class_metrics: HashMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            confusion_matrix: None,
            per_class_metrics: HashMap::new(),
        }
    }

    /// Score predicted class indices against true ones
    pub fn calculate(y_true: &[usize], y_pred: &[usize], classes: &[String]) -> Self {
        let n_samples = y_true.len();
        let n_classes = classes.len();
        if n_samples == 0 || n_classes == 0 {
            return Self::new();
        }

        let mut confusion = Array2::<usize>::zeros((n_classes, n_classes));
        for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
            if t < n_classes && p < n_classes {
                confusion[[t, p]] += 1;
            }
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = HashMap::new();
        for (class_idx, label) in classes.iter().enumerate() {
            let tp = confusion[[class_idx, class_idx]];
            let fp = confusion.column(class_idx).sum() - tp;
            let fn_count = confusion.row(class_idx).sum() - tp;

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };

            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };

            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            per_class.insert(
                label.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support: tp + fn_count,
                },
            );
        }

        let avg = |f: fn(&ClassMetrics) -> f64| {
            per_class.values().map(f).sum::<f64>() / n_classes as f64
        };

        Self {
            accuracy,
            precision: avg(|m| m.precision),
            recall: avg(|m| m.recall),
            f1_score: avg(|m| m.f1_score),
            confusion_matrix: Some(confusion),
            per_class_metrics: per_class,
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Artifact format version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Labels the model can emit, in class-index order
    pub labels: Vec<String>,

    /// Training metrics
    pub training_metrics: ModelMetrics,

    /// Hold-out metrics, when a test split was requested
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: HashMap<String, String>,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Logistic regression
    #[default]
    LogisticRegression,

    /// Decision tree
    DecisionTree,
}

impl ModelType {
    /// Identifier form, as used in configuration
    pub fn slug(&self) -> &'static str {
        match self {
            ModelType::LogisticRegression => "logistic_regression",
            ModelType::DecisionTree => "decision_tree",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
            ModelType::DecisionTree => write!(f, "Decision Tree"),
        }
    }
}
