use crate::error::{Result, TriageError};
use crate::ml::models::ModelType;
use crate::models::TeamLabel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};

/// Text classification collaborator used as the triage fallback.
///
/// Implementations are immutable once built, so one instance can serve
/// any number of pipeline runs.
pub trait TextClassifier: Send + Sync {
    /// Turn raw texts into a feature matrix (one row per text)
    fn vectorize(&self, texts: &[&str]) -> Result<Array2<f64>>;

    /// Predict a label for each row of a feature matrix
    fn predict_features(&self, features: &Array2<f64>) -> Result<Vec<TeamLabel>>;

    /// Predict a label for each text
    fn predict(&self, texts: &[&str]) -> Result<Vec<TeamLabel>> {
        let features = self.vectorize(texts)?;
        self.predict_features(&features)
    }

    /// Name used in logs
    fn name(&self) -> &str {
        "text-classifier"
    }
}

/// Trait for numeric classifiers over class indices
pub trait Classifier {
    /// Train the classifier
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()>;

    /// Predict class indices
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>>;

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

fn vec_to_labels(vec: &[usize]) -> Vec<i32> {
    vec.iter().map(|&x| x as i32).collect()
}

/// Logistic Regression Classifier
#[derive(Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    /// Trained model
    model: Option<LogisticRegression<f64, i32, DenseMatrix<f64>, Vec<i32>>>,

    /// L2 regularisation strength
    alpha: f64,
}

impl LogisticRegressionClassifier {
    pub fn new(alpha: f64) -> Self {
        Self { model: None, alpha }
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        let x = ndarray_to_densematrix(features);
        let y = vec_to_labels(labels);

        let params = LogisticRegressionParameters::default().with_alpha(self.alpha);
        let model = LogisticRegression::fit(&x, &y, params).map_err(|e| {
            TriageError::Training(format!("Failed to train logistic regression: {}", e))
        })?;

        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TriageError::ClassifierUnavailable("Model not trained".to_string()))?;

        let x = ndarray_to_densematrix(features);
        let predictions = model.predict(&x).map_err(|e| {
            TriageError::ClassifierUnavailable(format!("Prediction failed: {}", e))
        })?;

        Ok(predictions.iter().map(|&x| x as usize).collect())
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

/// Decision Tree Classifier
#[derive(Serialize, Deserialize)]
pub struct DecisionTreeClassifierWrapper {
    /// Trained model
    model: Option<DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>>,

    /// Maximum depth
    max_depth: u16,
}

impl DecisionTreeClassifierWrapper {
    pub fn new(max_depth: u16) -> Self {
        Self {
            model: None,
            max_depth,
        }
    }
}

impl Classifier for DecisionTreeClassifierWrapper {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        let x = ndarray_to_densematrix(features);
        let y = vec_to_labels(labels);

        let params = DecisionTreeClassifierParameters::default()
            .with_max_depth(self.max_depth)
            .with_criterion(SplitCriterion::Gini);

        let model = DecisionTreeClassifier::fit(&x, &y, params).map_err(|e| {
            TriageError::Training(format!("Failed to train decision tree: {}", e))
        })?;

        self.model = Some(model);
        Ok(())
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| TriageError::ClassifierUnavailable("Model not trained".to_string()))?;

        let x = ndarray_to_densematrix(features);
        let predictions = model.predict(&x).map_err(|e| {
            TriageError::ClassifierUnavailable(format!("Prediction failed: {}", e))
        })?;

        Ok(predictions.iter().map(|&x| x as usize).collect())
    }

    fn model_type(&self) -> ModelType {
        ModelType::DecisionTree
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }
}

/// A fitted model of either supported kind, stored inside a model artifact
#[derive(Serialize, Deserialize)]
pub enum TeamModel {
    LogisticRegression(LogisticRegressionClassifier),
    DecisionTree(DecisionTreeClassifierWrapper),
}

impl TeamModel {
    /// Create an untrained model of the given type
    pub fn new(model_type: ModelType, alpha: f64, max_depth: u16) -> Self {
        match model_type {
            ModelType::LogisticRegression => {
                TeamModel::LogisticRegression(LogisticRegressionClassifier::new(alpha))
            }
            ModelType::DecisionTree => {
                TeamModel::DecisionTree(DecisionTreeClassifierWrapper::new(max_depth))
            }
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            TeamModel::LogisticRegression(m) => m,
            TeamModel::DecisionTree(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            TeamModel::LogisticRegression(m) => m,
            TeamModel::DecisionTree(m) => m,
        }
    }
}

impl Classifier for TeamModel {
    fn train(&mut self, features: &Array2<f64>, labels: &[usize]) -> Result<()> {
        self.inner_mut().train(features, labels)
    }

    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        self.inner().predict(features)
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }
}
