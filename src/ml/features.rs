use crate::error::{Result, TriageError};
use crate::ml::models::FeatureConfig;
use ndarray::Array2;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tokens are runs of two or more word characters
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is valid"));

/// TF-IDF text vectorizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Configuration
    config: FeatureConfig,

    /// Vocabulary mapping (term -> column index), columns in sorted term order
    vocabulary: HashMap<String, usize>,

    /// Inverse document frequency per column
    idf: Vec<f64>,

    /// Is fitted (vocabulary built)
    is_fitted: bool,
}

impl TfidfVectorizer {
    /// Create a new, unfitted vectorizer
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            is_fitted: false,
        }
    }

    /// Build the vocabulary and idf weights from a corpus
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        self.config.check()?;
        if documents.is_empty() {
            return Err(TriageError::Training(
                "cannot fit vectorizer on an empty corpus".to_string(),
            ));
        }

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            let unique: HashSet<String> = self.extract_terms(doc.as_ref()).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let mut kept: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= self.config.min_doc_freq)
            .collect();

        if let Some(max) = self.config.max_vocab_size {
            // Most frequent first, ties alphabetical
            kept.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            kept.truncate(max);
        }
        kept.sort_by(|a, b| a.0.cmp(&b.0));

        if kept.is_empty() {
            return Err(TriageError::Training(
                "empty vocabulary; documents contain no usable terms".to_string(),
            ));
        }

        let n_docs = documents.len() as f64;
        self.idf = kept
            .iter()
            .map(|(_, df)| ((1.0 + n_docs) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();
        self.vocabulary = kept
            .into_iter()
            .enumerate()
            .map(|(idx, (term, _))| (term, idx))
            .collect();
        self.is_fitted = true;

        Ok(())
    }

    /// Turn documents into an L2-normalised feature matrix (one row per document)
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(TriageError::ClassifierUnavailable(
                "vectorizer must be fitted before transform".to_string(),
            ));
        }
        self.config.check()?;

        let mut features = Array2::<f64>::zeros((documents.len(), self.vocabulary.len()));

        for (row, doc) in documents.iter().enumerate() {
            for term in self.extract_terms(doc.as_ref()) {
                if let Some(&col) = self.vocabulary.get(&term) {
                    features[[row, col]] += 1.0;
                }
            }

            let mut row_view = features.row_mut(row);
            if self.config.use_tfidf {
                row_view
                    .iter_mut()
                    .zip(self.idf.iter())
                    .for_each(|(value, idf)| *value *= idf);
            }

            let norm = row_view.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row_view.mapv_inplace(|v| v / norm);
            }
        }

        Ok(features)
    }

    /// Fit and transform in one step
    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    /// Lowercased word tokens and their n-grams
    fn extract_terms(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = TOKEN_PATTERN
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .collect();

        let mut terms = Vec::new();
        for n in self.config.ngram_min.max(1)..=self.config.ngram_max {
            for window in words.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }

    /// Get number of features
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }
}
