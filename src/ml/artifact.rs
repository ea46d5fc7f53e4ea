use crate::error::{Result, TriageError};
use crate::ml::classifier::{Classifier, TeamModel, TextClassifier};
use crate::ml::features::TfidfVectorizer;
use crate::ml::models::{ModelMetadata, ModelMetrics, TrainingDataset};
use crate::ml::training::Trainer;
use crate::models::TeamLabel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Artifact format version written into metadata
pub const ARTIFACT_VERSION: &str = "1";

/// A trained team classifier: fitted vectorizer plus fitted model.
///
/// This is the persisted unit. Loading it yields a ready [`TextClassifier`].
#[derive(Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ModelMetadata,
    vectorizer: TfidfVectorizer,
    model: TeamModel,
}

impl ModelArtifact {
    pub fn new(metadata: ModelMetadata, vectorizer: TfidfVectorizer, model: TeamModel) -> Self {
        Self {
            metadata,
            vectorizer,
            model,
        }
    }

    /// Write the artifact. The file is written beside the target and then
    /// renamed, so readers never see a half-written model.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        write_atomic(path, |writer| {
            bincode::serialize_into(writer, self)?;
            Ok(())
        })?;

        info!(
            path = %path.display(),
            model_type = %self.metadata.model_type,
            labels = self.metadata.labels.len(),
            "Saved model artifact"
        );
        Ok(())
    }

    /// Load an artifact. Any failure means the fallback is unavailable.
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| {
            TriageError::ClassifierUnavailable(format!(
                "cannot open model artifact {}: {}",
                path.display(),
                e
            ))
        })?;

        // Decoding from a slice bounds every length prefix by the file size
        let artifact: ModelArtifact = bincode::deserialize(&bytes).map_err(|e| {
            TriageError::ClassifierUnavailable(format!(
                "cannot decode model artifact {}: {}",
                path.display(),
                e
            ))
        })?;

        if artifact.metadata.version != ARTIFACT_VERSION {
            return Err(TriageError::ClassifierUnavailable(format!(
                "model artifact version {} is not supported (expected {})",
                artifact.metadata.version, ARTIFACT_VERSION
            )));
        }

        info!(
            path = %path.display(),
            model_type = %artifact.metadata.model_type,
            trained_at = %artifact.metadata.trained_at,
            "Loaded model artifact"
        );
        Ok(artifact)
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    /// Score this model against a labelled dataset
    pub fn evaluate(&self, dataset: &TrainingDataset) -> Result<ModelMetrics> {
        if dataset.n_samples() == 0 {
            return Err(TriageError::Training("no evaluation samples".to_string()));
        }
        Trainer::evaluate(
            &self.vectorizer,
            &self.model,
            dataset,
            &self.metadata.labels,
        )
    }

    /// Map class indices back to labels
    fn decode(&self, indices: Vec<usize>) -> Result<Vec<TeamLabel>> {
        indices
            .into_iter()
            .map(|idx| {
                self.metadata
                    .labels
                    .get(idx)
                    .map(|label| TeamLabel::from(label.as_str()))
                    .ok_or_else(|| {
                        TriageError::ClassifierUnavailable(format!(
                            "model predicted unknown class index {}",
                            idx
                        ))
                    })
            })
            .collect()
    }
}

/// Write through `<path>.tmp` and rename into place. The temp file is
/// removed if any step before the rename fails.
fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let tmp = path.with_extension("tmp");
    let written = File::create(&tmp)
        .map_err(TriageError::from)
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer.flush()?;
            Ok(())
        });

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

impl TextClassifier for ModelArtifact {
    fn vectorize(&self, texts: &[&str]) -> Result<Array2<f64>> {
        self.vectorizer.transform(texts)
    }

    fn predict_features(&self, features: &Array2<f64>) -> Result<Vec<TeamLabel>> {
        if features.ncols() != self.vectorizer.n_features() {
            return Err(TriageError::ClassifierUnavailable(format!(
                "feature matrix has {} columns, model expects {}",
                features.ncols(),
                self.vectorizer.n_features()
            )));
        }
        if features.nrows() == 0 {
            return Ok(Vec::new());
        }

        let indices = self.model.predict(features)?;
        self.decode(indices)
    }

    fn name(&self) -> &str {
        &self.metadata.name
    }
}
