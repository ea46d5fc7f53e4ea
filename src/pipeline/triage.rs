use crate::error::{Result, TriageError};
use crate::ml::TextClassifier;
use crate::models::{BugTable, TableSchema};
use crate::rules::RuleClassifier;
use crate::storage::TableStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Knobs for a triage run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageSettings {
    /// Send rule-unmatched rows to the text classifier
    pub enable_ml_fallback: bool,

    /// Column names read and written
    pub schema: TableSchema,
}

impl Default for TriageSettings {
    fn default() -> Self {
        Self {
            enable_ml_fallback: true,
            schema: TableSchema::default(),
        }
    }
}

/// Counts describing one triage run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageReport {
    pub total_rows: usize,
    pub rule_matched: usize,
    pub model_predicted: usize,
    pub unassigned: usize,

    /// Rows per assigned label; unassigned rows are not counted here
    pub label_counts: BTreeMap<String, usize>,
}

impl TriageReport {
    fn tally(&mut self, labels: &[String]) {
        for label in labels.iter().filter(|l| !l.is_empty()) {
            *self.label_counts.entry(label.clone()).or_insert(0) += 1;
        }
    }
}

/// Result of a triage run: the annotated table and its report
#[derive(Debug, Clone, PartialEq)]
pub struct TriageOutcome {
    pub table: BugTable,
    pub report: TriageReport,
}

/// Where a single assignment came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssignmentSource {
    Rule { tier: usize, keyword: String },
    Model { classifier: String },
    Unassigned,
}

impl std::fmt::Display for AssignmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentSource::Rule { tier, keyword } => write!(f, "rule:{}:{}", tier, keyword),
            AssignmentSource::Model { classifier } => write!(f, "model:{}", classifier),
            AssignmentSource::Unassigned => write!(f, "unassigned"),
        }
    }
}

/// Team assigned to one free-standing description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub description: String,

    /// Empty when unassigned
    pub label: String,
    pub source: AssignmentSource,
}

/// Rule-first, model-fallback triage over a whole table
pub struct TriagePipeline {
    rules: RuleClassifier,
    fallback: Option<Arc<dyn TextClassifier>>,
    settings: TriageSettings,
}

impl TriagePipeline {
    pub fn new(settings: TriageSettings) -> Self {
        Self {
            rules: RuleClassifier::new(),
            fallback: None,
            settings,
        }
    }

    /// Set the text classifier consulted for rule-unmatched rows
    pub fn with_fallback(mut self, classifier: Arc<dyn TextClassifier>) -> Self {
        self.fallback = Some(classifier);
        self
    }

    pub fn with_rules(mut self, rules: RuleClassifier) -> Self {
        self.rules = rules;
        self
    }

    pub fn settings(&self) -> &TriageSettings {
        &self.settings
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    /// Assign a team to every row of `table`.
    ///
    /// Fails with [`TriageError::Schema`] before touching anything when the
    /// description column is absent. Row order and extra columns are kept;
    /// the output column is appended, or overwritten if already present.
    pub fn triage(&self, mut table: BugTable) -> Result<TriageOutcome> {
        let schema = &self.settings.schema;
        let desc_idx = table.require_column(&schema.description_field)?;

        let mut assigned: Vec<String> = Vec::with_capacity(table.len());
        let mut unmatched: Vec<usize> = Vec::new();

        for (row_idx, row) in table.rows().iter().enumerate() {
            let description = &row[desc_idx];
            match self.rules.classify(description) {
                Some(team) => assigned.push(team.to_string()),
                None => {
                    debug!(row = row_idx, "No keyword rule matched");
                    unmatched.push(row_idx);
                    assigned.push(String::new());
                }
            }
        }

        let mut report = TriageReport {
            total_rows: table.len(),
            rule_matched: table.len() - unmatched.len(),
            ..TriageReport::default()
        };

        if !unmatched.is_empty() {
            if self.settings.enable_ml_fallback {
                let texts: Vec<&str> = unmatched
                    .iter()
                    .map(|&idx| table.rows()[idx][desc_idx].as_str())
                    .collect();
                let labels = self.predict_unmatched(&texts)?;
                for (&row_idx, label) in unmatched.iter().zip(labels) {
                    assigned[row_idx] = label;
                }
                report.model_predicted = unmatched.len();
            } else {
                report.unassigned = unmatched.len();
                warn!(
                    rows = unmatched.len(),
                    "Model fallback disabled; leaving unmatched rows unassigned"
                );
            }
        }

        report.tally(&assigned);
        table.set_column(&schema.output_field, assigned)?;

        info!(
            total = report.total_rows,
            rule_matched = report.rule_matched,
            model_predicted = report.model_predicted,
            unassigned = report.unassigned,
            "Triage complete"
        );

        Ok(TriageOutcome { table, report })
    }

    /// Read `input` from `store`, triage it and write the result to `output`.
    /// Nothing is written when triage fails.
    pub fn triage_file(
        &self,
        store: &dyn TableStore,
        input: &Path,
        output: &Path,
    ) -> Result<TriageReport> {
        let table = store.read(input)?;
        info!(input = %input.display(), rows = table.len(), "Loaded bug table");

        let outcome = self.triage(table)?;
        store.write(output, &outcome.table)?;
        info!(output = %output.display(), "Wrote triaged table");

        Ok(outcome.report)
    }

    /// Classify loose descriptions with the same rule-then-model order and
    /// the same failure modes as [`TriagePipeline::triage`]
    pub fn classify_batch<S: AsRef<str>>(&self, descriptions: &[S]) -> Result<Vec<Classification>> {
        let mut results: Vec<Classification> = Vec::with_capacity(descriptions.len());
        let mut unmatched: Vec<usize> = Vec::new();

        for (idx, description) in descriptions.iter().enumerate() {
            let description = description.as_ref();
            let (label, source) = match self.rules.explain(description) {
                Some(hit) => (
                    hit.team.to_string(),
                    AssignmentSource::Rule {
                        tier: hit.tier,
                        keyword: hit.keyword.to_string(),
                    },
                ),
                None => {
                    unmatched.push(idx);
                    (String::new(), AssignmentSource::Unassigned)
                }
            };
            results.push(Classification {
                description: description.to_string(),
                label,
                source,
            });
        }

        if !unmatched.is_empty() && self.settings.enable_ml_fallback {
            let texts: Vec<&str> = unmatched
                .iter()
                .map(|&idx| descriptions[idx].as_ref())
                .collect();
            let labels = self.predict_unmatched(&texts)?;
            let classifier = self
                .fallback
                .as_ref()
                .map(|c| c.name().to_string())
                .unwrap_or_default();
            for (&idx, label) in unmatched.iter().zip(labels) {
                results[idx].label = label;
                results[idx].source = AssignmentSource::Model {
                    classifier: classifier.clone(),
                };
            }
        }

        Ok(results)
    }

    fn predict_unmatched(&self, texts: &[&str]) -> Result<Vec<String>> {
        let classifier = self.fallback.as_ref().ok_or_else(|| {
            TriageError::ClassifierUnavailable(
                "model fallback is enabled but no classifier is loaded".to_string(),
            )
        })?;

        debug!(
            classifier = classifier.name(),
            rows = texts.len(),
            "Predicting rule-unmatched rows"
        );

        let labels = classifier.predict(texts).map_err(|e| match e {
            TriageError::ClassifierUnavailable(_) => e,
            other => TriageError::ClassifierUnavailable(other.to_string()),
        })?;

        if labels.len() != texts.len() {
            return Err(TriageError::ClassifierUnavailable(format!(
                "classifier '{}' returned {} labels for {} rows",
                classifier.name(),
                labels.len(),
                texts.len()
            )));
        }

        Ok(labels.into_iter().map(String::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TeamLabel;
    use ndarray::Array2;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every batch it sees and answers with a fixed label
    struct RecordingClassifier {
        label: &'static str,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl RecordingClassifier {
        fn new(label: &'static str) -> Self {
            Self {
                label,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextClassifier for RecordingClassifier {
        fn vectorize(&self, texts: &[&str]) -> Result<Array2<f64>> {
            Ok(Array2::zeros((texts.len(), 1)))
        }

        fn predict_features(&self, features: &Array2<f64>) -> Result<Vec<TeamLabel>> {
            Ok(vec![TeamLabel::from(self.label); features.nrows()])
        }

        fn predict(&self, texts: &[&str]) -> Result<Vec<TeamLabel>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen
                .lock()
                .unwrap()
                .extend(texts.iter().map(|t| t.to_string()));
            let features = self.vectorize(texts)?;
            self.predict_features(&features)
        }
    }

    /// Always returns one label too few
    struct ShortClassifier;

    impl TextClassifier for ShortClassifier {
        fn vectorize(&self, texts: &[&str]) -> Result<Array2<f64>> {
            Ok(Array2::zeros((texts.len(), 1)))
        }

        fn predict_features(&self, features: &Array2<f64>) -> Result<Vec<TeamLabel>> {
            Ok(vec![TeamLabel::from("Backend Team"); features.nrows().saturating_sub(1)])
        }
    }

    struct BrokenClassifier;

    impl TextClassifier for BrokenClassifier {
        fn vectorize(&self, _texts: &[&str]) -> Result<Array2<f64>> {
            Err(TriageError::Serialization("feature shape mismatch".to_string()))
        }

        fn predict_features(&self, _features: &Array2<f64>) -> Result<Vec<TeamLabel>> {
            unreachable!()
        }
    }

    fn table(descriptions: &[&str]) -> BugTable {
        BugTable::from_descriptions("description", descriptions.iter().copied())
    }

    fn with_stub(stub: Arc<dyn TextClassifier>) -> TriagePipeline {
        TriagePipeline::new(TriageSettings::default()).with_fallback(stub)
    }

    #[test]
    fn test_missing_description_column() {
        let input = BugTable::from_descriptions("summary", ["API down"]);
        let err = with_stub(Arc::new(RecordingClassifier::new("UX Team")))
            .triage(input)
            .unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("description"));
    }

    #[test]
    fn test_rules_first_then_model() {
        let stub = Arc::new(RecordingClassifier::new("Platform Team"));
        let pipeline = with_stub(stub.clone());

        let outcome = pipeline
            .triage(table(&["API timeout", "Weird Glitch", "CSS broken", "Nothing Here"]))
            .unwrap();

        assert_eq!(
            outcome.table.column("assigned_team").unwrap(),
            vec!["Backend Team", "Platform Team", "UX Team", "Platform Team"]
        );
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*stub.seen.lock().unwrap(), vec!["Weird Glitch", "Nothing Here"]);
        assert_eq!(outcome.report.rule_matched, 2);
        assert_eq!(outcome.report.model_predicted, 2);
        assert_eq!(outcome.report.label_counts["Platform Team"], 2);
    }

    #[test]
    fn test_model_skipped_when_everything_matches() {
        let stub = Arc::new(RecordingClassifier::new("UX Team"));
        let outcome = with_stub(stub.clone())
            .triage(table(&["database locked", "mobile header"]))
            .unwrap();

        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.report.model_predicted, 0);
    }

    #[test]
    fn test_empty_table() {
        let stub = Arc::new(RecordingClassifier::new("UX Team"));
        let outcome = with_stub(stub.clone()).triage(table(&[])).unwrap();

        assert!(outcome.table.is_empty());
        assert!(outcome.table.has_column("assigned_team"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fallback_disabled_leaves_empty() {
        let settings = TriageSettings {
            enable_ml_fallback: false,
            ..TriageSettings::default()
        };
        let outcome = TriagePipeline::new(settings)
            .triage(table(&["session lost", "no keywords"]))
            .unwrap();

        assert_eq!(
            outcome.table.column("assigned_team").unwrap(),
            vec!["Platform Team", ""]
        );
        assert_eq!(outcome.report.unassigned, 1);
        assert!(!outcome.report.label_counts.contains_key(""));
    }

    #[test]
    fn test_fallback_enabled_without_classifier() {
        let pipeline = TriagePipeline::new(TriageSettings::default());

        assert!(pipeline.triage(table(&["api error"])).is_ok());

        let err = pipeline.triage(table(&["no keywords"])).unwrap_err();
        assert_eq!(err.error_code(), "CLASSIFIER_UNAVAILABLE");
    }

    #[test]
    fn test_label_count_mismatch_is_error() {
        let err = with_stub(Arc::new(ShortClassifier))
            .triage(table(&["one", "two"]))
            .unwrap_err();
        assert!(matches!(err, TriageError::ClassifierUnavailable(_)));
    }

    #[test]
    fn test_classifier_failure_wrapped() {
        let err = with_stub(Arc::new(BrokenClassifier))
            .triage(table(&["unmatched"]))
            .unwrap_err();
        assert!(matches!(err, TriageError::ClassifierUnavailable(ref m) if m.contains("shape")));
    }

    #[test]
    fn test_retriage_overwrites_column() {
        let pipeline = with_stub(Arc::new(RecordingClassifier::new("UX Team")));
        let first = pipeline.triage(table(&["backend 500", "odd"])).unwrap();
        let second = pipeline.triage(first.table.clone()).unwrap();

        assert_eq!(first.table, second.table);
        assert_eq!(second.table.headers().len(), 2);
    }

    #[test]
    fn test_custom_columns() {
        let settings = TriageSettings {
            enable_ml_fallback: false,
            schema: TableSchema {
                id_field: None,
                description_field: "Description".to_string(),
                output_field: "AssignedTeam".to_string(),
            },
        };
        let input = BugTable::from_descriptions("Description", ["Backup failed"]);
        let outcome = TriagePipeline::new(settings).triage(input).unwrap();

        assert_eq!(
            outcome.table.column("AssignedTeam").unwrap(),
            vec!["Platform Team"]
        );
    }

    #[test]
    fn test_classify_batch_sources() {
        let stub = Arc::new(RecordingClassifier::new("Platform Team"));
        let results = with_stub(stub.clone())
            .classify_batch(&["Mobile header jumps", "Crash on startup"])
            .unwrap();

        assert_eq!(results[0].label, "Frontend Team");
        assert_eq!(
            results[0].source,
            AssignmentSource::Rule {
                tier: 2,
                keyword: "mobile".to_string()
            }
        );
        assert_eq!(results[1].label, "Platform Team");
        assert_eq!(results[1].source.to_string(), "model:text-classifier");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_classify_batch_without_classifier_matches_triage() {
        let pipeline = TriagePipeline::new(TriageSettings::default());

        let err = pipeline.classify_batch(&["Crash on startup"]).unwrap_err();
        assert_eq!(err.error_code(), "CLASSIFIER_UNAVAILABLE");
        assert_eq!(
            pipeline.triage(table(&["Crash on startup"])).unwrap_err().error_code(),
            err.error_code()
        );

        // nothing unmatched, nothing to ask the model
        assert!(pipeline.classify_batch(&["API timeout"]).is_ok());
    }

    #[test]
    fn test_classify_batch_rules_only() {
        let settings = TriageSettings {
            enable_ml_fallback: false,
            ..TriageSettings::default()
        };
        let results = TriagePipeline::new(settings)
            .classify_batch(&["Crash on startup"])
            .unwrap();

        assert_eq!(results[0].label, "");
        assert_eq!(results[0].source, AssignmentSource::Unassigned);
    }
}
