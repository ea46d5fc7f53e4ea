//! Bug report triage.
//!
//! Every report first goes through a fixed, ordered set of keyword rules.
//! Reports no rule matches are handed to a trained text classifier. The
//! result is the input table with one extra team column.

pub mod config;
pub mod error;
pub mod ml;
pub mod models;
pub mod pipeline;
pub mod rules;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{Result, TriageError};
pub use ml::{ModelArtifact, TextClassifier, Trainer, TrainingOptions};
pub use models::{BugRecord, BugTable, TableSchema, Team, TeamLabel};
pub use pipeline::{TriageOutcome, TriagePipeline, TriageReport, TriageSettings};
pub use rules::{classify, RuleClassifier};
pub use storage::{CsvTableStore, TableStore};
