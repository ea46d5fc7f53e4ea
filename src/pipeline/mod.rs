/// Triage pipeline
///
/// Applies the keyword rules to every row, sends only the rows no rule
/// matched to the text classifier, and writes one team column back onto
/// the table with row order unchanged.
pub mod triage;

pub use triage::{
    AssignmentSource, Classification, TriageOutcome, TriagePipeline, TriageReport,
    TriageSettings,
};
