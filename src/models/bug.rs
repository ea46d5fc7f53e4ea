use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default name of the free-text column
pub const DESCRIPTION_FIELD: &str = "description";

/// Default name of the appended assignment column
pub const ASSIGNED_TEAM_FIELD: &str = "assigned_team";

/// Column names the pipeline reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct TableSchema {
    /// Optional identifier column, used only for logging and record views
    #[serde(default)]
    pub id_field: Option<String>,

    /// Required free-text column (case-sensitive)
    #[validate(length(min = 1))]
    pub description_field: String,

    /// Column the assignment is written to
    #[validate(length(min = 1))]
    pub output_field: String,
}

impl Default for TableSchema {
    fn default() -> Self {
        Self {
            id_field: None,
            description_field: DESCRIPTION_FIELD.to_string(),
            output_field: ASSIGNED_TEAM_FIELD.to_string(),
        }
    }
}

/// A single bug report, viewed through a [`TableSchema`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BugRecord {
    /// Opaque identifier, if the table has one
    pub id: Option<String>,

    /// Free-text description
    pub description: String,

    /// Assigned team; `None` until triaged
    pub assigned_team: Option<String>,
}

/// An ordered table of bug records sharing one header row.
///
/// Cells are kept as strings so columns the pipeline does not know about
/// pass through untouched. Row order is never changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBugTable")]
pub struct BugTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Unchecked wire form of [`BugTable`]
#[derive(Deserialize)]
struct RawBugTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl TryFrom<RawBugTable> for BugTable {
    type Error = TriageError;

    fn try_from(raw: RawBugTable) -> Result<Self> {
        BugTable::new(raw.headers, raw.rows)
    }
}

impl BugTable {
    /// Create a table, checking every row has one cell per header
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            return Err(TriageError::Validation(format!(
                "row {} has {} cells, expected {}",
                idx,
                row.len(),
                headers.len()
            )));
        }

        Ok(Self { headers, rows })
    }

    /// Build a single-column table, handy for ad-hoc descriptions
    pub fn from_descriptions<I, S>(field: &str, descriptions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: vec![field.to_string()],
            rows: descriptions.into_iter().map(|d| vec![d.into()]).collect(),
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column, matched case-sensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Position of a column that must exist
    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| TriageError::missing_field(name))
    }

    /// All values of a column, in row order
    pub fn column(&self, name: &str) -> Result<Vec<&str>> {
        let idx = self.require_column(name)?;
        Ok(self.rows.iter().map(|row| row[idx].as_str()).collect())
    }

    /// Write a full column. Overwrites an existing column of the same
    /// name in place, otherwise appends it after the last column.
    pub fn set_column(&mut self, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(TriageError::Validation(format!(
                "column '{}' has {} values for {} rows",
                name,
                values.len(),
                self.rows.len()
            )));
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.headers.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }

        Ok(())
    }

    /// View every row as a [`BugRecord`]
    pub fn records(&self, schema: &TableSchema) -> Result<Vec<BugRecord>> {
        let desc_idx = self.require_column(&schema.description_field)?;
        let id_idx = schema
            .id_field
            .as_deref()
            .and_then(|field| self.column_index(field));
        let team_idx = self.column_index(&schema.output_field);

        Ok(self
            .rows
            .iter()
            .map(|row| BugRecord {
                id: id_idx.map(|i| row[i].clone()),
                description: row[desc_idx].clone(),
                assigned_team: team_idx.map(|i| row[i].clone()),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> BugTable {
        BugTable::new(
            vec!["id".to_string(), "description".to_string()],
            vec![
                vec!["BUG-1".to_string(), "API error on checkout".to_string()],
                vec!["BUG-2".to_string(), "Dropdown overlaps footer".to_string()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = BugTable::new(
            vec!["id".to_string(), "description".to_string()],
            vec![vec!["BUG-1".to_string()]],
        );
        assert!(matches!(result, Err(TriageError::Validation(_))));
    }

    #[test]
    fn test_require_column_is_case_sensitive() {
        let table = sample_table();
        assert_eq!(table.require_column("description").unwrap(), 1);

        let err = table.require_column("Description").unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("Description"));
    }

    #[test]
    fn test_set_column_appends_then_overwrites() {
        let mut table = sample_table();
        table
            .set_column("assigned_team", vec!["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(table.headers().len(), 3);
        assert_eq!(table.column("assigned_team").unwrap(), vec!["a", "b"]);

        table
            .set_column("assigned_team", vec!["c".to_string(), "d".to_string()])
            .unwrap();
        assert_eq!(table.headers().len(), 3);
        assert_eq!(table.column("assigned_team").unwrap(), vec!["c", "d"]);
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut table = sample_table();
        let result = table.set_column("assigned_team", vec!["only one".to_string()]);
        assert!(result.is_err());
        assert_eq!(table.headers().len(), 2);
    }

    #[test]
    fn test_records_view() {
        let schema = TableSchema {
            id_field: Some("id".to_string()),
            ..TableSchema::default()
        };
        let records = sample_table().records(&schema).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id.as_deref(), Some("BUG-1"));
        assert_eq!(records[1].description, "Dropdown overlaps footer");
        assert_eq!(records[0].assigned_team, None);
    }

    #[test]
    fn test_deserialize_rejects_ragged_rows() {
        let result = serde_json::from_str::<BugTable>(
            r#"{"headers":["id","description"],"rows":[["1"]]}"#,
        );
        let err = result.unwrap_err();
        assert!(err.to_string().contains("row 0 has 1 cells"));

        let table: BugTable = serde_json::from_str(
            r#"{"headers":["id","description"],"rows":[["1","API down"]]}"#,
        )
        .unwrap();
        assert_eq!(table.column("description").unwrap(), vec!["API down"]);
    }

    #[test]
    fn test_from_descriptions() {
        let table = BugTable::from_descriptions("description", ["one", "two"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.column("description").unwrap(), vec!["one", "two"]);
    }
}
