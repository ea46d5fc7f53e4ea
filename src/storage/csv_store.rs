use crate::error::{Result, TriageError};
use crate::models::BugTable;
use crate::storage::TableStore;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// CSV-file backed table store
#[derive(Debug, Clone)]
pub struct CsvTableStore {
    delimiter: u8,
}

impl CsvTableStore {
    pub fn new() -> Self {
        Self { delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Sibling path the output is staged at before the final rename
    fn staging_path(location: &Path) -> PathBuf {
        let mut name = location
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".partial");
        location.with_file_name(name)
    }
}

impl Default for CsvTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for CsvTableStore {
    fn read(&self, location: &Path) -> Result<BugTable> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_path(location)
            .map_err(|e| TriageError::Csv(format!("{}: {}", location.display(), e)))?;

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let rows = reader
            .records()
            .map(|record| record.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        tracing::debug!(
            path = %location.display(),
            columns = headers.len(),
            rows = rows.len(),
            "Read table"
        );

        BugTable::new(headers, rows)
    }

    fn write(&self, location: &Path, table: &BugTable) -> Result<()> {
        if let Some(parent) = location.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let staging = Self::staging_path(location);
        let written = (|| -> Result<()> {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.delimiter)
                .from_writer(File::create(&staging)?);
            writer.write_record(table.headers())?;
            for row in table.rows() {
                writer.write_record(row)?;
            }
            writer.flush()?;
            Ok(())
        })();

        if let Err(e) = written {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        fs::rename(&staging, location)?;

        tracing::debug!(
            path = %location.display(),
            rows = table.len(),
            "Wrote table"
        );
        Ok(())
    }
}
