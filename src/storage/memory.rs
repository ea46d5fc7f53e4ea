use crate::error::{Result, TriageError};
use crate::models::BugTable;
use crate::storage::TableStore;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// In-memory table store keyed by location
#[derive(Debug, Clone)]
pub struct InMemoryTableStore {
    tables: Arc<DashMap<PathBuf, BugTable>>,
}

impl InMemoryTableStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(DashMap::new()),
        }
    }

    /// Seed a table at a location
    pub fn insert(&self, location: impl Into<PathBuf>, table: BugTable) {
        self.tables.insert(location.into(), table);
    }

    /// Snapshot of the table at a location
    pub fn get(&self, location: &Path) -> Option<BugTable> {
        self.tables.get(location).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TableStore for InMemoryTableStore {
    fn read(&self, location: &Path) -> Result<BugTable> {
        self.get(location).ok_or_else(|| {
            TriageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no table at {}", location.display()),
            ))
        })
    }

    fn write(&self, location: &Path, table: &BugTable) -> Result<()> {
        self.tables.insert(location.to_path_buf(), table.clone());
        Ok(())
    }
}
