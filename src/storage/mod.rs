pub mod csv_store;
pub mod memory;

pub use csv_store::CsvTableStore;
pub use memory::InMemoryTableStore;

use crate::error::Result;
use crate::models::BugTable;
use std::path::Path;

/// Trait for reading and writing bug tables
pub trait TableStore: Send + Sync {
    /// Read a whole table from a location
    fn read(&self, location: &Path) -> Result<BugTable>;

    /// Write a whole table to a location, replacing what was there
    fn write(&self, location: &Path, table: &BugTable) -> Result<()>;
}
