//! Storage module for persisting harvested records
//!
//! This module handles all database operations for the harvester, including:
//! - SQLite database initialization and schema management
//! - Record upserts scoped by source, with score/comment history
//! - The run journal and its detailed results

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ReconciliationStore, StorageError, StorageResult};

use crate::model::{CrawlMode, ReconciliationOutcome, RunDetail};
use crate::HarvestError;

use std::path::Path;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    Ok(SqliteStorage::new(path)?)
}

/// Handle to an open run journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunHandle(pub i64);

/// What an upsert did, and the internal id of the affected row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub record_id: i64,
    pub outcome: ReconciliationOutcome,
}

/// Represents a run journal entry
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub source: String,
    pub mode: Option<CrawlMode>,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub records_scraped: u32,
    pub error_message: Option<String>,
    pub details: Vec<RunDetail>,
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    /// Finished with page errors after at least one good page
    Partial,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Partial,
            RunStatus::Failed,
        ] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("invalid"), None);
    }
}
