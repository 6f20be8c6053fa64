//! Storage traits and error types
//!
//! This module defines the trait interface the crawl engine reconciles against,
//! and the associated error types.

use crate::model::{CrawlMode, Record, ScrapingResult};
use crate::storage::{RunHandle, RunRecord, RunStatus, Upserted};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Value out of range: {0}")]
    OutOfRange(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence collaborator of the crawl engine
///
/// Records are scoped by source name: identifiers only need to be unique within
/// one source. Implementations are shared by every scheduled source at once, so
/// they must be thread-safe and must make `upsert_record` atomic per
/// `(source, source_id)`.
pub trait ReconciliationStore: Send + Sync {
    // ===== Records =====

    /// Returns true if the source already stored this identifier
    fn record_exists(&self, source: &str, source_id: u64) -> StorageResult<bool>;

    /// Inserts a record, or refreshes score, comment count and last-seen time of
    /// an existing one
    ///
    /// The returned outcome is `Updated` only when score or comment count changed.
    fn upsert_record(&self, source: &str, record: &Record) -> StorageResult<Upserted>;

    /// Appends a score/comment snapshot to a record's history
    fn append_history(&self, record_id: i64, score: u32, comment_count: u32)
        -> StorageResult<()>;

    /// Highest identifier stored for the source, 0 if none
    fn highest_known_id(&self, source: &str) -> StorageResult<u64>;

    /// Number of records stored for the source
    fn count_records(&self, source: &str) -> StorageResult<u64>;

    /// Number of history snapshots for a record
    fn history_len(&self, record_id: i64) -> StorageResult<u64>;

    // ===== Run Journal =====

    /// Opens a journal entry in `running` state
    fn create_run_entry(&self, source: &str, mode: CrawlMode) -> StorageResult<RunHandle>;

    /// Closes a journal entry
    fn complete_run_entry(
        &self,
        run: RunHandle,
        status: RunStatus,
        record_count: u32,
        error_text: Option<&str>,
    ) -> StorageResult<()>;

    /// Attaches the detailed result of a run to its journal entry
    fn persist_run_result(&self, run: RunHandle, result: &ScrapingResult) -> StorageResult<()>;

    /// Most recent journal entries, newest first
    fn run_history(&self, limit: u32) -> StorageResult<Vec<RunRecord>>;
}
