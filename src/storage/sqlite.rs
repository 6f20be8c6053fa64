//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the ReconciliationStore trait.

use crate::model::{CrawlMode, Record, ReconciliationOutcome, RunDetail, ScrapingResult};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ReconciliationStore, StorageError, StorageResult};
use crate::storage::{RunHandle, RunRecord, RunStatus, Upserted};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
///
/// A single connection guarded by a mutex: every operation is serialized, which
/// also makes each upsert atomic with respect to concurrent runs.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }
}

fn sql_id(source_id: u64) -> StorageResult<i64> {
    i64::try_from(source_id)
        .map_err(|_| StorageError::OutOfRange(format!("source id {}", source_id)))
}

impl ReconciliationStore for SqliteStorage {
    // ===== Records =====

    fn record_exists(&self, source: &str, source_id: u64) -> StorageResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE source = ?1 AND source_id = ?2)",
            params![source, sql_id(source_id)?],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn upsert_record(&self, source: &str, record: &Record) -> StorageResult<Upserted> {
        let source_id = sql_id(record.source_id)?;
        let now = Utc::now().to_rfc3339();

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let previous: Option<(i64, u32, u32)> = tx
            .query_row(
                "SELECT id, score, comment_count FROM records WHERE source = ?1 AND source_id = ?2",
                params![source, source_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        tx.execute(
            "INSERT INTO records (source, source_id, title, link, author, score, comment_count,
             published_at, captured_at, created_at, updated_at, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, ?10)
             ON CONFLICT(source, source_id) DO UPDATE SET
                score = excluded.score,
                comment_count = excluded.comment_count,
                updated_at = excluded.updated_at,
                last_seen = excluded.last_seen",
            params![
                source,
                source_id,
                record.title,
                record.link,
                record.author,
                record.score,
                record.comment_count,
                record.published_at.to_rfc3339(),
                record.captured_at.to_rfc3339(),
                now,
            ],
        )?;

        let upserted = match previous {
            None => Upserted {
                record_id: tx.last_insert_rowid(),
                outcome: ReconciliationOutcome::Inserted,
            },
            Some((id, score, comments))
                if score == record.score && comments == record.comment_count =>
            {
                Upserted {
                    record_id: id,
                    outcome: ReconciliationOutcome::Unchanged,
                }
            }
            Some((id, _, _)) => Upserted {
                record_id: id,
                outcome: ReconciliationOutcome::Updated,
            },
        };

        tx.commit()?;
        Ok(upserted)
    }

    fn append_history(
        &self,
        record_id: i64,
        score: u32,
        comment_count: u32,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO record_history (record_id, score, comment_count, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![record_id, score, comment_count, now],
        )?;
        Ok(())
    }

    fn highest_known_id(&self, source: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let max_id: i64 = conn.query_row(
            "SELECT COALESCE(MAX(source_id), 0) FROM records WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        u64::try_from(max_id).map_err(|_| StorageError::OutOfRange(format!("source id {}", max_id)))
    }

    fn count_records(&self, source: &str) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE source = ?1",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn history_len(&self, record_id: i64) -> StorageResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM record_history WHERE record_id = ?1",
            params![record_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Journal =====

    fn create_run_entry(&self, source: &str, mode: CrawlMode) -> StorageResult<RunHandle> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO runs (source, mode, started_at, status) VALUES (?1, ?2, ?3, ?4)",
            params![source, mode.as_str(), now, RunStatus::Running.to_db_string()],
        )?;
        Ok(RunHandle(conn.last_insert_rowid()))
    }

    fn complete_run_entry(
        &self,
        run: RunHandle,
        status: RunStatus,
        record_count: u32,
        error_text: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE runs SET status = ?1, records_scraped = ?2, error_message = ?3, finished_at = ?4
             WHERE id = ?5",
            params![status.to_db_string(), record_count, error_text, now, run.0],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run.0));
        }
        Ok(())
    }

    fn persist_run_result(&self, run: RunHandle, result: &ScrapingResult) -> StorageResult<()> {
        let details = serde_json::to_string(&result.details())?;
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE runs SET details = ?1 WHERE id = ?2",
            params![details, run.0],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run.0));
        }
        Ok(())
    }

    fn run_history(&self, limit: u32) -> StorageResult<Vec<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, source, mode, started_at, finished_at, status, records_scraped,
             error_message, details
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit], |row| {
                let run = RunRecord {
                    id: row.get(0)?,
                    source: row.get(1)?,
                    mode: row.get::<_, String>(2)?.parse().ok(),
                    started_at: row.get(3)?,
                    finished_at: row.get(4)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(5)?)
                        .unwrap_or(RunStatus::Failed),
                    records_scraped: row.get(6)?,
                    error_message: row.get(7)?,
                    details: Vec::new(),
                };
                let details: Option<String> = row.get(8)?;
                Ok((run, details))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut history = Vec::with_capacity(rows.len());
        for (mut run, details) in rows {
            if let Some(json) = details {
                match serde_json::from_str::<Vec<RunDetail>>(&json) {
                    Ok(parsed) => run.details = parsed,
                    Err(e) => tracing::warn!("Run {} has unreadable details: {}", run.id, e),
                }
            }
            history.push(run);
        }

        Ok(history)
    }
}
