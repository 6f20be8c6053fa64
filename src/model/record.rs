use chrono::{DateTime, Utc};
use std::fmt;

/// Author recorded when the listing does not name one
pub const UNKNOWN_AUTHOR: &str = "unknown";

/// One listed item as extracted from a page
///
/// Records are built fresh on every extraction pass and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Identifier assigned by the source, unique per source
    pub source_id: u64,

    pub title: String,

    /// Absolute link target of the item
    pub link: String,

    pub author: String,

    pub score: u32,

    pub comment_count: u32,

    /// Publication time, never earlier than 2000-01-01
    pub published_at: DateTime<Utc>,

    /// When the record was extracted
    pub captured_at: DateTime<Utc>,
}

/// Result of reconciling one record against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconciliationOutcome {
    /// The record was not stored before
    Inserted,

    /// The record existed and its score or comment count changed
    Updated,

    /// The record existed with the same counters, or was deliberately not written
    Unchanged,
}

impl ReconciliationOutcome {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for ReconciliationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
