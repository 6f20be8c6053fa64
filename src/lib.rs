//! feedsync: incremental listing-feed harvester
//!
//! This crate pages through rank-ordered listing feeds, extracts one record per
//! listed item, and keeps a SQLite store in sync with what the feed shows without
//! re-processing content it already knows about. Sources can be crawled once or
//! kept in sync on a timer by the per-source scheduler.

pub mod config;
pub mod crawler;
pub mod model;
pub mod storage;

use thiserror::Error;

/// Main error type for feedsync operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Unknown crawl mode: {0}")]
    UnknownMode(String),
}

/// Failure to retrieve one listing page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to read body of {url}: {source}")]
    Body { url: String, source: reqwest::Error },
}

/// Markup that could not be turned into records
///
/// An invalid selector fails the whole extractor; the other variants only drop
/// one item.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("No identifier found")]
    MissingIdentifier,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("No metadata row found for item {0}")]
    MissingMetadata(u64),
}

/// Control-plane violations reported by the source scheduler
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("Source {0} is already running")]
    AlreadyRunning(String),

    #[error("Source {0} is not running")]
    NotRunning(String),

    #[error("Source {0} not found in config")]
    UnknownSource(String),
}

/// Result type alias for feedsync operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, HttpFetcher, PageFetcher, RecordExtractor, RunOptions, SourceScheduler};
pub use model::{CrawlMode, Record, ReconciliationOutcome, ScrapingResult, StopReason};
pub use storage::{ReconciliationStore, SqliteStorage};
