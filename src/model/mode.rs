/// Crawl strategy and termination definitions
///
/// A run is driven by exactly one `CrawlMode`, and records the `StopReason`
/// that ended its page loop.
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Strategy selecting which pages a run visits and how records are reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CrawlMode {
    /// Page 1 only, insert-or-update every record
    #[default]
    #[serde(rename = "latest")]
    LatestOnly,

    /// Pages until the first already-known identifier, insert only
    #[serde(rename = "since_last")]
    SinceLast,

    /// Pages until an empty page, insert-or-update with history
    #[serde(rename = "full")]
    FullArchive,

    /// Pages until a run of already-stored records, insert only
    #[serde(rename = "until_existing")]
    UntilExisting,
}

impl CrawlMode {
    /// Delay inserted between consecutive page fetches
    pub fn page_delay(&self) -> Duration {
        match self {
            Self::LatestOnly => Duration::ZERO,
            Self::SinceLast | Self::UntilExisting => Duration::from_secs(1),
            Self::FullArchive => Duration::from_secs(2),
        }
    }

    /// Whether existing records get their score and comment count refreshed
    pub fn updates_existing(&self) -> bool {
        matches!(self, Self::LatestOnly | Self::FullArchive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LatestOnly => "latest",
            Self::SinceLast => "since_last",
            Self::FullArchive => "full",
            Self::UntilExisting => "until_existing",
        }
    }

    pub fn all_modes() -> [Self; 4] {
        [
            Self::LatestOnly,
            Self::SinceLast,
            Self::FullArchive,
            Self::UntilExisting,
        ]
    }
}

impl FromStr for CrawlMode {
    type Err = ConfigError;

    /// Accepts the canonical names plus the hyphenated spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "latest" | "latest_only" => Ok(Self::LatestOnly),
            "since_last" | "new" => Ok(Self::SinceLast),
            "full" | "full_archive" => Ok(Self::FullArchive),
            "until_existing" => Ok(Self::UntilExisting),
            _ => Err(ConfigError::UnknownMode(s.to_string())),
        }
    }
}

impl fmt::Display for CrawlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a run's page loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Latest-only mode visits exactly one page
    SinglePage,

    /// `max_pages` pages were visited
    PageLimit,

    /// A page yielded no records
    EmptyPage,

    /// Two pages in a row yielded no records
    ConsecutiveEmptyPages,

    /// A record at or below the pre-run highest identifier was reached
    ReachedKnownId,

    /// Too many already-stored records were seen in a row
    DuplicateThreshold,

    /// A page stored nothing new
    NoNewRecords,

    /// A page could not be fetched or parsed
    PageError,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SinglePage => "single_page",
            Self::PageLimit => "page_limit",
            Self::EmptyPage => "empty_page",
            Self::ConsecutiveEmptyPages => "consecutive_empty_pages",
            Self::ReachedKnownId => "reached_known_id",
            Self::DuplicateThreshold => "duplicate_threshold",
            Self::NoNewRecords => "no_new_records",
            Self::PageError => "page_error",
        };
        write!(f, "{}", s)
    }
}
