use crate::model::{CrawlMode, ReconciliationOutcome, StopReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Summary of one engine run
///
/// Created when the run starts, filled in page by page, and frozen by
/// [`ScrapingResult::finish`].
#[derive(Debug, Clone)]
pub struct ScrapingResult {
    pub mode: CrawlMode,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
    pub pages_scraped: u32,
    /// Records written to the store (new plus updated)
    pub posts_scraped: u32,
    pub new_posts: u32,
    pub updated_posts: u32,
    /// Always 0: the engine never deletes records
    pub deleted_posts: u32,
    /// Highest identifier known before the run
    pub last_known_id: u64,
    /// Highest identifier known before or observed during the run
    pub highest_id_seen: u64,
    pub stop_reason: Option<StopReason>,
    /// Page-level failures in the order they happened
    pub errors: Vec<String>,
}

impl ScrapingResult {
    pub fn start(mode: CrawlMode, last_known_id: u64) -> Self {
        let now = Utc::now();
        Self {
            mode,
            start_time: now,
            end_time: now,
            duration: Duration::ZERO,
            pages_scraped: 0,
            posts_scraped: 0,
            new_posts: 0,
            updated_posts: 0,
            deleted_posts: 0,
            last_known_id,
            highest_id_seen: last_known_id,
            stop_reason: None,
            errors: Vec::new(),
        }
    }

    pub fn observe_id(&mut self, source_id: u64) {
        self.highest_id_seen = self.highest_id_seen.max(source_id);
    }

    /// Folds one reconciliation into the counters
    pub fn count(&mut self, outcome: ReconciliationOutcome) {
        match outcome {
            ReconciliationOutcome::Inserted => {
                self.new_posts += 1;
                self.posts_scraped += 1;
            }
            ReconciliationOutcome::Updated => {
                self.updated_posts += 1;
                self.posts_scraped += 1;
            }
            ReconciliationOutcome::Unchanged => {}
        }
    }

    pub fn record_error(&mut self, page: u32, message: impl std::fmt::Display) {
        self.errors.push(format!("Page {}: {}", page, message));
    }

    pub fn stop(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
    }

    pub fn finish(&mut self) {
        self.end_time = Utc::now();
        self.duration = (self.end_time - self.start_time)
            .to_std()
            .unwrap_or(Duration::ZERO);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Breaks the result into the detail entries stored in the run journal
    pub fn details(&self) -> Vec<RunDetail> {
        let mut details = vec![
            RunDetail::Mode { mode: self.mode },
            RunDetail::Counts {
                posts_scraped: self.posts_scraped,
                new_posts: self.new_posts,
                updated_posts: self.updated_posts,
                deleted_posts: self.deleted_posts,
            },
            RunDetail::Pages {
                pages_scraped: self.pages_scraped,
                last_known_id: self.last_known_id,
                highest_id_seen: self.highest_id_seen,
                stop_reason: self.stop_reason,
                duration_ms: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
            },
        ];
        if self.has_errors() {
            details.push(RunDetail::Errors {
                messages: self.errors.clone(),
            });
        }
        details
    }
}

/// One piece of run detail persisted alongside the journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunDetail {
    Mode {
        mode: CrawlMode,
    },
    Counts {
        posts_scraped: u32,
        new_posts: u32,
        updated_posts: u32,
        deleted_posts: u32,
    },
    Pages {
        pages_scraped: u32,
        last_known_id: u64,
        highest_id_seen: u64,
        stop_reason: Option<StopReason>,
        duration_ms: u64,
    },
    Errors {
        messages: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_seeds_highest_id() {
        let result = ScrapingResult::start(CrawlMode::SinceLast, 42);
        assert_eq!(result.highest_id_seen, 42);
        assert_eq!(result.deleted_posts, 0);
    }

    #[test]
    fn test_observe_id_is_monotonic() {
        let mut result = ScrapingResult::start(CrawlMode::LatestOnly, 10);
        result.observe_id(7);
        assert_eq!(result.highest_id_seen, 10);
        result.observe_id(15);
        result.observe_id(12);
        assert_eq!(result.highest_id_seen, 15);
    }

    #[test]
    fn test_count_outcomes() {
        let mut result = ScrapingResult::start(CrawlMode::LatestOnly, 0);
        result.count(ReconciliationOutcome::Inserted);
        result.count(ReconciliationOutcome::Inserted);
        result.count(ReconciliationOutcome::Updated);
        result.count(ReconciliationOutcome::Unchanged);
        assert_eq!(result.new_posts, 2);
        assert_eq!(result.updated_posts, 1);
        assert_eq!(result.posts_scraped, 3);
    }

    #[test]
    fn test_details_include_errors_only_when_present() {
        let mut result = ScrapingResult::start(CrawlMode::FullArchive, 0);
        result.finish();
        assert_eq!(result.details().len(), 3);

        result.record_error(2, "HTTP 500");
        let details = result.details();
        assert_eq!(details.len(), 4);
        assert_eq!(
            details[3],
            RunDetail::Errors {
                messages: vec!["Page 2: HTTP 500".to_string()]
            }
        );
    }

    #[test]
    fn test_detail_json_is_tagged() {
        let detail = RunDetail::Mode {
            mode: CrawlMode::UntilExisting,
        };
        let json = serde_json::to_string(&detail).unwrap();
        assert_eq!(json, r#"{"kind":"mode","mode":"until_existing"}"#);

        let back: RunDetail = serde_json::from_str(&json).unwrap();
        assert_eq!(back, detail);
    }
}
