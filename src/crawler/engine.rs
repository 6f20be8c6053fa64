//! Crawl strategy engine - one run of one source
//!
//! A run pages through a source's listing according to its `CrawlMode`,
//! reconciles every extracted record against the store, and returns a
//! `ScrapingResult`. Page failures truncate the page loop but never abort the
//! run: whatever was stored before the failure stays stored and is reported.

use crate::config::SourceConfig;
use crate::crawler::extractor::RecordExtractor;
use crate::crawler::fetcher::{page_url, PageFetcher};
use crate::model::{CrawlMode, Record, ReconciliationOutcome, ScrapingResult, StopReason};
use crate::storage::{ReconciliationStore, RunHandle, RunStatus};
use std::sync::Arc;
use std::time::Duration;

/// Consecutive already-stored records that end an until-existing run
const DUPLICATE_THRESHOLD: u32 = 5;

/// Consecutive empty pages that end an until-existing run
const EMPTY_PAGE_LIMIT: u32 = 2;

/// Per-run parameters
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub mode: CrawlMode,
    pub max_pages: u32,
    /// Full-archive only: stop at the first page that inserts nothing
    pub stop_on_duplicate: bool,
    /// Overrides the mode's inter-page delay
    pub page_delay: Option<Duration>,
}

impl RunOptions {
    /// Options taken from a source's configuration
    pub fn for_source(source: &SourceConfig) -> Self {
        Self {
            mode: source.mode,
            max_pages: source.max_pages,
            stop_on_duplicate: source.stop_on_duplicate,
            page_delay: None,
        }
    }

    pub fn with_mode(mut self, mode: CrawlMode) -> Self {
        self.mode = mode;
        self
    }

    fn delay(&self) -> Duration {
        self.page_delay.unwrap_or_else(|| self.mode.page_delay())
    }
}

/// Drives fetcher, extractor and store through one run
///
/// Cheap to clone; clones share the fetcher and the store.
#[derive(Clone)]
pub struct CrawlEngine {
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn ReconciliationStore>,
}

impl CrawlEngine {
    pub fn new(fetcher: Arc<dyn PageFetcher>, store: Arc<dyn ReconciliationStore>) -> Self {
        Self { fetcher, store }
    }

    /// Runs one crawl of a source
    ///
    /// Always returns a result, even when every page failed. The run journal is
    /// written best-effort: a journal failure is logged and otherwise ignored.
    ///
    /// # Arguments
    ///
    /// * `source` - The source to crawl
    /// * `options` - Mode, page limit and delay for this run
    pub async fn run(&self, source: &SourceConfig, options: &RunOptions) -> ScrapingResult {
        let run = match self.store.create_run_entry(&source.name, options.mode) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to open run journal for {}: {}", source.name, e);
                None
            }
        };

        let last_known_id = match self.store.highest_known_id(&source.name) {
            Ok(id) => id,
            Err(e) => {
                let mut result = ScrapingResult::start(options.mode, 0);
                result.errors.push(format!("Failed to read highest known id: {}", e));
                result.finish();
                self.close_journal(run, &result);
                return result;
            }
        };

        let mut result = ScrapingResult::start(options.mode, last_known_id);

        tracing::info!(
            "Starting {} run of {} (last known id {})",
            options.mode,
            source.name,
            last_known_id
        );

        match RecordExtractor::new(source) {
            Ok(extractor) => {
                let mut crawl = Crawl {
                    engine: self,
                    source,
                    options,
                    extractor,
                    result: &mut result,
                };
                match options.mode {
                    CrawlMode::LatestOnly => crawl.latest_only().await,
                    CrawlMode::SinceLast => crawl.since_last().await,
                    CrawlMode::FullArchive => crawl.full_archive().await,
                    CrawlMode::UntilExisting => crawl.until_existing().await,
                }
            }
            Err(e) => result.errors.push(e.to_string()),
        }

        result.finish();

        tracing::info!(
            "Finished {} run of {}: {} pages, {} new, {} updated, {} errors",
            options.mode,
            source.name,
            result.pages_scraped,
            result.new_posts,
            result.updated_posts,
            result.errors.len()
        );

        self.close_journal(run, &result);
        result
    }

    fn close_journal(&self, run: Option<RunHandle>, result: &ScrapingResult) {
        let Some(run) = run else {
            return;
        };

        let status = if !result.has_errors() {
            RunStatus::Completed
        } else if result.pages_scraped > 0 {
            RunStatus::Partial
        } else {
            RunStatus::Failed
        };
        let error_text = result.has_errors().then(|| result.errors.join("; "));

        if let Err(e) =
            self.store
                .complete_run_entry(run, status, result.posts_scraped, error_text.as_deref())
        {
            tracing::error!("Failed to complete run {}: {}", run.0, e);
        }
        if let Err(e) = self.store.persist_run_result(run, result) {
            tracing::error!("Failed to persist result of run {}: {}", run.0, e);
        }
    }
}

/// State of one run in progress
struct Crawl<'a> {
    engine: &'a CrawlEngine,
    source: &'a SourceConfig,
    options: &'a RunOptions,
    extractor: RecordExtractor,
    result: &'a mut ScrapingResult,
}

impl Crawl<'_> {
    async fn latest_only(&mut self) {
        let Some(records) = self.load_page(1).await else {
            return;
        };
        for record in records {
            self.reconcile(record);
        }
        self.result.stop(StopReason::SinglePage);
    }

    /// Collects records newer than the last known id, then inserts them
    async fn since_last(&mut self) {
        let last_known_id = self.result.last_known_id;
        let mut fresh = Vec::new();

        'pages: for page in 1..=self.options.max_pages {
            let Some(records) = self.load_page(page).await else {
                break;
            };
            if records.is_empty() {
                self.result.stop(StopReason::EmptyPage);
                break;
            }
            for record in records {
                if record.source_id <= last_known_id {
                    tracing::debug!("Reached known id {} on page {}", record.source_id, page);
                    self.result.stop(StopReason::ReachedKnownId);
                    break 'pages;
                }
                fresh.push(record);
            }
        }

        for record in fresh {
            self.reconcile(record);
        }
        self.stop_at_page_limit();
    }

    async fn full_archive(&mut self) {
        for page in 1..=self.options.max_pages {
            let Some(records) = self.load_page(page).await else {
                break;
            };
            if records.is_empty() {
                self.result.stop(StopReason::EmptyPage);
                break;
            }

            let mut inserted = 0;
            for record in records {
                if self.reconcile(record) == Some(ReconciliationOutcome::Inserted) {
                    inserted += 1;
                }
            }

            if self.options.stop_on_duplicate && inserted == 0 {
                self.result.stop(StopReason::NoNewRecords);
                break;
            }
        }
        self.stop_at_page_limit();
    }

    async fn until_existing(&mut self) {
        let mut duplicate_streak = 0;
        let mut empty_pages = 0;

        'pages: for page in 1..=self.options.max_pages {
            let Some(records) = self.load_page(page).await else {
                break;
            };
            if records.is_empty() {
                empty_pages += 1;
                if empty_pages >= EMPTY_PAGE_LIMIT {
                    self.result.stop(StopReason::ConsecutiveEmptyPages);
                    break;
                }
                continue;
            }
            empty_pages = 0;

            let mut inserted = 0;
            for record in records {
                match self.reconcile(record) {
                    Some(ReconciliationOutcome::Inserted) => {
                        inserted += 1;
                        duplicate_streak = 0;
                    }
                    Some(_) => {
                        duplicate_streak += 1;
                        if duplicate_streak >= DUPLICATE_THRESHOLD {
                            tracing::debug!("{} known records in a row on page {}", duplicate_streak, page);
                            self.result.stop(StopReason::DuplicateThreshold);
                            break 'pages;
                        }
                    }
                    None => {}
                }
            }

            if inserted == 0 {
                self.result.stop(StopReason::NoNewRecords);
                break;
            }
        }
        self.stop_at_page_limit();
    }

    fn stop_at_page_limit(&mut self) {
        if self.result.stop_reason.is_none() && !self.result.has_errors() {
            self.result.stop(StopReason::PageLimit);
        }
    }

    /// Fetches and parses one page
    ///
    /// Returns `None` after recording a page error. Only pages that yield records
    /// count towards `pages_scraped`.
    async fn load_page(&mut self, page: u32) -> Option<Vec<Record>> {
        let delay = self.options.delay();
        if page > 1 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let url = page_url(self.source, page);
        tracing::debug!("Fetching page {} of {}: {}", page, self.source.name, url);

        let records = match self.engine.fetcher.fetch(&url).await {
            Ok(html) => self.extractor.extract(&html).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match records {
            Ok(records) => {
                if !records.is_empty() {
                    self.result.pages_scraped += 1;
                }
                for record in &records {
                    self.result.observe_id(record.source_id);
                }
                Some(records)
            }
            Err(message) => {
                tracing::warn!("Page {} of {} failed: {}", page, self.source.name, message);
                self.result.record_error(page, message);
                self.result.stop(StopReason::PageError);
                None
            }
        }
    }

    /// Reconciles one record according to the run's mode
    ///
    /// Returns `None` when the store rejected the record; the record is skipped.
    fn reconcile(&mut self, record: Record) -> Option<ReconciliationOutcome> {
        let store = &self.engine.store;
        let source = &self.source.name;

        if !self.options.mode.updates_existing() {
            match store.record_exists(source, record.source_id) {
                Ok(true) => {
                    tracing::trace!("Item {} already stored", record.source_id);
                    return Some(ReconciliationOutcome::Unchanged);
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!("Failed to look up item {}: {}", record.source_id, e);
                    return None;
                }
            }
        }

        let upserted = match store.upsert_record(source, &record) {
            Ok(upserted) => upserted,
            Err(e) => {
                tracing::error!("Failed to store item {}: {}", record.source_id, e);
                return None;
            }
        };

        if upserted.outcome != ReconciliationOutcome::Unchanged {
            if let Err(e) =
                store.append_history(upserted.record_id, record.score, record.comment_count)
            {
                tracing::error!("Failed to append history for item {}: {}", record.source_id, e);
            }
        }

        tracing::trace!("Item {} {}", record.source_id, upserted.outcome);
        self.result.count(upserted.outcome);
        Some(upserted.outcome)
    }
}
