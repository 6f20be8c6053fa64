//! Crawler module for listing feeds
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching of listing pages
//! - Record extraction and publication time resolution
//! - The per-run crawl strategies
//! - Periodic per-source scheduling

mod engine;
mod extractor;
mod fetcher;
mod scheduler;
pub mod timestamp;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::{CrawlEngine, RunOptions};
pub use extractor::RecordExtractor;
pub use fetcher::{build_http_client, page_url, HttpFetcher, PageFetcher};
pub use scheduler::SourceScheduler;
