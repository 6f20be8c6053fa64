//! Shared data model
//!
//! - `Record`: one harvested listing item
//! - `ReconciliationOutcome`: what reconciling a record did to the store
//! - `CrawlMode` / `StopReason`: how a run pages through a feed and why it stopped
//! - `ScrapingResult` / `RunDetail`: the summary of one run and its persisted form

mod mode;
mod record;
mod result;

pub use mode::{CrawlMode, StopReason};
pub use record::{Record, ReconciliationOutcome, UNKNOWN_AUTHOR};
pub use result::{RunDetail, ScrapingResult};
