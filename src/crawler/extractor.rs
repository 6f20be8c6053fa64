//! Listing page parser
//!
//! Turns the markup of one listing page into records, in page order. Each item
//! is an element matched by the source's item selector; its score, author, age
//! and comment links live in the element that follows it (the metadata row).
//! A malformed item is logged and dropped without affecting its neighbours.

use crate::config::SourceConfig;
use crate::crawler::timestamp::resolve_published_at;
use crate::model::{Record, UNKNOWN_AUTHOR};
use crate::ParseError;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Record extractor compiled from a source's selector set
#[derive(Debug, Clone)]
pub struct RecordExtractor {
    item: Selector,
    title: Selector,
    metadata: Selector,
    score: Selector,
    author: Selector,
    age: Selector,
    anchor: Selector,
    base: Option<Url>,
}

impl RecordExtractor {
    /// Compiles the selectors of a source
    ///
    /// # Arguments
    ///
    /// * `source` - The source whose selectors and base URL are used
    ///
    /// # Returns
    ///
    /// * `Ok(RecordExtractor)` - All selectors compiled
    /// * `Err(ParseError::InvalidSelector)` - A selector is not valid CSS
    pub fn new(source: &SourceConfig) -> Result<Self, ParseError> {
        let selectors = &source.selectors;
        Ok(Self {
            item: compile(&selectors.item)?,
            title: compile(&selectors.title)?,
            metadata: compile(&selectors.metadata)?,
            score: compile(&selectors.score)?,
            author: compile(&selectors.author)?,
            age: compile(&selectors.age)?,
            anchor: compile("a")?,
            base: Url::parse(source.link_base()).ok(),
        })
    }

    /// Extracts records, resolving relative ages against the current time
    pub fn extract(&self, html: &str) -> Result<Vec<Record>, ParseError> {
        self.extract_at(html, Utc::now())
    }

    /// Extracts records with an explicit reference time
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Record>)` - Records in page order; empty for blank markup or
    ///   when no item matched
    pub fn extract_at(&self, html: &str, now: DateTime<Utc>) -> Result<Vec<Record>, ParseError> {
        if html.trim().is_empty() {
            tracing::debug!("Blank listing page");
            return Ok(Vec::new());
        }

        let document = Html::parse_document(html);
        let mut records = Vec::new();

        for element in document.select(&self.item) {
            match self.extract_item(element, now) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("Dropping listing item: {}", e),
            }
        }

        Ok(records)
    }

    fn extract_item(&self, element: ElementRef<'_>, now: DateTime<Utc>) -> Result<Record, ParseError> {
        let source_id = parse_identifier(element)?;

        let (title, link) = self.extract_title(element);

        let row = element
            .next_siblings()
            .find_map(ElementRef::wrap)
            .ok_or(ParseError::MissingMetadata(source_id))?;

        // A row without the metadata region still yields the item, with defaults
        let metadata = row.select(&self.metadata).next();
        if metadata.is_none() {
            tracing::debug!("Item {} has no metadata region", source_id);
        }

        let score = metadata
            .and_then(|m| m.select(&self.score).next())
            .and_then(|el| leading_number(&text_of(el)))
            .unwrap_or(0);

        let author = metadata
            .and_then(|m| m.select(&self.author).next())
            .map(text_of)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

        let published_at = match metadata.and_then(|m| m.select(&self.age).next()) {
            Some(age) => resolve_published_at(age.value().attr("title"), &text_of(age), now),
            None => now,
        };

        let comment_count = metadata
            .map(|m| self.extract_comment_count(m))
            .unwrap_or(0);

        tracing::trace!("Extracted item {} ({} points)", source_id, score);

        Ok(Record {
            source_id,
            title,
            link,
            author,
            score,
            comment_count,
            published_at,
            captured_at: now,
        })
    }

    /// First anchor in the title region; site-relative links are made absolute
    fn extract_title(&self, element: ElementRef<'_>) -> (String, String) {
        let anchor = element
            .select(&self.title)
            .next()
            .and_then(|region| region.select(&self.anchor).next());

        let Some(anchor) = anchor else {
            return (String::new(), String::new());
        };

        let title = text_of(anchor);
        let href = anchor.value().attr("href").unwrap_or("").trim();
        let link = match &self.base {
            Some(base) if !href.is_empty() => base
                .join(href)
                .map(|url| url.to_string())
                .unwrap_or_else(|_| href.to_string()),
            _ => href.to_string(),
        };

        (title, link)
    }

    /// Scans every anchor of the metadata row; the last "N comments" wins
    fn extract_comment_count(&self, metadata: ElementRef<'_>) -> u32 {
        let mut count = 0;
        for anchor in metadata.select(&self.anchor) {
            let text = text_of(anchor).replace('\u{a0}', " ").to_lowercase();
            if text == "discuss" {
                continue;
            }
            if text.contains("comment") {
                if let Some(n) = leading_number(&text) {
                    count = n;
                }
            }
        }
        count
    }
}

fn compile(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

fn parse_identifier(element: ElementRef<'_>) -> Result<u64, ParseError> {
    let raw = element
        .value()
        .attr("id")
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(ParseError::MissingIdentifier)?;

    match raw.parse::<u64>() {
        Ok(0) | Err(_) => Err(ParseError::InvalidIdentifier(raw.to_string())),
        Ok(id) => Ok(id),
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Leading integer of text such as "42 points" or "7 comments"
fn leading_number(text: &str) -> Option<u32> {
    text.split_whitespace().next()?.parse().ok()
}
