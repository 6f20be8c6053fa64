//! Canned listing pages and an in-process fetcher for crawler tests

use crate::crawler::PageFetcher;
use crate::FetchError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// One listed item in a generated page
#[derive(Debug, Clone, Copy)]
pub struct Item {
    pub id: u64,
    pub score: u32,
    pub comments: u32,
}

impl Item {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            score: 1,
            comments: 0,
        }
    }

    pub fn with_score(mut self, score: u32) -> Self {
        self.score = score;
        self
    }

    pub fn with_comments(mut self, comments: u32) -> Self {
        self.comments = comments;
        self
    }
}

/// Renders a listing page in the Hacker News layout
pub fn listing_page(items: &[Item]) -> String {
    let mut rows = String::new();
    for item in items {
        let comments = if item.comments == 0 {
            "discuss".to_string()
        } else {
            format!("{}&nbsp;comments", item.comments)
        };
        rows.push_str(&format!(
            r#"<tr class="athing" id="{id}">
  <td class="title"><span class="titleline"><a href="https://example.com/story/{id}">Story {id}</a></span></td>
</tr>
<tr>
  <td class="subtext"><span class="score">{score} points</span> by <a href="user?id=alice" class="hnuser">alice</a>
  <span class="age" title="2024-03-10T08:30:00 1710059400"><a href="item?id={id}">3 hours ago</a></span>
  | <a href="hide?id={id}">hide</a> | <a href="item?id={id}">{comments}</a></td>
</tr>
<tr class="spacer"></tr>
"#,
            id = item.id,
            score = item.score,
            comments = comments,
        ));
    }
    format!(
        "<html><head><title>Listing</title></head><body><table>{}</table></body></html>",
        rows
    )
}

/// Items with the given identifiers and default counters
pub fn items(ids: &[u64]) -> Vec<Item> {
    ids.iter().copied().map(Item::new).collect()
}

/// Serves pages from a map keyed by URL; unknown URLs answer HTTP 404
#[derive(Default)]
pub struct StaticFetcher {
    pages: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: String) -> Self {
        self.set_page(url, html);
        self
    }

    pub fn set_page(&self, url: &str, html: String) {
        self.pages.lock().unwrap().insert(url.to_string(), html);
    }

    /// URLs requested so far, in order
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}
