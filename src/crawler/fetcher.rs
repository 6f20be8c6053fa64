//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests returning the page body
//! - Page URL construction for paginated listings

use crate::config::{HttpConfig, SourceConfig};
use crate::FetchError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Retrieves the raw markup of one listing page
///
/// The engine only talks to this trait, so tests can serve canned pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The HTTP configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(timeout) = config.timeout() {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// `PageFetcher` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    /// Fetches a URL, treating any non-2xx status as a failure
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })
    }
}

/// Builds the URL of a listing page
///
/// Page 1 is the configured URL as-is; later pages carry the page number in
/// the source's page parameter.
///
/// # Arguments
///
/// * `source` - The source being crawled
/// * `page` - 1-based page number
pub fn page_url(source: &SourceConfig, page: u32) -> String {
    if page <= 1 {
        return source.url.clone();
    }

    match Url::parse(&source.url) {
        Ok(mut url) => {
            url.query_pairs_mut()
                .append_pair(&source.page_param, &page.to_string());
            url.to_string()
        }
        // Validated configs always parse; keep something fetchable regardless
        Err(_) => {
            let separator = if source.url.contains('?') { '&' } else { '?' };
            format!("{}{}{}={}", source.url, separator, source.page_param, page)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let config = HttpConfig::default();
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_build_http_client_without_timeout() {
        let config = HttpConfig {
            user_agent: "TestCrawler/1.0".to_string(),
            timeout_secs: 0,
        };
        assert!(config.timeout().is_none());
        assert!(build_http_client(&config).is_ok());
    }

    #[test]
    fn test_first_page_is_bare_url() {
        let source = SourceConfig::new("hn", "https://news.ycombinator.com/newest");
        assert_eq!(page_url(&source, 1), "https://news.ycombinator.com/newest");
    }

    #[test]
    fn test_later_pages_use_page_param() {
        let mut source = SourceConfig::new("hn", "https://news.ycombinator.com/");
        assert_eq!(page_url(&source, 3), "https://news.ycombinator.com/?p=3");

        source.page_param = "page".to_string();
        assert_eq!(page_url(&source, 2), "https://news.ycombinator.com/?page=2");
    }

    #[test]
    fn test_page_param_appended_to_existing_query() {
        let source = SourceConfig::new("ask", "https://news.ycombinator.com/ask?sort=new");
        assert_eq!(
            page_url(&source, 2),
            "https://news.ycombinator.com/ask?sort=new&p=2"
        );
    }
}
