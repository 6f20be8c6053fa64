use crate::model::CrawlMode;
use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for feedsync
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by name
    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Sources with `enabled = true`, in file order
    pub fn enabled_sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|s| s.enabled)
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// User agent sent with every page request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Whole-request timeout in seconds; 0 disables it
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// One configured listing feed
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique source name, used as the scheduler key and the storage scope
    pub name: String,

    /// URL of the first listing page
    pub url: String,

    /// Base for resolving site-relative item links (defaults to `url`)
    #[serde(rename = "base-url", default)]
    pub base_url: Option<String>,

    /// Seconds between scheduled runs
    #[serde(rename = "interval-secs", default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Strategy used by scheduled runs and by default on the command line
    #[serde(default)]
    pub mode: CrawlMode,

    /// Upper bound on pages visited by the multi-page modes
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Query parameter carrying the page number for pages after the first
    #[serde(rename = "page-param", default = "default_page_param")]
    pub page_param: String,

    /// Full-archive mode stops on the first page that stores nothing new
    #[serde(rename = "stop-on-duplicate", default)]
    pub stop_on_duplicate: bool,

    #[serde(default)]
    pub selectors: SelectorConfig,
}

impl SourceConfig {
    /// Creates a source with default settings and selectors
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            base_url: None,
            interval_secs: default_interval_secs(),
            enabled: true,
            mode: CrawlMode::default(),
            max_pages: default_max_pages(),
            page_param: default_page_param(),
            stop_on_duplicate: false,
            selectors: SelectorConfig::default(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn link_base(&self) -> &str {
        self.base_url.as_deref().unwrap_or(&self.url)
    }
}

/// CSS selectors locating each field of a listed item
///
/// `item` matches one element per record and must carry the numeric `id`
/// attribute. `metadata` is searched in the element following the item.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_item_selector")]
    pub item: String,

    #[serde(default = "default_title_selector")]
    pub title: String,

    #[serde(default = "default_metadata_selector")]
    pub metadata: String,

    #[serde(default = "default_score_selector")]
    pub score: String,

    #[serde(default = "default_author_selector")]
    pub author: String,

    #[serde(default = "default_age_selector")]
    pub age: String,
}

impl SelectorConfig {
    /// All selectors with their field names, for validation and error messages
    pub fn all(&self) -> [(&'static str, &str); 6] {
        [
            ("item", &self.item),
            ("title", &self.title),
            ("metadata", &self.metadata),
            ("score", &self.score),
            ("author", &self.author),
            ("age", &self.age),
        ]
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            item: default_item_selector(),
            title: default_title_selector(),
            metadata: default_metadata_selector(),
            score: default_score_selector(),
            author: default_author_selector(),
            age: default_age_selector(),
        }
    }
}

fn default_user_agent() -> String {
    format!("feedsync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_interval_secs() -> u64 {
    300
}

fn default_enabled() -> bool {
    true
}

fn default_max_pages() -> u32 {
    10
}

fn default_page_param() -> String {
    "p".to_string()
}

fn default_item_selector() -> String {
    "tr.athing".to_string()
}

fn default_title_selector() -> String {
    ".titleline".to_string()
}

fn default_metadata_selector() -> String {
    ".subtext".to_string()
}

fn default_score_selector() -> String {
    ".score".to_string()
}

fn default_author_selector() -> String {
    ".hnuser".to_string()
}

fn default_age_selector() -> String {
    ".age".to_string()
}
