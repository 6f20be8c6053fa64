use crate::config::types::{Config, SelectorConfig, SourceConfig, StoreConfig};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

const MAX_PAGES_LIMIT: u32 = 1000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_store_config(&config.store)?;

    if config.sources.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[source]] must be configured".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        validate_source(source)?;
        if !seen.insert(source.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "duplicate source name '{}'",
                source.name
            )));
        }
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates one source entry
fn validate_source(source: &SourceConfig) -> Result<(), ConfigError> {
    if source.name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "source name cannot be empty".to_string(),
        ));
    }

    validate_http_url(&source.url, &source.name)?;
    if let Some(base) = &source.base_url {
        validate_http_url(base, &source.name)?;
    }

    if source.interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "interval_secs for '{}' must be >= 1, got {}",
            source.name, source.interval_secs
        )));
    }

    if source.max_pages < 1 || source.max_pages > MAX_PAGES_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_pages for '{}' must be between 1 and {}, got {}",
            source.name, MAX_PAGES_LIMIT, source.max_pages
        )));
    }

    if source.page_param.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "page_param for '{}' cannot be empty",
            source.name
        )));
    }

    validate_selectors(&source.selectors)
}

fn validate_http_url(raw: &str, source: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidUrl(format!("'{}' for source '{}': {}", raw, source, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "'{}' for source '{}' must use http or https",
            raw, source
        )));
    }

    Ok(())
}

/// Checks that every selector compiles
fn validate_selectors(selectors: &SelectorConfig) -> Result<(), ConfigError> {
    for (field, selector) in selectors.all() {
        Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
            selector: format!("{} = {}", field, selector),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::HttpConfig;

    fn config_with(sources: Vec<SourceConfig>) -> Config {
        Config {
            store: StoreConfig {
                database_path: "./test.db".to_string(),
            },
            http: HttpConfig::default(),
            sources,
        }
    }

    fn hn() -> SourceConfig {
        SourceConfig::new("hn", "https://news.ycombinator.com/newest")
    }

    #[test]
    fn test_valid_source() {
        assert!(validate(&config_with(vec![hn()])).is_ok());
    }

    #[test]
    fn test_no_sources() {
        assert!(matches!(
            validate(&config_with(vec![])),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_duplicate_names() {
        assert!(validate(&config_with(vec![hn(), hn()])).is_err());
    }

    #[test]
    fn test_bad_url() {
        let mut source = hn();
        source.url = "ftp://example.com/list".to_string();
        assert!(matches!(
            validate(&config_with(vec![source])),
            Err(ConfigError::InvalidUrl(_))
        ));

        let mut source = hn();
        source.base_url = Some("not a url".to_string());
        assert!(validate(&config_with(vec![source])).is_err());
    }

    #[test]
    fn test_max_pages_bounds() {
        let mut source = hn();
        source.max_pages = 0;
        assert!(validate(&config_with(vec![source.clone()])).is_err());

        source.max_pages = MAX_PAGES_LIMIT + 1;
        assert!(validate(&config_with(vec![source.clone()])).is_err());

        source.max_pages = MAX_PAGES_LIMIT;
        assert!(validate(&config_with(vec![source])).is_ok());
    }

    #[test]
    fn test_invalid_selector() {
        let mut source = hn();
        source.selectors.score = "[[".to_string();
        assert!(matches!(
            validate(&config_with(vec![source])),
            Err(ConfigError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn test_empty_page_param() {
        let mut source = hn();
        source.page_param = " ".to_string();
        assert!(validate(&config_with(vec![source])).is_err());
    }
}
