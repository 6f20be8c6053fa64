//! Configuration module for feedsync
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use feedsync::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("feedsync.toml")).unwrap();
//! for source in config.enabled_sources() {
//!     println!("{} every {}s", source.name, source.interval_secs);
//! }
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, HttpConfig, SelectorConfig, SourceConfig, StoreConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
