//! Infrastructure layer for HTTP access, parsing, configuration and output
//!
//! This module provides the network client and retry policy, manifest and
//! catalog parsing, the manifest URL builder, and logging/config setup.

pub mod catalog_scraper;
pub mod config; // Configuration constants and helpers
pub mod http_client;
pub mod logging; // Logging infrastructure
pub mod manifest_url;
pub mod output;
pub mod parsing;
pub mod retry_policy;

// Re-export commonly used items
pub use catalog_scraper::CatalogScraper;
pub use config::{AppConfig, ConfigError, ConfigManager};
pub use http_client::{fetch_with_policy, HttpClient, HttpFetcher, HttpReply, TransportError};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use manifest_url::ManifestUrlBuilder;
pub use parsing::{parse_manifest, CatalogParser, ParsingError, ParsingResult};
pub use retry_policy::{RetryDecision, RetryPolicy, StatusClass};
