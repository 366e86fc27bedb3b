//! Configuration infrastructure
//!
//! Contains configuration loading and management for the update collector.
//!
//! Configuration is layered:
//! 1. Built-in defaults (`defaults` module)
//! 2. Optional config file (JSON/TOML/YAML, by extension)
//! 3. Environment overrides: `TITLE_UPDATES_FETCH__WORKERS=16`

#![allow(clippy::uninlined_format_args)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment prefix for overrides
pub const ENV_PREFIX: &str = "TITLE_UPDATES";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Config directory unavailable on this platform")]
    NoConfigDir,

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Manifest/link fetching behaviour (worker pool, retry policy)
    pub fetch: FetchConfig,

    /// Catalog listing pages
    pub catalog: CatalogConfig,

    /// Manifest endpoint
    pub manifest: ManifestConfig,

    /// Output files
    pub output: OutputConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Worker pool and retry settings consumed by the scheduler and resolver
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Concurrent manifest fetches
    pub workers: usize,

    /// Per-request timeout in seconds
    pub request_timeout_seconds: u64,

    /// Total GET attempts per URL (first try included)
    pub max_attempts: u32,

    /// Backoff base; delay before retry n is `base^n` units (n starts at 0)
    pub backoff_base: f64,

    /// Unit of the exponential backoff in milliseconds
    pub backoff_unit_ms: u64,

    /// Upper bound of the uniform random jitter added to each backoff
    pub jitter_max_ms: u64,

    /// Global request rate cap; 0 disables the limiter
    pub max_requests_per_second: u32,

    /// User agent string
    pub user_agent: String,

    /// Verify TLS certificates (the manifest CDN chain is often incomplete)
    pub verify_tls: bool,
}

/// Catalog listing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Listing page URL; `{page}` is replaced by the page number
    pub page_url_template: String,

    /// First page to scrape
    pub start_page: u32,

    /// Last page to scrape (inclusive)
    pub total_pages: u32,

    /// Minimum polite delay between listing pages
    pub page_delay_ms: u64,

    /// Random extra delay on top of `page_delay_ms`
    pub page_delay_jitter_ms: u64,
}

/// Manifest endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    /// Scheme + host of the update service
    pub host: String,

    /// First path segment (`tpl` for the unsigned PS3 path)
    pub path_prefix: String,

    /// Hex HMAC-SHA256 key; when set the URL carries a signed path segment
    pub signing_key_hex: Option<String>,
}

/// Output file settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Full merged catalog (entries + updates)
    pub updates_path: PathBuf,

    /// Minimal `{title, version, url}` export; skipped when `None`
    pub downloads_path: Option<PathBuf>,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output (daily rolling)
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub log_dir: Option<PathBuf>,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKERS,
            request_timeout_seconds: defaults::REQUEST_TIMEOUT_SECONDS,
            max_attempts: defaults::MAX_ATTEMPTS,
            backoff_base: defaults::BACKOFF_BASE,
            backoff_unit_ms: defaults::BACKOFF_UNIT_MS,
            jitter_max_ms: defaults::JITTER_MAX_MS,
            max_requests_per_second: defaults::MAX_REQUESTS_PER_SECOND,
            user_agent: defaults::USER_AGENT.to_string(),
            verify_tls: defaults::VERIFY_TLS,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            page_url_template: ps3::CATALOG_PAGE_URL.to_string(),
            start_page: 1,
            total_pages: defaults::TOTAL_PAGES,
            page_delay_ms: defaults::PAGE_DELAY_MS,
            page_delay_jitter_ms: defaults::PAGE_DELAY_JITTER_MS,
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            host: ps3::MANIFEST_HOST.to_string(),
            path_prefix: ps3::MANIFEST_PATH_PREFIX.to_string(),
            signing_key_hex: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            updates_path: PathBuf::from(defaults::UPDATES_FILENAME),
            downloads_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: false,
            log_dir: None,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("hyper_util".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "error".to_string());
                filters.insert("selectors".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl FetchConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl AppConfig {
    /// Loads defaults, then the optional file, then `TITLE_UPDATES_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            info!("📄 Loading configuration from {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects settings that would make the run meaningless before any work starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |message: &str| {
            Err(ConfigError::Validation {
                message: message.to_string(),
            })
        };

        if self.fetch.workers == 0 {
            return fail("fetch.workers must be greater than 0");
        }
        if self.fetch.max_attempts == 0 {
            return fail("fetch.max_attempts must be greater than 0");
        }
        if self.fetch.request_timeout_seconds == 0 {
            return fail("fetch.request_timeout_seconds must be greater than 0");
        }
        if !self.fetch.backoff_base.is_finite() || self.fetch.backoff_base < 1.0 {
            return fail("fetch.backoff_base must be a finite number >= 1.0");
        }
        if self.manifest.host.trim().is_empty() {
            return fail("manifest.host must not be empty");
        }
        if !self.catalog.page_url_template.contains("{page}") {
            return fail("catalog.page_url_template must contain a {page} placeholder");
        }
        if self.catalog.start_page == 0 || self.catalog.start_page > self.catalog.total_pages {
            return fail("catalog.start_page must be between 1 and catalog.total_pages");
        }
        if let Some(key) = &self.manifest.signing_key_hex {
            if hex::decode(key.trim()).is_err() {
                return fail("manifest.signing_key_hex is not valid hex");
            }
        }
        Ok(())
    }
}

/// Configuration manager for locating and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the application configuration directory
    pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(defaults::APP_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Manager pointing at `<config dir>/ps3-update-collector/config.json`
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_dir()?.join(defaults::CONFIG_FILENAME);
        Ok(Self { config_path })
    }

    pub fn with_path(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
        }
    }

    /// Loads the managed file when present, plain defaults + env otherwise.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        if self.config_path.exists() {
            AppConfig::load(Some(self.config_path.as_path()))
        } else {
            AppConfig::load(None)
        }
    }

    /// Writes `config` as pretty JSON, creating the directory when needed.
    pub async fn save_config(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: self.config_path.clone(),
            source,
        };

        if let Some(dir) = self.config_path.parent() {
            if !dir.as_os_str().is_empty() {
                tokio::fs::create_dir_all(dir).await.map_err(write_err)?;
            }
        }
        let body = serde_json::to_string_pretty(config)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        tokio::fs::write(&self.config_path, body)
            .await
            .map_err(write_err)?;

        info!("✅ Configuration saved to {:?}", self.config_path);
        Ok(())
    }
}

/// PS3 endpoints
pub mod ps3 {
    /// Catalog listing (newest first)
    pub const CATALOG_PAGE_URL: &str = "https://renascene.com/ps3/?target=list&ord=desc&page={page}";

    /// Update manifest CDN
    pub const MANIFEST_HOST: &str = "https://a0.ww.np.dl.playstation.net";

    /// Unsigned title patch path
    pub const MANIFEST_PATH_PREFIX: &str = "tpl";
}

/// Default configuration values
pub mod defaults {
    /// Default concurrent manifest fetches
    pub const WORKERS: usize = 8;

    /// Default request timeout in seconds
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 30;

    /// Default total attempts per URL
    pub const MAX_ATTEMPTS: u32 = 3;

    /// Default exponential backoff base
    pub const BACKOFF_BASE: f64 = 1.6;

    /// Default backoff unit (one second)
    pub const BACKOFF_UNIT_MS: u64 = 1000;

    /// Default maximum jitter in milliseconds
    pub const JITTER_MAX_MS: u64 = 500;

    /// Rate limiter disabled by default
    pub const MAX_REQUESTS_PER_SECOND: u32 = 0;

    /// Browser-like user agent; the catalog site rejects obvious bots
    pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

    /// TLS verification off by default
    pub const VERIFY_TLS: bool = false;

    /// Default number of catalog listing pages
    pub const TOTAL_PAGES: u32 = 41;

    /// Default polite delay between listing pages
    pub const PAGE_DELAY_MS: u64 = 200;

    /// Default random extra delay between listing pages
    pub const PAGE_DELAY_JITTER_MS: u64 = 200;

    /// Default merged output filename
    pub const UPDATES_FILENAME: &str = "ps3_updates.json";

    /// Default log level
    pub const LOG_LEVEL: &str = "info";

    /// Directory name under the platform config dir
    pub const APP_DIR_NAME: &str = "ps3-update-collector";

    /// Managed config file name
    pub const CONFIG_FILENAME: &str = "config.json";
}
