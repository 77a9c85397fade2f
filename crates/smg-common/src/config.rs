//! Configuration model and loader.
//!
//! Configuration lives in a TOML file (default `smg.toml`) with one
//! `[[sources]]` table per document store plus a global `[sitemap]` section:
//!
//! ```toml
//! parallel_workers = 4
//!
//! [sitemap]
//! output_dir = "./sitemaps"
//! max_urls_per_file = 50000
//! compress = true
//! base_url = "https://www.example.org/sitemaps/"
//!
//! [[sources]]
//! name = "products"
//! endpoint = "http://localhost:8983/solr/products"
//! id_field = "id"
//! date_field = "last_modified"
//! url_template = "https://www.example.org/product/{id}"
//! changefreq = "daily"
//! ```
//!
//! [`AppConfig::load`] only parses; call [`AppConfig::validate`] before
//! handing the configuration to the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

// ============================================================================
// Constants
// ============================================================================

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "smg.toml";

/// Default documents fetched per page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Default per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default output directory for generated files
pub const DEFAULT_OUTPUT_DIR: &str = "./sitemaps";

/// Default maximum URL entries per sitemap file
pub const DEFAULT_MAX_URLS_PER_FILE: usize = 50_000;

/// Hard ceiling on URL entries per sitemap file (sitemaps.org limit)
pub const MAX_URLS_PER_FILE_LIMIT: usize = 50_000;

/// Default number of sources processed concurrently
pub const DEFAULT_PARALLEL_WORKERS: usize = 4;

/// Placeholder substituted with the document identifier in URL templates
pub const URL_TEMPLATE_PLACEHOLDER: &str = "{id}";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Change frequency
// ============================================================================

/// Sitemap `<changefreq>` tag values as defined by sitemaps.org
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    #[default]
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    /// The lowercase tag text written into sitemap XML
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Always => "always",
            ChangeFreq::Hourly => "hourly",
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
            ChangeFreq::Yearly => "yearly",
            ChangeFreq::Never => "never",
        }
    }
}

impl std::str::FromStr for ChangeFreq {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(ChangeFreq::Always),
            "hourly" => Ok(ChangeFreq::Hourly),
            "daily" => Ok(ChangeFreq::Daily),
            "weekly" => Ok(ChangeFreq::Weekly),
            "monthly" => Ok(ChangeFreq::Monthly),
            "yearly" => Ok(ChangeFreq::Yearly),
            "never" => Ok(ChangeFreq::Never),
            _ => Err(ConfigError::Invalid(format!(
                "Unknown change frequency: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Source specification
// ============================================================================

/// One document store to extract from.
///
/// Immutable after load; the pipeline treats every field as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Short name, used in file names and logs ([A-Za-z0-9_-] only)
    pub name: String,

    /// Store endpoint, e.g. `http://localhost:8983/solr/products`
    pub endpoint: Url,

    /// Document field holding the identifier
    pub id_field: String,

    /// Document field holding the last-modified timestamp
    pub date_field: String,

    /// URL template with exactly one `{id}` placeholder
    pub url_template: String,

    /// Revisit frequency tag written to each entry
    #[serde(default)]
    pub changefreq: ChangeFreq,

    /// Documents fetched per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Cap iteration at 10 documents for development runs
    #[serde(default)]
    pub test_mode: bool,
}

// ============================================================================
// Sitemap output settings
// ============================================================================

/// Global output settings shared by every source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// Directory receiving generated files
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum URL entries per sitemap file (hard cap 50000)
    #[serde(default = "default_max_urls_per_file")]
    pub max_urls_per_file: usize,

    /// Gzip-compress data files
    #[serde(default = "default_true")]
    pub compress: bool,

    /// Public base URL the index uses to address data files
    pub base_url: Url,
}

// ============================================================================
// Application configuration
// ============================================================================

/// Root configuration: all sources plus global settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Sources to process, in configuration order
    pub sources: Vec<SourceSpec>,

    /// Output settings
    pub sitemap: SitemapConfig,

    /// Concurrency ceiling across sources
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,

    /// Log level override from the config file
    #[serde(default)]
    pub log_level: Option<crate::logging::LogLevel>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_max_urls_per_file() -> usize {
    DEFAULT_MAX_URLS_PER_FILE
}

fn default_true() -> bool {
    true
}

fn default_parallel_workers() -> usize {
    DEFAULT_PARALLEL_WORKERS
}

impl AppConfig {
    /// Parse configuration from a TOML file.
    ///
    /// Parsing only; call [`validate`](Self::validate) before use.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check every static invariant the pipeline depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid(
                "At least one source must be configured".to_string(),
            ));
        }

        if self.parallel_workers == 0 {
            return Err(ConfigError::Invalid(
                "parallel_workers must be at least 1".to_string(),
            ));
        }

        if self.sitemap.max_urls_per_file == 0
            || self.sitemap.max_urls_per_file > MAX_URLS_PER_FILE_LIMIT
        {
            return Err(ConfigError::Invalid(format!(
                "max_urls_per_file must be between 1 and {}",
                MAX_URLS_PER_FILE_LIMIT
            )));
        }

        check_http_url(&self.sitemap.base_url, "sitemap.base_url")?;

        let mut seen = HashSet::new();
        for source in &self.sources {
            source.validate()?;
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "Duplicate source name: {}",
                    source.name
                )));
            }
        }

        Ok(())
    }

    /// Apply environment overrides: `SMG_OUTPUT_DIR`, `SMG_WORKERS`.
    ///
    /// Unparsable values are ignored with a warning so a stray variable
    /// cannot silently break a configured run.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("SMG_OUTPUT_DIR") {
            self.sitemap.output_dir = PathBuf::from(dir);
        }

        if let Ok(workers) = std::env::var("SMG_WORKERS") {
            match workers.parse::<usize>() {
                Ok(n) if n > 0 => self.parallel_workers = n,
                _ => tracing::warn!(value = %workers, "Ignoring invalid SMG_WORKERS"),
            }
        }
    }

    /// Configuration for tests: one local source, temp-friendly defaults
    #[allow(clippy::unwrap_used)]
    pub fn test_config() -> Self {
        let endpoint = Url::parse("http://localhost:8983/solr/products").unwrap();
        let base_url = Url::parse("https://www.example.org/sitemaps/").unwrap();

        Self {
            sources: vec![SourceSpec {
                name: "products".to_string(),
                endpoint,
                id_field: "id".to_string(),
                date_field: "last_modified".to_string(),
                url_template: "https://www.example.org/product/{id}".to_string(),
                changefreq: ChangeFreq::Daily,
                page_size: DEFAULT_PAGE_SIZE,
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                test_mode: false,
            }],
            sitemap: SitemapConfig {
                output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
                max_urls_per_file: DEFAULT_MAX_URLS_PER_FILE,
                compress: true,
                base_url,
            },
            parallel_workers: DEFAULT_PARALLEL_WORKERS,
            log_level: None,
        }
    }
}

impl SourceSpec {
    /// Validate this source's static invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid(
                "Source name must not be empty".to_string(),
            ));
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "Source name '{}' may only contain letters, digits, '-' and '_'",
                self.name
            )));
        }

        check_http_url(&self.endpoint, &format!("source '{}' endpoint", self.name))?;

        if self.id_field.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Source '{}' is missing id_field",
                self.name
            )));
        }

        if self.date_field.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Source '{}' is missing date_field",
                self.name
            )));
        }

        let placeholders = self.url_template.matches(URL_TEMPLATE_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(ConfigError::Invalid(format!(
                "Source '{}' url_template must contain exactly one {} placeholder (found {})",
                self.name, URL_TEMPLATE_PLACEHOLDER, placeholders
            )));
        }

        if self.page_size == 0 {
            return Err(ConfigError::Invalid(format!(
                "Source '{}' page_size must be at least 1",
                self.name
            )));
        }

        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid(format!(
                "Source '{}' timeout_secs must be at least 1",
                self.name
            )));
        }

        Ok(())
    }
}

fn check_http_url(url: &Url, what: &str) -> Result<(), ConfigError> {
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{} must use http or https, got '{}'",
            what, other
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
        [sitemap]
        base_url = "https://www.example.org/sitemaps/"

        [[sources]]
        name = "products"
        endpoint = "http://localhost:8983/solr/products"
        id_field = "id"
        date_field = "last_modified"
        url_template = "https://www.example.org/product/{id}"
    "#;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let config: AppConfig = toml::from_str(MINIMAL_TOML).unwrap();

        assert_eq!(config.parallel_workers, DEFAULT_PARALLEL_WORKERS);
        assert_eq!(config.sitemap.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(config.sitemap.max_urls_per_file, DEFAULT_MAX_URLS_PER_FILE);
        assert!(config.sitemap.compress);
        assert!(config.log_level.is_none());

        let source = &config.sources[0];
        assert_eq!(source.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(source.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert_eq!(source.changefreq, ChangeFreq::Daily);
        assert!(!source.test_mode);

        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].name, "products");
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load("/nonexistent/smg.toml").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_load_malformed_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"sources = not valid toml [").unwrap();

        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_empty_sources() {
        let mut config = AppConfig::test_config();
        config.sources.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("At least one source")
        ));
    }

    #[test]
    fn test_validate_duplicate_names() {
        let mut config = AppConfig::test_config();
        let duplicate = config.sources[0].clone();
        config.sources.push(duplicate);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("Duplicate source name")
        ));
    }

    #[test]
    fn test_validate_name_characters() {
        let mut config = AppConfig::test_config();
        config.sources[0].name = "bad/name".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_template_placeholder() {
        let mut config = AppConfig::test_config();

        config.sources[0].url_template = "https://www.example.org/product/".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("exactly one {id}")
        ));

        config.sources[0].url_template = "https://www.example.org/{id}/{id}".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_urls_ceiling() {
        let mut config = AppConfig::test_config();

        config.sitemap.max_urls_per_file = MAX_URLS_PER_FILE_LIMIT + 1;
        assert!(config.validate().is_err());

        config.sitemap.max_urls_per_file = MAX_URLS_PER_FILE_LIMIT;
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_zero_page_size() {
        let mut config = AppConfig::test_config();
        config.sources[0].page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_endpoint_scheme() {
        let toml = MINIMAL_TOML.replace("http://localhost", "ftp://localhost");
        let config: AppConfig = toml::from_str(&toml).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid(msg)) if msg.contains("http or https")
        ));
    }

    #[test]
    fn test_changefreq_round_trip() {
        assert_eq!("weekly".parse::<ChangeFreq>().unwrap(), ChangeFreq::Weekly);
        assert_eq!("HOURLY".parse::<ChangeFreq>().unwrap(), ChangeFreq::Hourly);
        assert_eq!(ChangeFreq::Never.to_string(), "never");
        assert!("sometimes".parse::<ChangeFreq>().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::test_config();

        std::env::set_var("SMG_OUTPUT_DIR", "/tmp/smg-test-out");
        std::env::set_var("SMG_WORKERS", "2");
        config.apply_env_overrides();
        std::env::remove_var("SMG_OUTPUT_DIR");
        std::env::remove_var("SMG_WORKERS");

        assert_eq!(config.sitemap.output_dir, PathBuf::from("/tmp/smg-test-out"));
        assert_eq!(config.parallel_workers, 2);
    }

    #[test]
    fn test_env_override_ignores_garbage_workers() {
        let mut config = AppConfig::test_config();
        let before = config.parallel_workers;

        std::env::set_var("SMG_WORKERS", "many");
        config.apply_env_overrides();
        std::env::remove_var("SMG_WORKERS");

        assert_eq!(config.parallel_workers, before);
    }
}
