//! SMG Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared configuration and logging for the SMG workspace.
//!
//! # Overview
//!
//! This crate provides functionality used by both the pipeline library and
//! the CLI:
//!
//! - **Configuration**: the `smg.toml` model (sources, sitemap output,
//!   worker count) with parsing, defaults, and validation
//! - **Logging**: tracing subscriber setup with console/file targets and
//!   text/JSON formats
//!
//! # Example
//!
//! ```no_run
//! use smg_common::config::AppConfig;
//!
//! fn load() -> Result<AppConfig, smg_common::config::ConfigError> {
//!     let config = AppConfig::load("smg.toml")?;
//!     config.validate()?;
//!     Ok(config)
//! }
//! ```

pub mod config;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ChangeFreq, ConfigError, SitemapConfig, SourceSpec};
pub use logging::{init_logging, LogConfig};
