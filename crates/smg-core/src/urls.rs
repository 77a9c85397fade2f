//! URL building: document identifier to absolute URL.
//!
//! A [`UrlBuilder`] is validated once when constructed, so a malformed
//! template fails the whole source immediately instead of failing every
//! record individually.

use smg_common::config::URL_TEMPLATE_PLACEHOLDER;
use url::Url;

use crate::error::{Error, Result};

const SAMPLE_ID: &str = "sample-id-123";

/// Turns document identifiers into absolute URLs via a `{id}` template
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    template: String,
}

impl UrlBuilder {
    /// Validate the template and build a reusable builder.
    ///
    /// Requirements: exactly one `{id}` placeholder, no other braces, and
    /// a sample substitution must parse as an absolute http(s) URL.
    pub fn new(template: &str) -> Result<Self> {
        if template.trim().is_empty() {
            return Err(Error::config("URL template must not be empty"));
        }

        let placeholders = template.matches(URL_TEMPLATE_PLACEHOLDER).count();
        if placeholders != 1 {
            return Err(Error::config(format!(
                "URL template must contain exactly one {} placeholder (found {})",
                URL_TEMPLATE_PLACEHOLDER, placeholders
            )));
        }

        let stripped = template.replacen(URL_TEMPLATE_PLACEHOLDER, "", 1);
        if stripped.contains('{') || stripped.contains('}') {
            return Err(Error::config(format!(
                "URL template contains unsupported placeholders, only {} is supported: {}",
                URL_TEMPLATE_PLACEHOLDER, template
            )));
        }

        let sample = template.replacen(URL_TEMPLATE_PLACEHOLDER, SAMPLE_ID, 1);
        let parsed = Url::parse(&sample)
            .map_err(|e| Error::config(format!("URL template generates invalid URLs: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {},
            other => {
                return Err(Error::config(format!(
                    "URL template must use http or https, got '{}'",
                    other
                )));
            },
        }

        if parsed.host_str().is_none() {
            return Err(Error::config("URL template is missing a host"));
        }

        Ok(Self {
            template: template.to_string(),
        })
    }

    /// Build the absolute URL for one identifier.
    ///
    /// The identifier is percent-encoded with no characters exempt, so
    /// slashes and spaces in identifiers cannot alter the URL structure.
    pub fn build(&self, id: &str) -> Result<String> {
        if id.trim().is_empty() {
            return Err(Error::data("Document identifier is empty"));
        }

        let encoded = urlencoding::encode(id);
        Ok(self
            .template
            .replacen(URL_TEMPLATE_PLACEHOLDER, &encoded, 1))
    }

    /// Sample URL for configuration display and dry runs
    pub fn preview(&self) -> String {
        self.template.replacen(URL_TEMPLATE_PLACEHOLDER, SAMPLE_ID, 1)
    }
}
