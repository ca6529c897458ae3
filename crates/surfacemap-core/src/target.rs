//! Scan target definitions

use crate::error::{Error, Result};
use url::Url;

/// Schemes a target may use
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// A web application to scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    /// URL exactly as supplied by the operator
    raw: String,
    /// Parsed form of `raw`
    url: Url,
}

impl ScanTarget {
    /// Parse a target URL, rejecting anything that is not http or https
    pub fn parse(s: &str) -> Result<Self> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(Error::InvalidUrl("empty target".into()));
        }

        let url = Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{}: {}", raw, e)))?;

        if !ALLOWED_SCHEMES.contains(&url.scheme()) {
            return Err(Error::InvalidUrl(format!(
                "URL must start with http:// or https:// (got {})",
                raw
            )));
        }

        if url.host_str().is_none() {
            return Err(Error::InvalidUrl(format!("{} has no host", raw)));
        }

        Ok(Self {
            raw: raw.to_string(),
            url,
        })
    }

    /// The target as the operator wrote it; this is what gets sent to the engine
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parsed URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host name without port
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// URL scheme (http or https)
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

impl std::fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}
