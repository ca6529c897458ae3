//! Control API message types
//!
//! Wire shapes of the engine's JSON API. Every numeric value arrives as a
//! JSON string, so identifiers stay strings and status is parsed on demand.

use serde::{Deserialize, Serialize};
use surfacemap_core::model::null_as_default;

/// Handle of a running remote job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The two kinds of long-running job the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Hyperlink-following crawl
    Spider,
    /// Injection/probing pass over crawled URLs
    ActiveScan,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Spider => "spider",
            JobKind::ActiveScan => "active scan",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One alert as reported by the engine
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertRecord {
    /// Alert title
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "pluginId", default, deserialize_with = "null_as_default")]
    pub plugin_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub param: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attack: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub confidence: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub solution: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NewContextResponse {
    #[serde(rename = "contextId")]
    pub context_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScanStartedResponse {
    pub scan: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResultsResponse {
    #[serde(default)]
    pub results: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertsResponse {
    #[serde(default)]
    pub alerts: Vec<AlertRecord>,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Parse a job status percentage, clamping values above 100
pub fn parse_progress(raw: &str) -> Option<u8> {
    let value: i64 = raw.trim().parse().ok()?;
    if value < 0 {
        return None;
    }
    Some(value.min(100) as u8)
}
