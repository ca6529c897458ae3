//! The control surface of the external scan engine
//!
//! Spidering and active scanning happen inside the engine; SurfaceMap only
//! starts jobs, polls their progress and collects results through this trait.

use crate::types::{AlertRecord, JobId, JobKind};

/// Scan engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),
}

impl From<EngineError> for surfacemap_core::Error {
    fn from(e: EngineError) -> Self {
        surfacemap_core::Error::Engine(e.to_string())
    }
}

/// Operations consumed from the scan engine
#[async_trait::async_trait]
pub trait ScanEngine: Send + Sync {
    /// Create a named context; returns its id
    async fn new_context(&self, name: &str) -> Result<String, EngineError>;

    /// Add a URL regex to the named context
    async fn include_in_context(&self, context: &str, pattern: &str) -> Result<(), EngineError>;

    /// Start a spider crawl of `target`
    async fn spider_scan(&self, target: &str) -> Result<JobId, EngineError>;

    /// Spider progress in `[0, 100]`
    async fn spider_status(&self, job: &JobId) -> Result<u8, EngineError>;

    /// Every URL the spider reached
    async fn spider_results(&self, job: &JobId) -> Result<Vec<String>, EngineError>;

    /// Start an active scan of `target`
    async fn active_scan(&self, target: &str) -> Result<JobId, EngineError>;

    /// Active scan progress in `[0, 100]`
    async fn active_scan_status(&self, job: &JobId) -> Result<u8, EngineError>;

    /// All alerts raised so far, in report order
    async fn list_alerts(&self) -> Result<Vec<AlertRecord>, EngineError>;

    /// Progress of either job kind
    async fn job_status(&self, kind: JobKind, job: &JobId) -> Result<u8, EngineError> {
        match kind {
            JobKind::Spider => self.spider_status(job).await,
            JobKind::ActiveScan => self.active_scan_status(job).await,
        }
    }
}
