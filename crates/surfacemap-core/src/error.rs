//! Error types for SurfaceMap

use thiserror::Error;

/// Result type alias using SurfaceMap Error
pub type Result<T> = std::result::Result<T, Error>;

/// SurfaceMap error types
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Target unreachable: {target} ({reason})")]
    UnreachableTarget { target: String, reason: String },

    // === Discovery Errors ===
    #[error("Page analysis failed for {url}: {message}")]
    PageAnalysis { url: String, message: String },

    #[error("Probe failed for {host}: {message}")]
    Probe { host: String, message: String },

    #[error("Scan engine error: {0}")]
    Engine(String),

    #[error("{job} did not complete after {polls} polls ({elapsed_secs}s)")]
    Timeout {
        job: String,
        polls: u32,
        elapsed_secs: u64,
    },

    #[error("{job} cancelled")]
    Cancelled { job: String },

    // === Consolidation Errors ===
    #[error("Consolidation input missing: {path}")]
    ConsolidationInputMissing { path: String },

    #[error("Artifact locked by another process: {path}")]
    Locked { path: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if this error stops forward progress.
    ///
    /// Only target validation and consolidation input errors are fatal; every
    /// discovery-phase error is recovered at the phase boundary.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidUrl(_)
                | Error::UnreachableTarget { .. }
                | Error::ConsolidationInputMissing { .. }
                | Error::Locked { .. }
                | Error::Configuration(_)
        )
    }

    /// Check if a retry of the same operation could succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Engine(_) | Error::Probe { .. } | Error::PageAnalysis { .. } | Error::Io(_)
        )
    }

    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::UnreachableTarget { .. } => "UNREACHABLE_TARGET",
            Error::PageAnalysis { .. } => "PAGE_ANALYSIS",
            Error::Probe { .. } => "PROBE_ERROR",
            Error::Engine(_) => "ENGINE_ERROR",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Cancelled { .. } => "CANCELLED",
            Error::ConsolidationInputMissing { .. } => "CONSOLIDATION_INPUT_MISSING",
            Error::Locked { .. } => "LOCKED",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Other(_) => "OTHER",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::InvalidUrl("ftp://x".into()).is_fatal());
        assert!(Error::ConsolidationInputMissing {
            path: "structure.json".into()
        }
        .is_fatal());
        assert!(!Error::PageAnalysis {
            url: "http://t/a".into(),
            message: "timeout".into()
        }
        .is_fatal());
        assert!(!Error::Timeout {
            job: "spider".into(),
            polls: 3,
            elapsed_secs: 6
        }
        .is_fatal());
    }

    #[test]
    fn test_codes() {
        assert_eq!(Error::Engine("x".into()).code(), "ENGINE_ERROR");
        assert_eq!(
            Error::Cancelled { job: "ascan".into() }.code(),
            "CANCELLED"
        );
    }
}
