//! SurfaceMap Transport - control API of the external scan engine
//!
//! This crate provides:
//! - `ScanEngine`: the operations SurfaceMap needs from a scan engine
//! - `ZapClient`: an implementation over an OWASP ZAP compatible JSON API
//! - Message types for jobs and alerts

pub mod engine;
pub mod rest_client;
pub mod types;

pub use engine::{EngineError, ScanEngine};
pub use rest_client::{ZapClient, ZapClientConfig};
pub use types::{parse_progress, AlertRecord, JobId, JobKind};
