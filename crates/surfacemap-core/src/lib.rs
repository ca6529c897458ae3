//! SurfaceMap Core - Foundation types, artifacts, and error handling
//!
//! This crate provides the core abstractions shared by every SurfaceMap crate:
//! - `ScanTarget`: the validated web application URL
//! - `Form`, `Input`, `AttackSurface`: records gathered during a scan
//! - `EndpointCollector`: deduplicating set of discovered URLs
//! - Artifact formats (`endpoints.json`, `structure.json`, `subdomains.json`)

pub mod artifact;
pub mod error;
pub mod model;
pub mod target;

// Re-export commonly used types at crate root
pub use artifact::{ArtifactStore, EndpointsArtifact, StructureArtifact, SubdomainsArtifact};
pub use error::{Error, Result};
pub use model::{AttackSurface, EndpointCollector, Extra, Form, Input};
pub use target::ScanTarget;
