//! SurfaceMap Structure - form catalog consolidation
//!
//! Reads a persisted form catalog and endpoint catalog, then:
//! - drops structurally duplicate forms (first occurrence wins)
//! - normalizes every surviving action to a path
//! - attaches the best matching vulnerability description as `feedback`
//!
//! Running it again over its own output with the same endpoint catalog
//! changes nothing.

pub mod consolidate;
pub mod index;
pub mod lock;
pub mod normalize;
pub mod signature;

pub use consolidate::{consolidate, ConsolidationReport, Consolidator};
pub use index::DescriptionIndex;
pub use lock::CatalogLock;
pub use normalize::normalize_action;
pub use signature::FormSignature;
