//! SurfaceMap Common - Shared utilities: configuration and logging
//!
//! This crate provides common functionality used across all SurfaceMap crates.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigBuilder};
pub use logging::init_logging;
