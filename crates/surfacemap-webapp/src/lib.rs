//! SurfaceMap WebApp - direct interaction with the target application
//!
//! This crate covers everything the scanner does against the target itself
//! rather than through the scan engine:
//! - HTTP client with scanner defaults
//! - Target validation before a session starts
//! - Form extraction from crawled pages
//! - Subdomain probing over a fixed prefix list
//!
//! # Example
//!
//! ```no_run
//! use surfacemap_webapp::{ClientConfig, UrlValidator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let validator = UrlValidator::new(&ClientConfig::default()).unwrap();
//!     let target = validator.validate("https://example.com").await.unwrap();
//!     println!("{} is reachable", target);
//! }
//! ```

pub mod client;
pub mod forms;
pub mod subdomains;
pub mod validator;

pub use client::{ClientConfig, ClientError, HttpClient, HttpResponse};
pub use forms::{extract_forms, FormExtractor};
pub use subdomains::{ProbeOutcome, ProbePolicy, ProberConfig, SubdomainProber, DEFAULT_PREFIXES};
pub use validator::UrlValidator;
