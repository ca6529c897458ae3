//! Subdomain probing over a fixed candidate list
//!
//! Each candidate `<prefix>.<host>` gets one HTTPS GET. A candidate is
//! accepted iff the response status is below 400. By default any failure to
//! get a response counts as absence; `ProbePolicy::Strict` instead fails the
//! whole enumeration on the first transient (timeout) failure.

use crate::client::{ClientConfig, ClientError, HttpClient};
use futures::stream::{self, StreamExt};
use surfacemap_core::{Error, Result};
use tracing::{debug, info, warn};

/// Default candidate prefixes
pub const DEFAULT_PREFIXES: &[&str] = &["www", "admin", "api", "dev", "test", "staging"];

/// How network failures are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProbePolicy {
    /// Every failure means "not present"
    #[default]
    Lenient,
    /// Transient failures abort the enumeration
    Strict,
}

/// Result of probing one candidate
#[derive(Debug)]
pub enum ProbeOutcome {
    /// Answered with a status below 400
    Present { host: String, status: u16 },
    /// Answered with an error-class status
    Absent { host: String, status: u16 },
    /// No response at all
    Unreachable { host: String, error: ClientError },
}

impl ProbeOutcome {
    pub fn host(&self) -> &str {
        match self {
            ProbeOutcome::Present { host, .. }
            | ProbeOutcome::Absent { host, .. }
            | ProbeOutcome::Unreachable { host, .. } => host,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, ProbeOutcome::Present { .. })
    }
}

/// Prober configuration
#[derive(Debug, Clone)]
pub struct ProberConfig {
    /// Prefixes joined with the target host
    pub prefixes: Vec<String>,
    /// Failure policy
    pub policy: ProbePolicy,
    /// Scheme of probe requests
    pub scheme: String,
    /// Explicit port, if not the scheme default
    pub port: Option<u16>,
    /// Concurrent probes
    pub concurrency: usize,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(|s| s.to_string()).collect(),
            policy: ProbePolicy::Lenient,
            scheme: String::from("https"),
            port: None,
            concurrency: 1,
        }
    }
}

/// Probes candidate subdomains of a host
pub struct SubdomainProber {
    client: HttpClient,
    config: ProberConfig,
}

impl SubdomainProber {
    pub fn new(config: ProberConfig, client_config: &ClientConfig) -> Result<Self> {
        let client = HttpClient::new(client_config)
            .map_err(|e| Error::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// Candidate hostnames for `host`, in prefix order
    pub fn candidates(&self, host: &str) -> Vec<String> {
        self.config
            .prefixes
            .iter()
            .map(|prefix| format!("{}.{}", prefix, host))
            .collect()
    }

    fn probe_url(&self, candidate: &str) -> String {
        match self.config.port {
            Some(port) => format!("{}://{}:{}/", self.config.scheme, candidate, port),
            None => format!("{}://{}/", self.config.scheme, candidate),
        }
    }

    /// Probe one candidate hostname
    pub async fn probe(&self, candidate: &str) -> ProbeOutcome {
        let host = candidate.to_string();
        match self.client.get(&self.probe_url(candidate)).await {
            Ok(response) if response.is_ok_class() => ProbeOutcome::Present {
                host,
                status: response.status,
            },
            Ok(response) => ProbeOutcome::Absent {
                host,
                status: response.status,
            },
            Err(error) => ProbeOutcome::Unreachable { host, error },
        }
    }

    /// Probe every candidate of `host` and return each outcome in prefix order
    pub async fn probe_all(&self, host: &str) -> Vec<ProbeOutcome> {
        let candidates = self.candidates(host);
        stream::iter(candidates)
            .map(|candidate| async move { self.probe(&candidate).await })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Enumerate subdomains of `host` that answered with a non-error status
    pub async fn enumerate(&self, host: &str) -> Result<Vec<String>> {
        info!("Starting subdomain enumeration for {}", host);
        let mut found = Vec::new();

        for outcome in self.probe_all(host).await {
            match outcome {
                ProbeOutcome::Present { host, status } => {
                    info!("Found subdomain: {} (status {})", host, status);
                    if !found.contains(&host) {
                        found.push(host);
                    }
                }
                ProbeOutcome::Absent { host, status } => {
                    debug!("{} answered {}", host, status);
                }
                ProbeOutcome::Unreachable { host, error } => {
                    if self.config.policy == ProbePolicy::Strict && error.is_transient() {
                        warn!("Probe of {} failed: {}", host, error);
                        return Err(Error::Probe {
                            host,
                            message: error.to_string(),
                        });
                    }
                    debug!("{} unreachable: {}", host, error);
                }
            }
        }

        info!(
            "Subdomain enumeration completed. Found {} subdomains",
            found.len()
        );
        Ok(found)
    }
}
