//! JSON API client for an OWASP ZAP compatible scan engine
//!
//! API endpoints used:
//! - GET /JSON/context/action/newContext/        - Create scan context
//! - GET /JSON/context/action/includeInContext/  - Scope context to target
//! - GET /JSON/spider/action/scan/               - Start spider
//! - GET /JSON/spider/view/status/               - Spider progress
//! - GET /JSON/spider/view/results/              - Spider URLs
//! - GET /JSON/ascan/action/scan/                - Start active scan
//! - GET /JSON/ascan/view/status/                - Active scan progress
//! - GET /JSON/core/view/alerts/                 - Alerts, paged

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::engine::{EngineError, ScanEngine};
use crate::types::*;

// ── Configuration ────────────────────────────────────────────────────────────

/// Configuration for the engine API client
#[derive(Debug, Clone)]
pub struct ZapClientConfig {
    /// API base URL (e.g., "http://127.0.0.1:8080")
    pub api_base_url: String,
    /// API key, if the engine requires one
    pub api_key: Option<String>,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Alerts fetched per page
    pub alerts_page_size: usize,
}

impl Default for ZapClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::from("http://127.0.0.1:8080"),
            api_key: None,
            request_timeout: Duration::from_secs(30),
            alerts_page_size: 500,
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────────────

/// REST client for the engine's JSON API
pub struct ZapClient {
    config: ZapClientConfig,
    http: Client,
}

impl ZapClient {
    /// Create a new engine client
    pub fn new(config: ZapClientConfig) -> Result<Self, EngineError> {
        if config.api_base_url.trim().is_empty() {
            return Err(EngineError::NotConfigured(
                "api_base_url is required".into(),
            ));
        }

        let http = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(format!("SurfaceMap/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, http })
    }

    /// Full URL of an API call
    fn api_url(&self, component: &str, kind: &str, operation: &str) -> String {
        format!(
            "{}/JSON/{}/{}/{}/",
            self.config.api_base_url.trim_end_matches('/'),
            component,
            kind,
            operation
        )
    }

    /// Issue one API call and decode the response body
    async fn call<T: DeserializeOwned>(
        &self,
        component: &str,
        kind: &str,
        operation: &str,
        query: &[(&str, &str)],
    ) -> Result<T, EngineError> {
        let url = self.api_url(component, kind, operation);
        debug!("Engine call {}/{}/{}", component, kind, operation);

        let mut request = self.http.get(&url).query(query);
        if let Some(key) = &self.config.api_key {
            request = request.header("X-ZAP-API-Key", key);
        }

        let res = request.send().await?;

        if !res.status().is_success() {
            let status = res.status().as_u16();
            let text = res.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| {
                    if e.code.is_empty() {
                        e.message
                    } else {
                        format!("{}: {}", e.code, e.message)
                    }
                })
                .unwrap_or(text);
            return Err(EngineError::Api { status, message });
        }

        let text = res.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn status(&self, component: &str, job: &JobId) -> Result<u8, EngineError> {
        let body: StatusResponse = self
            .call(component, "view", "status", &[("scanId", job.as_str())])
            .await?;
        parse_progress(&body.status).ok_or_else(|| {
            EngineError::UnexpectedResponse(format!("{} status {:?}", component, body.status))
        })
    }
}

#[async_trait::async_trait]
impl ScanEngine for ZapClient {
    async fn new_context(&self, name: &str) -> Result<String, EngineError> {
        let body: NewContextResponse = self
            .call("context", "action", "newContext", &[("contextName", name)])
            .await?;
        info!("Created context {} (id {})", name, body.context_id);
        Ok(body.context_id)
    }

    async fn include_in_context(&self, context: &str, pattern: &str) -> Result<(), EngineError> {
        let _: serde_json::Value = self
            .call(
                "context",
                "action",
                "includeInContext",
                &[("contextName", context), ("regex", pattern)],
            )
            .await?;
        debug!("Included {} in context {}", pattern, context);
        Ok(())
    }

    async fn spider_scan(&self, target: &str) -> Result<JobId, EngineError> {
        let body: ScanStartedResponse = self
            .call("spider", "action", "scan", &[("url", target)])
            .await?;
        info!("Spider job {} started for {}", body.scan, target);
        Ok(JobId(body.scan))
    }

    async fn spider_status(&self, job: &JobId) -> Result<u8, EngineError> {
        self.status("spider", job).await
    }

    async fn spider_results(&self, job: &JobId) -> Result<Vec<String>, EngineError> {
        let body: ResultsResponse = self
            .call("spider", "view", "results", &[("scanId", job.as_str())])
            .await?;
        Ok(body.results)
    }

    async fn active_scan(&self, target: &str) -> Result<JobId, EngineError> {
        let body: ScanStartedResponse = self
            .call("ascan", "action", "scan", &[("url", target)])
            .await?;
        info!("Active scan job {} started for {}", body.scan, target);
        Ok(JobId(body.scan))
    }

    async fn active_scan_status(&self, job: &JobId) -> Result<u8, EngineError> {
        self.status("ascan", job).await
    }

    async fn list_alerts(&self) -> Result<Vec<AlertRecord>, EngineError> {
        let page_size = self.config.alerts_page_size.max(1);
        let count = page_size.to_string();
        let mut alerts = Vec::new();

        loop {
            let start = alerts.len().to_string();
            let body: AlertsResponse = self
                .call(
                    "core",
                    "view",
                    "alerts",
                    &[("baseurl", ""), ("start", &start), ("count", &count)],
                )
                .await?;

            let fetched = body.alerts.len();
            alerts.extend(body.alerts);
            if fetched < page_size {
                break;
            }
        }

        debug!("Fetched {} alerts", alerts.len());
        Ok(alerts)
    }
}
