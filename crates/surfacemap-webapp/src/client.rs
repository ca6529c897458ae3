//! HTTP client used against the target application

use reqwest::{header, Client};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Timeout after {0}s")]
    Timeout(u64),
}

impl ClientError {
    /// A retry might succeed; everything else means the host did not answer
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Timeout(_))
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Client identifier sent with every request
    pub user_agent: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Follow redirects
    pub follow_redirects: bool,
    /// Maximum redirects to follow
    pub max_redirects: usize,
    /// Accept self-signed or otherwise invalid certificates
    pub accept_invalid_certs: bool,
    /// Fixed DNS answers, host -> address
    pub resolve: Vec<(String, SocketAddr)>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("SurfaceMap/{} (Security Scanner)", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(10),
            follow_redirects: true,
            max_redirects: 10,
            accept_invalid_certs: false,
            resolve: Vec::new(),
        }
    }
}

impl ClientConfig {
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_resolve(mut self, host: impl Into<String>, addr: SocketAddr) -> Self {
        self.resolve.push((host.into(), addr));
        self
    }
}

/// HTTP response wrapper
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: String,
    /// Final URL (after redirects)
    pub final_url: String,
    /// Response time in milliseconds
    pub response_time_ms: u64,
}

impl HttpResponse {
    /// Status below 400
    pub fn is_ok_class(&self) -> bool {
        self.status < 400
    }

    /// Get header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&String> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v)
    }
}

/// Thin wrapper over reqwest with scanner defaults
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(config.max_redirects)
            } else {
                reqwest::redirect::Policy::none()
            })
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .cookie_store(true);

        for (host, addr) in &config.resolve {
            builder = builder.resolve(host, *addr);
        }

        Ok(Self {
            client: builder.build()?,
            timeout_secs: config.timeout.as_secs(),
        })
    }

    /// Perform a GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse, ClientError> {
        debug!("GET {}", url);
        let start = Instant::now();

        let parsed = reqwest::Url::parse(url).map_err(|e| ClientError::InvalidUrl(e.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .header(header::ACCEPT, "text/html,application/xhtml+xml,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
            final_url,
            response_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn classify(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ClientError::Connect(e.to_string())
        } else {
            ClientError::Request(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_response_helpers() {
        let response = HttpResponse {
            status: 302,
            headers: [("Content-Type".to_string(), "text/html".to_string())]
                .into_iter()
                .collect(),
            body: String::new(),
            final_url: "https://example.com".to_string(),
            response_time_ms: 10,
        };

        assert!(response.is_ok_class());
        assert_eq!(response.header("content-type").unwrap(), "text/html");
    }

    #[tokio::test]
    async fn test_get_sends_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(header_eq("user-agent", "Probe/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpClient::new(&ClientConfig::default().with_user_agent("Probe/1.0")).unwrap();
        let response = client.get(&format!("{}/", server.uri())).await.unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "hello");
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = HttpClient::new(&ClientConfig::default()).unwrap();
        let err = client.get("not a url").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_connection_failure_is_not_transient() {
        let client = HttpClient::new(
            &ClientConfig::default().with_timeout(Duration::from_secs(2)),
        )
        .unwrap();
        // Port 1 on loopback is closed on any sane test host
        let err = client.get("http://127.0.0.1:1/").await.unwrap_err();
        assert!(!err.is_transient());
    }
}
