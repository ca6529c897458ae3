//! Target validation - gate a session on a well-formed, reachable URL

use crate::client::{ClientConfig, HttpClient};
use surfacemap_core::{Error, Result, ScanTarget};
use tracing::{error, info};

/// Checks scheme and reachability of a target before any scan starts
pub struct UrlValidator {
    client: HttpClient,
}

impl UrlValidator {
    /// Build a validator issuing one bounded GET per call
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = HttpClient::new(config)
            .map_err(|e| Error::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    /// Validate `url`.
    ///
    /// Fails with `InvalidUrl` for a malformed URL or a scheme other than
    /// http/https, and with `UnreachableTarget` on any network error or a
    /// status of 400 or above.
    pub async fn validate(&self, url: &str) -> Result<ScanTarget> {
        let target = ScanTarget::parse(url).map_err(|e| {
            error!("{}", e);
            e
        })?;

        info!("Validating URL: {}", target);

        match self.client.get(target.as_str()).await {
            Ok(response) if response.is_ok_class() => {
                info!("URL is valid and accessible (status {})", response.status);
                Ok(target)
            }
            Ok(response) => {
                error!("URL returned status code: {}", response.status);
                Err(Error::UnreachableTarget {
                    target: target.to_string(),
                    reason: format!("status {}", response.status),
                })
            }
            Err(e) => {
                error!("Error accessing URL: {}", e);
                Err(Error::UnreachableTarget {
                    target: target.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn validator() -> UrlValidator {
        UrlValidator::new(
            &ClientConfig::default()
                .with_user_agent("SecurityScanner/1.0")
                .with_timeout(Duration::from_secs(5)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_reachable_target() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/app"))
            .and(header("user-agent", "SecurityScanner/1.0"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let target = validator()
            .validate(&format!("{}/app", server.uri()))
            .await
            .unwrap();
        assert_eq!(target.host(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_error_status_is_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = validator().validate(&server.uri()).await.unwrap_err();
        assert!(matches!(err, Error::UnreachableTarget { .. }));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_bad_scheme_fails_without_request() {
        let err = validator().validate("ftp://example.com").await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_network_failure() {
        let err = validator().validate("http://127.0.0.1:1/").await.unwrap_err();
        assert!(matches!(err, Error::UnreachableTarget { .. }));
    }
}
