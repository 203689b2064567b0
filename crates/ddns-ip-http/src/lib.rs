// # HTTP Address Detector
//
// This crate detects the host's public IPv4 address by asking plain-text
// echo services ("what is my IP") over HTTP.
//
// ## Behavior
//
// Endpoints are tried strictly in configured order, each with its own
// timeout. The first endpoint that answers 2xx with a body that parses as
// an IPv4 address wins. Every failed attempt is logged at `warn` and the
// next endpoint is tried; detection only fails when the whole list is
// exhausted.
//
// There is no caching: every call to `current()` asks the network again.

use async_trait::async_trait;
use ddns_core::config::DetectorConfig;
use ddns_core::error::DetectionError;
use ddns_core::traits::AddressSource;

use std::net::Ipv4Addr;
use std::time::Duration;

/// Public address detector backed by echo services
#[derive(Debug, Clone)]
pub struct HttpAddressDetector {
    /// Echo endpoints, in the order they are tried
    endpoints: Vec<String>,

    /// Per-attempt timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpAddressDetector {
    /// Create a detector over `endpoints` with a per-attempt `timeout`
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        Self {
            endpoints,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    /// Create a detector from configuration
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(config.endpoints.clone(), config.timeout())
    }

    /// Ask a single endpoint for the address
    async fn fetch(&self, url: &str) -> Result<Ipv4Addr, String> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| describe_request_error(&e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| format!("failed to read response: {}", e))?;

        parse_address(&body)
    }
}

/// Parse an echo service body into an IPv4 address
fn parse_address(body: &str) -> Result<Ipv4Addr, String> {
    let text = body.trim();
    if text.is_empty() {
        return Err("empty response".to_string());
    }
    text.parse::<Ipv4Addr>()
        .map_err(|_| format!("not an IPv4 address: {:?}", text))
}

fn describe_request_error(err: &reqwest::Error, timeout: Duration) -> String {
    if err.is_timeout() {
        format!("timed out after {}s", timeout.as_secs())
    } else {
        format!("request failed: {}", err)
    }
}

#[async_trait]
impl AddressSource for HttpAddressDetector {
    async fn current(&self) -> Result<Ipv4Addr, DetectionError> {
        if self.endpoints.is_empty() {
            return Err(DetectionError::NoEndpoints);
        }

        let mut last_error = String::new();
        for (attempt, url) in self.endpoints.iter().enumerate() {
            match self.fetch(url).await {
                Ok(ip) => {
                    tracing::debug!("{} reported {}", url, ip);
                    return Ok(ip);
                }
                Err(e) => {
                    tracing::warn!(
                        "Attempt {}/{} to get IP from {} failed: {}",
                        attempt + 1,
                        self.endpoints.len(),
                        url,
                        e
                    );
                    last_error = format!("{}: {}", url, e);
                }
            }
        }

        Err(DetectionError::Exhausted {
            attempts: self.endpoints.len(),
            last_error,
        })
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
