// # Cloudflare DNS Provider
//
// This crate implements [`DnsProvider`] against the Cloudflare API v4.
//
// ## Scope
//
// - Zone lookup by exact name
// - `A` record lookup by name and type
// - `A` record content replacement, preserving the `proxied` flag
//
// Every method is exactly one HTTP round trip. There is no retry, no
// backoff and no caching: a record that fails here is picked up by the
// next scheduled run.
//
// ## Trust Level: Untrusted (DNS Provider)
//
// **Forbidden Capabilities** (enforced by code review):
// - ❌ Spawn tasks or threads
// - ❌ Implement retry logic
// - ❌ Decide whether an update is needed (owned by `Reconciler`)
// - ❌ Cache state beyond a single request
//
// ## Security Requirements
//
// - API token NEVER appears in logs or `Debug` output
// - Errors carry the HTTP status and raw response body, never request headers
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Update DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::error::ApiError;
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RECORD_TYPE_A};
use ddns_core::ApiToken;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Cloudflare's "automatic" TTL sentinel
const AUTOMATIC_TTL: u32 = 1;

/// Standard Cloudflare response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

/// PUT body for an address record
#[derive(Debug, Serialize)]
struct RecordUpdate<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: String,
    ttl: u32,
    proxied: bool,
}

/// Cloudflare API v4 client
///
/// # Security
///
/// The Debug implementation does NOT expose the API token.
pub struct CloudflareClient {
    /// Bearer token
    /// ⚠️ NEVER log this value
    token: ApiToken,

    /// Versioned API base URL, without trailing slash
    base_url: String,

    /// Per-request timeout
    timeout: Duration,

    client: reqwest::Client,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a client for `base_url` (e.g. `https://api.cloudflare.com/client/v4`)
    pub fn new(token: ApiToken, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            token,
            base_url,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and return the raw body of a 2xx response
    ///
    /// `endpoint` is only used to label errors.
    async fn send(
        &self,
        method: &str,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<String, ApiError> {
        let response = request
            .bearer_auth(self.token.expose())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiError::network(
                        method,
                        endpoint,
                        format!("timed out after {}s", self.timeout.as_secs()),
                    )
                } else {
                    ApiError::network(method, endpoint, e)
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::network(method, endpoint, format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ApiError::http_status(method, endpoint, status.to_string(), body));
        }

        tracing::trace!("{} {} -> {}", method, endpoint, status);
        Ok(body)
    }

    /// Parse a response envelope, mapping undecodable bodies to transport errors
    fn decode<T: DeserializeOwned>(
        method: &str,
        endpoint: &str,
        body: &str,
    ) -> Result<ApiResponse<T>, ApiError> {
        serde_json::from_str(body).map_err(|e| {
            ApiError::network(
                method,
                endpoint,
                format!("undecodable response ({}): {}", e, body),
            )
        })
    }
}

/// Summarize envelope errors for logging
fn describe_errors(errors: &[ApiMessage]) -> String {
    errors
        .iter()
        .map(|e| format!("{} {}", e.code, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// First element of a successful list result
fn first_result<T>(response: ApiResponse<Vec<T>>, what: &str) -> Option<T> {
    if !response.success {
        tracing::debug!(
            "Cloudflare reported failure for {}: {}",
            what,
            describe_errors(&response.errors)
        );
        return None;
    }

    let items = response.result.unwrap_or_default();
    if items.len() > 1 {
        tracing::debug!(
            "{} matches for {}, using the first",
            items.len(),
            what
        );
    }
    items.into_iter().next()
}

#[async_trait]
impl DnsProvider for CloudflareClient {
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn get_zone_id(&self, zone_name: &str) -> Result<String, ApiError> {
        let endpoint = format!("/zones?name={}", zone_name);
        let request = self
            .client
            .get(self.url("/zones"))
            .query(&[("name", zone_name)]);

        let body = self.send("GET", &endpoint, request).await?;
        let response: ApiResponse<Vec<Zone>> = Self::decode("GET", &endpoint, &body)?;

        match first_result(response, zone_name) {
            Some(zone) => Ok(zone.id),
            None => Err(ApiError::ZoneNotFound {
                zone: zone_name.to_string(),
                body,
            }),
        }
    }

    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=example.com&type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn get_record(
        &self,
        zone_id: &str,
        record_name: &str,
        record_type: &str,
    ) -> Result<DnsRecord, ApiError> {
        let path = format!("/zones/{}/dns_records", zone_id);
        let endpoint = format!("{}?name={}&type={}", path, record_name, record_type);
        let request = self
            .client
            .get(self.url(&path))
            .query(&[("name", record_name), ("type", record_type)]);

        let body = self.send("GET", &endpoint, request).await?;
        let response: ApiResponse<Vec<DnsRecord>> = Self::decode("GET", &endpoint, &body)?;

        match first_result(response, record_name) {
            Some(record) => Ok(record),
            None => Err(ApiError::RecordNotFound {
                name: record_name.to_string(),
                record_type: record_type.to_string(),
                body,
            }),
        }
    }

    /// # API Call
    ///
    /// ```http
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 1, "proxied": true}
    /// ```
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record_name: &str,
        address: Ipv4Addr,
        proxied: bool,
    ) -> Result<(), ApiError> {
        let endpoint = format!("/zones/{}/dns_records/{}", zone_id, record_id);
        let payload = RecordUpdate {
            record_type: RECORD_TYPE_A,
            name: record_name,
            content: address.to_string(),
            ttl: AUTOMATIC_TTL,
            proxied,
        };
        let payload = serde_json::to_string(&payload)
            .map_err(|e| ApiError::network("PUT", &endpoint, e))?;
        let request = self.client.put(self.url(&endpoint)).body(payload);

        let body = self.send("PUT", &endpoint, request).await?;
        let response: ApiResponse<serde_json::Value> = Self::decode("PUT", &endpoint, &body)?;

        if !response.success {
            return Err(ApiError::UpdateRejected {
                name: record_name.to_string(),
                body,
            });
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for Cloudflare clients
#[derive(Debug, Clone)]
pub struct CloudflareFactory {
    base_url: String,
    timeout: Duration,
}

impl CloudflareFactory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ProviderConfig) -> Self {
        Self::new(config.api_base_url.clone(), config.timeout())
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, token: ApiToken) -> Result<Box<dyn DnsProvider>, ApiError> {
        Ok(Box::new(CloudflareClient::new(
            token,
            self.base_url.clone(),
            self.timeout,
        )))
    }
}
