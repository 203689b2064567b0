// # DNS Provider Trait
//
// Defines the minimal provider API the reconciler drives: zone lookup,
// record lookup and record update.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// async fn show(provider: &dyn DnsProvider) -> Result<(), ddns_core::ApiError> {
//     let zone_id = provider.get_zone_id("example.com").await?;
//     let record = provider.get_record(&zone_id, "example.com", "A").await?;
//     println!("{} -> {}", record.name, record.content);
//     Ok(())
// }
// ```

use crate::credentials::ApiToken;
use crate::error::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// Record type for IPv4 address records
pub const RECORD_TYPE_A: &str = "A";

/// A DNS record as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// The record ID (provider-specific)
    pub id: String,
    /// The record name
    pub name: String,
    /// The record type (always "A" for managed records)
    #[serde(rename = "type")]
    pub record_type: String,
    /// The current record content (an IP address string for A records)
    #[serde(default)]
    pub content: String,
    /// Whether traffic is routed through the provider's proxy
    #[serde(default)]
    pub proxied: bool,
}

impl DnsRecord {
    /// Whether the record already points at `address`
    pub fn points_to(&self, address: Ipv4Addr) -> bool {
        self.content.trim() == address.to_string()
    }
}

/// Trait for DNS provider implementations
///
/// Each method performs exactly one request/response round trip.
///
/// # Trust Level: Untrusted
///
/// ## Forbidden Capabilities
/// - ❌ Implement retry logic or backoff (a failed record waits for the next scheduled run)
/// - ❌ Decide whether an update is needed (owned by `Reconciler`)
/// - ❌ Cache zone or record state between calls
/// - ❌ Log the API token
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve the zone id for an exact zone name
    ///
    /// When the provider returns several zones, the first is authoritative.
    async fn get_zone_id(&self, zone_name: &str) -> Result<String, ApiError>;

    /// Fetch the first record in `zone_id` matching `record_name` and `record_type`
    async fn get_record(
        &self,
        zone_id: &str,
        record_name: &str,
        record_type: &str,
    ) -> Result<DnsRecord, ApiError>;

    /// Replace an address record's content
    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record_name: &str,
        address: Ipv4Addr,
        proxied: bool,
    ) -> Result<(), ApiError>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers once the token is known
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance authenticated with `token`
    fn create(&self, token: ApiToken) -> Result<Box<dyn DnsProvider>, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> DnsRecord {
        DnsRecord {
            id: "rec".to_string(),
            name: "example.com".to_string(),
            record_type: RECORD_TYPE_A.to_string(),
            content: content.to_string(),
            proxied: true,
        }
    }

    #[test]
    fn points_to_compares_textual_address() {
        let ip = Ipv4Addr::new(203, 0, 113, 7);
        assert!(record("203.0.113.7").points_to(ip));
        assert!(record("203.0.113.7 ").points_to(ip));
        assert!(!record("203.0.113.8").points_to(ip));
        assert!(!record("").points_to(ip));
    }
}
