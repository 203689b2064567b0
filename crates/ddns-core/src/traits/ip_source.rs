// # Address Source Trait
//
// Defines the interface for detecting the host's current public IPv4 address.
//
// ## Implementations
//
// - HTTP echo services with ordered fallback: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::AddressSource;
//
// async fn show(source: &dyn AddressSource) -> ddns_core::Result<()> {
//     let ip = source.current().await?;
//     println!("public address: {}", ip);
//     Ok(())
// }
// ```

use crate::error::DetectionError;
use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for public address detection
///
/// # Trust Level: Semi-Trusted
///
/// Sources may perform network I/O to third-party services but must not
/// make DNS decisions, retry beyond their own endpoint list, or cache a
/// previous answer between calls.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Get the current public IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The detected address
    /// - `Err(DetectionError)`: Only when every configured endpoint failed
    async fn current(&self) -> Result<Ipv4Addr, DetectionError>;

    /// Short name for logging
    fn source_name(&self) -> &'static str {
        "unknown"
    }
}
