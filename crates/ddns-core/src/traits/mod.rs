//! Core traits for the DDNS system
//!
//! This module defines the seams between the reconciler and its collaborators.
//!
//! - [`AddressSource`]: Detect the public IPv4 address
//! - [`DnsProvider`]: Read and update DNS records via provider APIs
//! - [`TokenSource`]: Resolve the provider API token
//! - [`ArtifactStore`]: Read and write the schedule artifact
//! - [`CommandRunner`]: Run external processes

pub mod artifact_store;
pub mod command_runner;
pub mod dns_provider;
pub mod ip_source;
pub mod token_source;

pub use artifact_store::ArtifactStore;
pub use command_runner::{CommandOutput, CommandRunner};
pub use dns_provider::{DnsProvider, DnsProviderFactory, DnsRecord, RECORD_TYPE_A};
pub use ip_source::AddressSource;
pub use token_source::TokenSource;
