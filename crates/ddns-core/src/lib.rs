// # ddns-core
//
// Core library for the Cloudflare dynamic DNS reconciler.
//
// ## Architecture Overview
//
// This library provides the core functionality for keeping DNS records on
// the host's public address:
// - **AddressSource**: Trait for detecting the public IPv4 address
// - **DnsProvider**: Trait for zone/record lookup and record updates
// - **TokenSource**: Trait for API token resolution (`CredentialResolver`)
// - **Reconciler**: Orchestrates detect → resolve → compare → update
// - **ScheduleInstaller**: Idempotently writes the cron job that runs the reconciler
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from provider and detector crates
// 2. **Sequential**: One request in flight at a time, every call has a timeout
// 3. **Idempotency**: Records and the cron file are written only when they differ
// 4. **Library-First**: The CLI is a thin layer over this crate

pub mod config;
pub mod credentials;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod system;
pub mod traits;

// Re-export core types for convenience
pub use config::{DdnsConfig, ScheduleConfig};
pub use credentials::{ApiToken, CredentialResolver};
pub use engine::{Reconciler, RecordOutcome, RunReport, RunStatus};
pub use error::{ApiError, ConfigError, CredentialError, DetectionError, Error, InstallError, Result};
pub use schedule::{InstallOutcome, ScheduleInstaller};
pub use traits::{AddressSource, DnsProvider, DnsProviderFactory, DnsRecord, TokenSource};
