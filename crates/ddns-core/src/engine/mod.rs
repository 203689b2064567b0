//! Core reconciliation engine
//!
//! The Reconciler is responsible for:
//! - Detecting the public address via AddressSource
//! - Resolving the API token via TokenSource
//! - Resolving the zone and each managed record via DnsProvider
//! - Issuing an update only for records whose content differs
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────┐   ┌─────────────┐
//! │ AddressSource │   │ TokenSource │
//! └───────────────┘   └─────────────┘
//!         │ Ipv4Addr          │ ApiToken
//!         ▼                   ▼
//!       ┌───────────────────────┐      ┌────────────────────┐
//!       │      Reconciler       │─────▶│ DnsProviderFactory │
//!       └───────────────────────┘      └────────────────────┘
//!                   │                            │
//!                   ▼                            ▼
//!             ┌───────────┐               ┌─────────────┐
//!             │ RunReport │               │ DnsProvider │
//!             └───────────┘               └─────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Detect public address (fatal on failure)
//! 2. Resolve API token (fatal on failure)
//! 3. Resolve zone id for the domain (fatal on failure)
//! 4. For each record: fetch, compare, update if needed (failures are
//!    logged and recorded, the next record is still processed)
//!
//! Nothing is retried within a run; the next scheduled run picks up any
//! record that failed.

use crate::config::DdnsConfig;
use crate::error::{ApiError, Result};
use crate::traits::{AddressSource, DnsProvider, DnsProviderFactory, RECORD_TYPE_A, TokenSource};
use chrono::{DateTime, TimeDelta, Utc};
use std::net::Ipv4Addr;
use tracing::{error, info};

/// Result of reconciling a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Record already pointed at the address, no write issued
    Unchanged {
        record_name: String,
        address: Ipv4Addr,
    },

    /// Record content was replaced
    Updated {
        record_name: String,
        previous: String,
        address: Ipv4Addr,
    },

    /// Record lookup failed, record skipped
    FetchFailed {
        record_name: String,
        error: ApiError,
    },

    /// Record update failed
    UpdateFailed {
        record_name: String,
        error: ApiError,
    },
}

impl RecordOutcome {
    pub fn record_name(&self) -> &str {
        match self {
            Self::Unchanged { record_name, .. }
            | Self::Updated { record_name, .. }
            | Self::FetchFailed { record_name, .. }
            | Self::UpdateFailed { record_name, .. } => record_name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::UpdateFailed { .. })
    }
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every record converged
    Success,
    /// At least one record could not be fetched or updated
    Failure,
}

/// Summary of a completed reconciliation run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Detected public address
    pub address: Ipv4Addr,
    /// Zone the records were resolved in
    pub zone_id: String,
    /// One outcome per configured record, in configuration order
    pub outcomes: Vec<RecordOutcome>,
    /// When address detection began
    pub started_at: DateTime<Utc>,
    /// When the last record was processed
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    pub fn status(&self) -> RunStatus {
        if self.outcomes.iter().any(RecordOutcome::is_failure) {
            RunStatus::Failure
        } else {
            RunStatus::Success
        }
    }

    /// Names of records that could not be fetched or updated
    pub fn failed_records(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failure())
            .map(RecordOutcome::record_name)
            .collect()
    }

    /// Number of records whose content was replaced
    pub fn updated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Updated { .. }))
            .count()
    }

    /// Number of records that already held the detected address
    pub fn unchanged_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, RecordOutcome::Unchanged { .. }))
            .count()
    }

    /// Wall-clock time the run took
    pub fn elapsed(&self) -> TimeDelta {
        self.finished_at - self.started_at
    }

    /// Completion line: record counts and elapsed time
    pub fn summary(&self) -> String {
        format!(
            "DNS update complete: {} updated, {} unchanged, {} failed in {} ms.",
            self.updated_count(),
            self.unchanged_count(),
            self.failed_records().len(),
            self.elapsed().num_milliseconds()
        )
    }
}

/// DNS reconciler
///
/// One instance performs one run per call to [`Reconciler::run`]. All calls
/// are awaited in sequence; there is never more than one request in flight.
pub struct Reconciler {
    /// Public address detection
    address_source: Box<dyn AddressSource>,

    /// API token resolution
    token_source: Box<dyn TokenSource>,

    /// Builds the provider client once the token is known
    provider_factory: Box<dyn DnsProviderFactory>,

    /// Zone that owns the records
    domain: String,

    /// Records to manage, in processing order
    records: Vec<String>,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// # Parameters
    ///
    /// - `address_source`: Public address detection
    /// - `token_source`: API token resolution
    /// - `provider_factory`: Provider client construction
    /// - `config`: Validated configuration (domain and record set are copied)
    pub fn new(
        address_source: Box<dyn AddressSource>,
        token_source: Box<dyn TokenSource>,
        provider_factory: Box<dyn DnsProviderFactory>,
        config: &DdnsConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            address_source,
            token_source,
            provider_factory,
            domain: config.domain.clone(),
            records: config.records.clone(),
        })
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(RunReport)`: Shared prerequisites resolved; per-record outcomes
    ///   are in the report (check [`RunReport::status`])
    /// - `Err(Error)`: Address, token or zone resolution failed
    pub async fn run(&self) -> Result<RunReport> {
        let started_at = Utc::now();

        let result = self.run_internal(started_at).await;
        match &result {
            Ok(report) => {
                let failed = report.failed_records();
                if !failed.is_empty() {
                    error!("ERROR: {} record(s) not reconciled: {}", failed.len(), failed.join(", "));
                }
                info!("{}", report.summary());
            }
            Err(e) => {
                error!("ERROR: {}", e);
                info!("DNS update complete.");
            }
        }

        result
    }

    async fn run_internal(&self, started_at: DateTime<Utc>) -> Result<RunReport> {
        info!(
            "Detecting public IPv4 address via {}...",
            self.address_source.source_name()
        );
        let address = self.address_source.current().await?;
        info!("Current IPv4 address: {}", address);

        let token = self.token_source.resolve()?;
        let provider = self.provider_factory.create(token)?;

        info!("Retrieving Zone ID for {}...", self.domain);
        let zone_id = provider.get_zone_id(&self.domain).await?;
        info!("Zone ID: {}", zone_id);

        let mut outcomes = Vec::with_capacity(self.records.len());
        for record_name in &self.records {
            let outcome = self
                .reconcile_record(provider.as_ref(), &zone_id, record_name, address)
                .await;
            outcomes.push(outcome);
        }

        Ok(RunReport {
            address,
            zone_id,
            outcomes,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Bring a single record to `address`
    ///
    /// Never returns an error: fetch and update failures are logged and
    /// reported as outcomes so the remaining records are still processed.
    async fn reconcile_record(
        &self,
        provider: &dyn DnsProvider,
        zone_id: &str,
        record_name: &str,
        address: Ipv4Addr,
    ) -> RecordOutcome {
        let record = match provider.get_record(zone_id, record_name, RECORD_TYPE_A).await {
            Ok(record) => record,
            Err(e) => {
                error!("ERROR: Could not fetch {}: {}", record_name, e);
                return RecordOutcome::FetchFailed {
                    record_name: record_name.to_string(),
                    error: e,
                };
            }
        };

        if record.points_to(address) {
            info!("No change for {} (already {})", record_name, address);
            return RecordOutcome::Unchanged {
                record_name: record_name.to_string(),
                address,
            };
        }

        info!("Updating {}: {} -> {}", record_name, record.content, address);
        match provider
            .update_record(zone_id, &record.id, record_name, address, record.proxied)
            .await
        {
            Ok(()) => {
                info!("SUCCESS: Updated {} to {}", record_name, address);
                RecordOutcome::Updated {
                    record_name: record_name.to_string(),
                    previous: record.content,
                    address,
                }
            }
            Err(e) => {
                error!("ERROR: Failed updating {}: {}", record_name, e);
                RecordOutcome::UpdateFailed {
                    record_name: record_name.to_string(),
                    error: e,
                }
            }
        }
    }
}
