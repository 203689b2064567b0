//! Test doubles and common utilities for reconciler contract tests
//!
//! These doubles record every call so tests can assert on exactly which
//! provider operations a run issued.

#![allow(dead_code)]

use async_trait::async_trait;
use ddns_core::config::DdnsConfig;
use ddns_core::error::{ApiError, CredentialError, DetectionError, InstallError};
use ddns_core::traits::{
    AddressSource, ArtifactStore, DnsProvider, DnsProviderFactory, DnsRecord, RECORD_TYPE_A,
    TokenSource,
};
use ddns_core::{ApiToken, Reconciler};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const ZONE_ID: &str = "zone-123";

/// An AddressSource that returns a fixed answer
pub struct FixedAddressSource {
    result: Result<Ipv4Addr, DetectionError>,
    calls: Arc<AtomicUsize>,
}

impl FixedAddressSource {
    pub fn ok(ip: Ipv4Addr) -> Self {
        Self {
            result: Ok(ip),
            calls: Arc::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(DetectionError::Exhausted {
                attempts: 3,
                last_error: "timed out".to_string(),
            }),
            calls: Arc::default(),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl AddressSource for FixedAddressSource {
    async fn current(&self) -> Result<Ipv4Addr, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }

    fn source_name(&self) -> &'static str {
        "fixed"
    }
}

/// A TokenSource that returns a fixed token, or `KeyNotFound` when empty
pub struct StaticTokenSource {
    token: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl StaticTokenSource {
    pub fn ok(token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            calls: Arc::default(),
        }
    }

    pub fn missing() -> Self {
        Self {
            token: None,
            calls: Arc::default(),
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl TokenSource for StaticTokenSource {
    fn resolve(&self) -> Result<ApiToken, CredentialError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token
            .as_ref()
            .map(|t| ApiToken::new(t.clone()))
            .ok_or_else(|| CredentialError::KeyNotFound {
                path: PathBuf::from("/keys/cloudflare.sh"),
                key: "CF_API_KEY".to_string(),
            })
    }
}

/// A recorded `update_record` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub zone_id: String,
    pub record_id: String,
    pub record_name: String,
    pub address: Ipv4Addr,
    pub proxied: bool,
}

/// Shared provider-side state, kept across provider instances and runs
#[derive(Default)]
pub struct ProviderState {
    pub zone_found: bool,
    pub records: HashMap<String, DnsRecord>,
    pub failing_fetches: HashSet<String>,
    pub failing_updates: HashSet<String>,
    pub updates: Vec<UpdateCall>,
    pub fetches: Vec<String>,
    pub tokens: Vec<String>,
}

/// A mock DnsProvider backed by [`ProviderState`]
///
/// Panics when asked to write a record that already holds the target
/// address: a correct reconciler never issues such a call.
#[derive(Clone)]
pub struct MockDnsProvider {
    state: Arc<Mutex<ProviderState>>,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        let state = ProviderState {
            zone_found: true,
            ..ProviderState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Add an A record with the given content and proxied flag
    pub fn with_record(self, name: &str, content: &str, proxied: bool) -> Self {
        let id = format!("rec-{}", self.state.lock().unwrap().records.len() + 1);
        self.state.lock().unwrap().records.insert(
            name.to_string(),
            DnsRecord {
                id,
                name: name.to_string(),
                record_type: RECORD_TYPE_A.to_string(),
                content: content.to_string(),
                proxied,
            },
        );
        self
    }

    pub fn without_zone(self) -> Self {
        self.state.lock().unwrap().zone_found = false;
        self
    }

    pub fn failing_fetch(self, name: &str) -> Self {
        self.state.lock().unwrap().failing_fetches.insert(name.to_string());
        self
    }

    pub fn failing_update(self, name: &str) -> Self {
        self.state.lock().unwrap().failing_updates.insert(name.to_string());
        self
    }

    pub fn updates(&self) -> Vec<UpdateCall> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn fetches(&self) -> Vec<String> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.state.lock().unwrap().tokens.clone()
    }

    pub fn content_of(&self, name: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .records
            .get(name)
            .map(|r| r.content.clone())
    }

    /// Factory that hands out providers sharing this state
    pub fn factory(&self) -> Box<dyn DnsProviderFactory> {
        Box::new(MockProviderFactory {
            provider: self.clone(),
        })
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn get_zone_id(&self, zone_name: &str) -> Result<String, ApiError> {
        if self.state.lock().unwrap().zone_found {
            Ok(ZONE_ID.to_string())
        } else {
            Err(ApiError::ZoneNotFound {
                zone: zone_name.to_string(),
                body: r#"{"success":true,"result":[]}"#.to_string(),
            })
        }
    }

    async fn get_record(
        &self,
        zone_id: &str,
        record_name: &str,
        record_type: &str,
    ) -> Result<DnsRecord, ApiError> {
        assert_eq!(zone_id, ZONE_ID);
        assert_eq!(record_type, RECORD_TYPE_A);

        let mut state = self.state.lock().unwrap();
        state.fetches.push(record_name.to_string());

        if state.failing_fetches.contains(record_name) {
            return Err(ApiError::http_status(
                "GET",
                &format!("/zones/{}/dns_records", zone_id),
                "500 Internal Server Error",
                "upstream unavailable",
            ));
        }

        state
            .records
            .get(record_name)
            .cloned()
            .ok_or_else(|| ApiError::RecordNotFound {
                name: record_name.to_string(),
                record_type: record_type.to_string(),
                body: r#"{"success":true,"result":[]}"#.to_string(),
            })
    }

    async fn update_record(
        &self,
        zone_id: &str,
        record_id: &str,
        record_name: &str,
        address: Ipv4Addr,
        proxied: bool,
    ) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();

        if let Some(existing) = state.records.get(record_name) {
            assert_ne!(
                existing.content,
                address.to_string(),
                "update_record issued for {} which already points at {}",
                record_name,
                address
            );
        }

        state.updates.push(UpdateCall {
            zone_id: zone_id.to_string(),
            record_id: record_id.to_string(),
            record_name: record_name.to_string(),
            address,
            proxied,
        });

        if state.failing_updates.contains(record_name) {
            return Err(ApiError::UpdateRejected {
                name: record_name.to_string(),
                body: r#"{"success":false,"errors":[{"code":1004}]}"#.to_string(),
            });
        }

        if let Some(record) = state.records.get_mut(record_name) {
            record.content = address.to_string();
            record.proxied = proxied;
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

struct MockProviderFactory {
    provider: MockDnsProvider,
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, token: ApiToken) -> Result<Box<dyn DnsProvider>, ApiError> {
        self.provider
            .state
            .lock()
            .unwrap()
            .tokens
            .push(token.expose().to_string());
        Ok(Box::new(self.provider.clone()))
    }
}

/// An ArtifactStore kept in memory that counts writes
#[derive(Clone, Default)]
pub struct MemoryArtifactStore {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    modes: Arc<Mutex<HashMap<PathBuf, u32>>>,
    writes: Arc<AtomicUsize>,
    fail_writes: bool,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn with_file(self, path: &Path, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        self
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn content(&self, path: &Path) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn mode(&self, path: &Path) -> Option<u32> {
        self.modes.lock().unwrap().get(path).copied()
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn read(&self, path: &Path) -> Result<Option<String>, InstallError> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), InstallError> {
        if self.fail_writes {
            return Err(InstallError::write(path, "read-only file system"));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_path_buf(), content.to_string());
        Ok(())
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), InstallError> {
        self.modes.lock().unwrap().insert(path.to_path_buf(), mode);
        Ok(())
    }
}

/// Configuration managing `records` under `example.com`
pub fn config_with_records(records: &[&str]) -> DdnsConfig {
    DdnsConfig::new("example.com").with_records(records.iter().copied())
}

/// Reconciler wired to the given doubles
pub fn reconciler(
    ip: Ipv4Addr,
    provider: &MockDnsProvider,
    records: &[&str],
) -> Reconciler {
    Reconciler::new(
        Box::new(FixedAddressSource::ok(ip)),
        Box::new(StaticTokenSource::ok("test-token")),
        provider.factory(),
        &config_with_records(records),
    )
    .expect("reconciler construction succeeds")
}
