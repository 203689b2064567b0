//! Configuration types for the DDNS system
//!
//! A [`DdnsConfig`] is built once per process from built-in defaults, with
//! optional `DDNS_*` environment overrides applied at load time. It is
//! validated and then only ever read.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main DDNS configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DdnsConfig {
    /// Zone (registered domain) that owns every managed record
    pub domain: String,

    /// Record names to keep on the public address, in processing order
    pub records: Vec<String>,

    /// DNS provider API settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Public address detection settings
    #[serde(default)]
    pub detector: DetectorConfig,

    /// API token lookup settings
    #[serde(default)]
    pub credentials: CredentialConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LogConfig,

    /// Cron artifact settings
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl DdnsConfig {
    /// Create a configuration for `domain` managing the apex and its wildcard
    pub fn new(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        Self {
            records: default_records(&domain),
            domain,
            provider: ProviderConfig::default(),
            detector: DetectorConfig::default(),
            credentials: CredentialConfig::default(),
            logging: LogConfig::default(),
            schedule: ScheduleConfig::default(),
        }
    }

    /// Replace the managed record set, dropping duplicates but keeping order
    pub fn with_records<I, S>(mut self, records: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.records = Vec::new();
        for record in records {
            let record = record.into();
            if !self.records.contains(&record) {
                self.records.push(record);
            }
        }
        self
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from defaults plus `DDNS_*` overrides found via `lookup`
    ///
    /// Empty values are treated as unset, except `DDNS_PRIVILEGE_HELPER`
    /// where an empty value disables the helper.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Self::new(get("DDNS_DOMAIN").unwrap_or_else(default_domain));

        if let Some(records) = get("DDNS_RECORDS") {
            config = config.with_records(
                records
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
            );
        }
        if let Some(url) = get("DDNS_API_BASE_URL") {
            config.provider.api_base_url = url;
        }
        if let Some(dir) = get("DDNS_KEYS_DIR") {
            config.credentials.keys_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get("DDNS_LOG_DIR") {
            config.logging.dir = PathBuf::from(dir);
        }
        if let Some(level) = get("DDNS_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(user) = get("DDNS_CRON_USER") {
            config.schedule.user = user;
        }
        if let Some(expr) = get("DDNS_CRON_SCHEDULE") {
            config.schedule.expression = expr;
        }
        if let Some(path) = get("DDNS_CRON_FILE") {
            config.schedule.cron_file = PathBuf::from(path);
        }
        if let Some(exe) = get("DDNS_EXECUTABLE") {
            config.schedule.executable = PathBuf::from(exe);
        }
        if let Some(helper) = lookup("DDNS_PRIVILEGE_HELPER") {
            let helper = helper.trim();
            config.schedule.privilege_helper = (!helper.is_empty()).then(|| helper.to_string());
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_domain_name(&self.domain, false)?;

        if self.records.is_empty() {
            return Err(ConfigError::new(
                "at least one record is required. Set it via: export DDNS_RECORDS=example.com,*.example.com",
            ));
        }

        for (i, record) in self.records.iter().enumerate() {
            validate_domain_name(record, true)?;
            if self.records[..i].contains(record) {
                return Err(ConfigError::new(format!("duplicate record name: {}", record)));
            }
        }

        if !self.provider.api_base_url.starts_with("https://")
            && !self.provider.api_base_url.starts_with("http://")
        {
            return Err(ConfigError::new(format!(
                "API base URL must use HTTP or HTTPS scheme. Got: {}",
                self.provider.api_base_url
            )));
        }

        if self.detector.timeout_secs == 0 || self.detector.timeout_secs > 9 {
            return Err(ConfigError::new(format!(
                "detector timeout must be between 1 and 9 seconds. Got: {}",
                self.detector.timeout_secs
            )));
        }

        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::new("API timeout must be > 0"));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::new(format!(
                    "log level '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                    self.logging.level
                )));
            }
        }

        if !is_cron_expression(&self.schedule.expression) {
            return Err(ConfigError::new(format!(
                "cron schedule must have five fields or be one of {}. Got: '{}'",
                CRON_MACROS.join(", "),
                self.schedule.expression
            )));
        }

        if self.schedule.user.is_empty() || self.schedule.user.contains(char::is_whitespace) {
            return Err(ConfigError::new(format!(
                "cron user '{}' is not valid",
                self.schedule.user
            )));
        }

        Ok(())
    }
}

impl Default for DdnsConfig {
    fn default() -> Self {
        Self::new(default_domain())
    }
}

/// Validate that a string is a usable DNS name
///
/// Basic RFC 1035 checks. With `allow_wildcard`, the first label may be `*`.
fn validate_domain_name(domain: &str, allow_wildcard: bool) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::new("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(ConfigError::new(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for (i, label) in domain.split('.').enumerate() {
        if label.is_empty() {
            return Err(ConfigError::new(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if i == 0 && label == "*" && allow_wildcard {
            continue;
        }

        if label.len() > 63 {
            return Err(ConfigError::new(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ConfigError::new(format!(
                "Domain label contains invalid characters. Label: '{}'. \
                 Valid: alphanumeric and hyphen only.",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(ConfigError::new(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// DNS provider API configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Versioned REST base URL
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout (in seconds)
    #[serde(default = "default_api_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            timeout_secs: default_api_timeout_secs(),
        }
    }
}

/// Public address detection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Plain-text echo endpoints, tried in this order
    #[serde(default = "default_detector_endpoints")]
    pub endpoints: Vec<String>,

    /// Per-attempt timeout (in seconds)
    #[serde(default = "default_detector_timeout_secs")]
    pub timeout_secs: u64,
}

impl DetectorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            endpoints: default_detector_endpoints(),
            timeout_secs: default_detector_timeout_secs(),
        }
    }
}

/// API token lookup configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Environment variable that overrides the key file
    #[serde(default = "default_token_env_var")]
    pub env_var: String,

    /// Directory holding `cloudflare.sh` and `cloudflare.ini`
    #[serde(default = "default_keys_dir")]
    pub keys_dir: PathBuf,

    /// Shell-export key looked up in `cloudflare.sh`
    #[serde(default = "default_key_name")]
    pub key_name: String,

    /// Template value that means "not filled in yet"
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl CredentialConfig {
    /// Fallback key file (`<keys_dir>/cloudflare.sh`)
    pub fn key_file(&self) -> PathBuf {
        self.keys_dir.join("cloudflare.sh")
    }

    /// Template the operator copies the key file from
    pub fn key_file_template(&self) -> PathBuf {
        self.keys_dir.join("cloudflare.sh.template")
    }

    /// Certbot DNS plugin credentials (`<keys_dir>/cloudflare.ini`)
    pub fn certbot_ini(&self) -> PathBuf {
        self.keys_dir.join("cloudflare.ini")
    }
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            env_var: default_token_env_var(),
            keys_dir: default_keys_dir(),
            key_name: default_key_name(),
            placeholder: default_placeholder(),
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory of the rotated log file
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// Log file name inside `dir`
    #[serde(default = "default_log_file_name")]
    pub file_name: String,

    /// Size at which the log file is rotated (in bytes)
    #[serde(default = "default_max_log_bytes")]
    pub max_bytes: u64,

    /// Number of rotated files kept (`dns.log.1` ... `dns.log.N`)
    #[serde(default = "default_log_backups")]
    pub backups: usize,

    /// Minimum level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl LogConfig {
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file_name: default_log_file_name(),
            max_bytes: default_max_log_bytes(),
            backups: default_log_backups(),
            level: default_log_level(),
        }
    }
}

/// Cron artifact configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Five-field cron interval expression or a periodic `@` macro
    #[serde(default = "default_cron_schedule")]
    pub expression: String,

    /// System cron file the job is written to
    #[serde(default = "default_cron_file")]
    pub cron_file: PathBuf,

    /// User the job runs as
    #[serde(default = "default_cron_user")]
    pub user: String,

    /// Executable invoked by the job
    #[serde(default = "default_executable")]
    pub executable: PathBuf,

    /// Command used to gain privileges for system writes (`None` writes directly)
    #[serde(default = "default_privilege_helper")]
    pub privilege_helper: Option<String>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            expression: default_cron_schedule(),
            cron_file: default_cron_file(),
            user: default_cron_user(),
            executable: default_executable(),
            privilege_helper: default_privilege_helper(),
        }
    }
}

fn default_domain() -> String {
    "example.com".to_string()
}

fn default_records(domain: &str) -> Vec<String> {
    vec![domain.to_string(), format!("*.{}", domain)]
}

fn default_api_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_api_timeout_secs() -> u64 {
    15
}

fn default_detector_endpoints() -> Vec<String> {
    vec![
        "https://api.ipify.org".to_string(),
        "https://icanhazip.com".to_string(),
        "https://ifconfig.me".to_string(),
    ]
}

fn default_detector_timeout_secs() -> u64 {
    7
}

/// Periodic cron macros; `@reboot` is always installed alongside the schedule
const CRON_MACROS: &[&str] = &[
    "@yearly",
    "@annually",
    "@monthly",
    "@weekly",
    "@daily",
    "@midnight",
    "@hourly",
];

fn is_cron_expression(expression: &str) -> bool {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.as_slice() {
        [single] if single.starts_with('@') => CRON_MACROS.contains(single),
        fields => fields.len() == 5,
    }
}

fn default_token_env_var() -> String {
    "CF_API_TOKEN".to_string()
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from("/etc/ddns/keys")
}

fn default_key_name() -> String {
    "CF_API_KEY".to_string()
}

fn default_placeholder() -> String {
    "<value>".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/var/log/ddns/cloudflare")
}

fn default_log_file_name() -> String {
    "dns.log".to_string()
}

fn default_max_log_bytes() -> u64 {
    512_000
}

fn default_log_backups() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cron_schedule() -> String {
    "*/5 * * * *".to_string()
}

fn default_cron_file() -> PathBuf {
    PathBuf::from("/etc/cron.d/cloudflare-dns")
}

fn default_cron_user() -> String {
    "ddns".to_string()
}

fn default_executable() -> PathBuf {
    PathBuf::from("/usr/local/bin/ddnsctl")
}

fn default_privilege_helper() -> Option<String> {
    Some("sudo".to_string())
}
