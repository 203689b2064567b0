//! Error types for the DDNS system
//!
//! Each component owns a narrow error enum; [`Error`] wraps them so the
//! reconciler and the CLI can propagate any of them with `?`.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DDNS system
#[derive(Error, Debug)]
pub enum Error {
    /// API token could not be resolved
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Public address could not be detected
    #[error(transparent)]
    Detection(#[from] DetectionError),

    /// DNS provider API failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Schedule artifact could not be installed
    #[error(transparent)]
    Install(#[from] InstallError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures of the token fallback chain (environment, then key file)
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Key file is missing and the environment variable is unset
    #[error(
        "Cloudflare key file not found: {path}\n\
         Create it from the template: cp {template} {path}\n\
         Or set {env_var} in the environment."
    )]
    NotFound {
        path: PathBuf,
        template: PathBuf,
        env_var: String,
    },

    /// Key line present but its value is empty or still the template placeholder
    #[error(
        "API key not set properly in {path}.\n\
         Edit the file and set {key}, or set {env_var} env var."
    )]
    PlaceholderOrEmpty {
        path: PathBuf,
        key: String,
        env_var: String,
    },

    /// No `export <key>=` line in the key file
    #[error("{key} not found in {path}.")]
    KeyNotFound { path: PathBuf, key: String },

    /// Key file exists but could not be read
    #[error("failed to read key file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures of public address detection
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectionError {
    /// Every echo endpoint failed
    #[error("Could not determine public IP address after {attempts} attempt(s). Last error: {last_error}")]
    Exhausted { attempts: usize, last_error: String },

    /// No echo endpoints were configured
    #[error("no address echo endpoints configured")]
    NoEndpoints,
}

/// Failures talking to the DNS provider API
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Zone search returned no usable result
    #[error("Could not get Zone ID for {zone}: {body}")]
    ZoneNotFound { zone: String, body: String },

    /// Record search returned no usable result
    #[error("Could not get DNS record for {name} ({record_type}): {body}")]
    RecordNotFound {
        name: String,
        record_type: String,
        body: String,
    },

    /// Provider answered the update with `success: false`
    #[error("Failed updating {name}: {body}")]
    UpdateRejected { name: String, body: String },

    /// Network failure, timeout, non-2xx status or undecodable body
    #[error("{}", transport_message(.method, .endpoint, .status, .body))]
    Transport {
        method: String,
        endpoint: String,
        /// HTTP status and reason, when a response was received
        status: Option<String>,
        /// Raw response body or the underlying client error
        body: String,
    },
}

fn transport_message(method: &str, endpoint: &str, status: &Option<String>, body: &str) -> String {
    match status {
        Some(status) => format!("HTTP {status} for {method} {endpoint}: {body}"),
        None => format!("Network error for {method} {endpoint}: {body}"),
    }
}

/// Failures installing the schedule artifact
#[derive(Error, Debug)]
pub enum InstallError {
    /// Writing the artifact failed
    #[error("Failed to write cron file {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Setting artifact permissions failed
    #[error("Failed to set permissions on {path}: {reason}")]
    Permissions { path: PathBuf, reason: String },

    /// Reading the existing artifact failed for a reason other than absence
    #[error("Failed to read existing cron file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid configuration values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error: {0}")]
pub struct ConfigError(pub String);

impl ConfigError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl ApiError {
    /// Create a transport error without an HTTP status
    pub fn network(method: &str, endpoint: &str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            status: None,
            body: err.to_string(),
        }
    }

    /// Create a transport error for a non-2xx response
    pub fn http_status(
        method: &str,
        endpoint: &str,
        status: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::Transport {
            method: method.to_string(),
            endpoint: endpoint.to_string(),
            status: Some(status.into()),
            body: body.into(),
        }
    }

    /// HTTP status carried by a transport error, if any
    pub fn status(&self) -> Option<&str> {
        match self {
            Self::Transport { status, .. } => status.as_deref(),
            _ => None,
        }
    }
}

impl InstallError {
    pub fn write(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn permissions(path: impl Into<PathBuf>, reason: impl std::fmt::Display) -> Self {
        Self::Permissions {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
