// # Credential Resolver
//
// Resolves the Cloudflare API token. The environment variable always wins;
// otherwise the token is read from a shell-export key file:
//
// ```text
// # keys/cloudflare.sh
// export CF_API_KEY="abc123"   # scoped to Zone:DNS:Edit
// ```
//
// ## Security Requirements
//
// - The token NEVER appears in logs or `Debug` output
// - The token is never written anywhere by this crate

use crate::config::CredentialConfig;
use crate::error::CredentialError;
use crate::traits::TokenSource;
use std::path::PathBuf;

/// Opaque bearer token for the provider API
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Expose the raw token for an `Authorization` header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiToken(<REDACTED>)")
    }
}

/// Environment-then-file token resolver
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    env_var: String,
    key_file: PathBuf,
    template_file: PathBuf,
    key_name: String,
    placeholder: String,
}

impl CredentialResolver {
    pub fn new(config: &CredentialConfig) -> Self {
        Self {
            env_var: config.env_var.clone(),
            key_file: config.key_file(),
            template_file: config.key_file_template(),
            key_name: config.key_name.clone(),
            placeholder: config.placeholder.clone(),
        }
    }

    /// Resolve with an explicit environment value instead of reading the process environment
    pub fn resolve_with_env(&self, env_value: Option<&str>) -> Result<ApiToken, CredentialError> {
        if let Some(token) = env_value.map(str::trim).filter(|t| !t.is_empty()) {
            tracing::debug!("Using API token from {}", self.env_var);
            return Ok(ApiToken::new(token));
        }

        let contents = match std::fs::read_to_string(&self.key_file) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::NotFound {
                    path: self.key_file.clone(),
                    template: self.template_file.clone(),
                    env_var: self.env_var.clone(),
                });
            }
            Err(source) => {
                return Err(CredentialError::Io {
                    path: self.key_file.clone(),
                    source,
                });
            }
        };

        match parse_export(&contents, &self.key_name) {
            Some(value) if value.is_empty() || value == self.placeholder => {
                Err(CredentialError::PlaceholderOrEmpty {
                    path: self.key_file.clone(),
                    key: self.key_name.clone(),
                    env_var: self.env_var.clone(),
                })
            }
            Some(value) => {
                tracing::debug!("Using API token from {}", self.key_file.display());
                Ok(ApiToken::new(value))
            }
            None => Err(CredentialError::KeyNotFound {
                path: self.key_file.clone(),
                key: self.key_name.clone(),
            }),
        }
    }
}

impl TokenSource for CredentialResolver {
    fn resolve(&self) -> Result<ApiToken, CredentialError> {
        let env_value = std::env::var(&self.env_var).ok();
        self.resolve_with_env(env_value.as_deref())
    }
}

/// Find the first `export <key>=<value>` line and return the cleaned value
///
/// Skips blank lines and `#` comments. One layer of matching quotes is
/// removed and an inline ` #` comment is dropped, so `"tok" # note`,
/// `'tok'` and `tok # note` all yield `tok`.
fn parse_export(contents: &str, key: &str) -> Option<String> {
    let prefix = format!("export {}=", key);

    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .find_map(|line| line.strip_prefix(&prefix))
        .map(|raw| {
            let mut value = unquote(raw.trim());

            if let Some((before, _comment)) = value.split_once(" #") {
                value = unquote(before.trim());
            }

            value.to_string()
        })
}

/// Strip one layer of matching `"` or `'` quotes, then whitespace
fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return value[1..value.len() - 1].trim();
        }
    }
    value
}
