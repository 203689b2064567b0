// # Token Source Trait
//
// Defines how the reconciler obtains the provider API token.
//
// ## Implementations
//
// - Environment variable with key-file fallback: `credentials::CredentialResolver`

use crate::credentials::ApiToken;
use crate::error::CredentialError;

/// Trait for API token resolution
///
/// Called once per reconciliation run; the token is held in memory only.
pub trait TokenSource: Send + Sync {
    /// Resolve the API token
    fn resolve(&self) -> Result<ApiToken, CredentialError>;
}
