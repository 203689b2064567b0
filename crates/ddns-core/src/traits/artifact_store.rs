// # Artifact Store Trait
//
// Defines where the schedule installer reads and writes the cron file.
//
// ## Implementations
//
// - Direct filesystem access: `schedule::FsArtifactStore`
// - Writes through a privilege helper (`sudo tee`): `schedule::PrivilegedArtifactStore`

use crate::error::InstallError;
use async_trait::async_trait;
use std::path::Path;

/// Trait for schedule artifact storage
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Read the current artifact text, `Ok(None)` when it does not exist
    async fn read(&self, path: &Path) -> Result<Option<String>, InstallError>;

    /// Replace the artifact with `content`
    async fn write(&self, path: &Path, content: &str) -> Result<(), InstallError>;

    /// Set the artifact's permission bits (e.g. `0o644`)
    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), InstallError>;
}
