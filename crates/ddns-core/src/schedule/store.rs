// Artifact store implementations for the schedule installer.

use crate::error::InstallError;
use crate::traits::{ArtifactStore, CommandRunner};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

/// Reads an existing artifact directly; system cron files are world-readable
async fn read_existing(path: &Path) -> Result<Option<String>, InstallError> {
    match fs::read(path).await {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(InstallError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes the artifact with plain filesystem calls
///
/// Used when the process already has write access to the target directory
/// (running as root, or a non-system cron file path).
#[derive(Debug, Default, Clone)]
pub struct FsArtifactStore;

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn read(&self, path: &Path) -> Result<Option<String>, InstallError> {
        read_existing(path).await
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), InstallError> {
        fs::write(path, content)
            .await
            .map_err(|e| InstallError::write(path, e))
    }

    #[cfg(unix)]
    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), InstallError> {
        use std::os::unix::fs::PermissionsExt;

        fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| InstallError::permissions(path, e))
    }

    #[cfg(not(unix))]
    async fn set_mode(&self, _path: &Path, _mode: u32) -> Result<(), InstallError> {
        Ok(())
    }
}

/// Writes the artifact through a privilege helper (`sudo tee`, `sudo chmod`)
///
/// `tee` echoes everything it writes; pair this store with a runner that
/// discards stdout ([`crate::system::TokioCommandRunner::discarding_stdout`]).
pub struct PrivilegedArtifactStore {
    helper: String,
    runner: Box<dyn CommandRunner>,
}

impl PrivilegedArtifactStore {
    pub fn new(helper: impl Into<String>, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            helper: helper.into(),
            runner,
        }
    }
}

impl std::fmt::Debug for PrivilegedArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedArtifactStore")
            .field("helper", &self.helper)
            .finish()
    }
}

#[async_trait]
impl ArtifactStore for PrivilegedArtifactStore {
    async fn read(&self, path: &Path) -> Result<Option<String>, InstallError> {
        read_existing(path).await
    }

    async fn write(&self, path: &Path, content: &str) -> Result<(), InstallError> {
        let args = vec!["tee".to_string(), path.display().to_string()];
        let output = self
            .runner
            .run(&self.helper, &args, Some(content.as_bytes()))
            .await
            .map_err(|e| InstallError::write(path, format!("could not run {}: {}", self.helper, e)))?;

        if !output.success() {
            return Err(InstallError::write(path, output.stderr.trim()));
        }
        Ok(())
    }

    async fn set_mode(&self, path: &Path, mode: u32) -> Result<(), InstallError> {
        let args = vec![
            "chmod".to_string(),
            format!("{:o}", mode),
            path.display().to_string(),
        ];
        let output = self
            .runner
            .run(&self.helper, &args, None)
            .await
            .map_err(|e| {
                InstallError::permissions(path, format!("could not run {}: {}", self.helper, e))
            })?;

        if !output.success() {
            return Err(InstallError::permissions(path, output.stderr.trim()));
        }
        Ok(())
    }
}
