// # Schedule Installer
//
// Materializes the cron file that makes the system scheduler run
// `update-dns` on boot and on a fixed interval.
//
// ## Idempotency
//
// The file text is a pure function of [`ScheduleConfig`]. The installer
// reads the current file first and writes only when the text differs, so
// running `schedule` repeatedly never touches an up-to-date file.

mod store;

pub use store::{FsArtifactStore, PrivilegedArtifactStore};

use crate::config::ScheduleConfig;
use crate::error::InstallError;
use crate::traits::ArtifactStore;
use std::path::{Path, PathBuf};

/// Subcommand the scheduled job invokes
pub const UPDATE_COMMAND: &str = "update-dns";

/// Permission bits of the cron file (world-readable, owner-writable)
pub const CRON_FILE_MODE: u32 = 0o644;

const CRON_PATH: &str = "/usr/local/sbin:/usr/local/bin:/sbin:/bin:/usr/sbin:/usr/bin";

/// Result of an install call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// No file existed; it was written
    Created,
    /// An outdated file was overwritten
    Updated,
    /// The file already had the desired content; nothing was written
    Unchanged,
}

/// Render the cron file text for `config`
pub fn render_cron(config: &ScheduleConfig) -> String {
    let user = &config.user;
    let exe = config.executable.display();
    let expr = &config.expression;

    format!(
        "# Cloudflare DNS updater - runs as {user}\n\
         # Updates DNS records on schedule '{expr}' and on reboot\n\
         \n\
         SHELL=/bin/bash\n\
         PATH={CRON_PATH}\n\
         \n\
         # Run on boot\n\
         @reboot {user} {exe} {UPDATE_COMMAND}\n\
         \n\
         # Run on schedule\n\
         {expr} {user} {exe} {UPDATE_COMMAND}\n"
    )
}

/// Installs the cron file through an [`ArtifactStore`]
pub struct ScheduleInstaller {
    store: Box<dyn ArtifactStore>,
    path: PathBuf,
    content: String,
}

impl ScheduleInstaller {
    pub fn new(config: &ScheduleConfig, store: Box<dyn ArtifactStore>) -> Self {
        Self {
            store,
            path: config.cron_file.clone(),
            content: render_cron(config),
        }
    }

    /// Target path of the cron file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Desired cron file text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Write the cron file unless it is already up to date
    pub async fn install(&self) -> Result<InstallOutcome, InstallError> {
        let outcome = match self.store.read(&self.path).await? {
            Some(existing) if existing == self.content => {
                tracing::info!("Cron job already up to date at {}", self.path.display());
                return Ok(InstallOutcome::Unchanged);
            }
            Some(_) => {
                tracing::info!("Updating existing cron job at {}...", self.path.display());
                InstallOutcome::Updated
            }
            None => {
                tracing::info!("Creating system cron job at {}...", self.path.display());
                InstallOutcome::Created
            }
        };

        self.store.write(&self.path, &self.content).await?;
        self.store.set_mode(&self.path, CRON_FILE_MODE).await?;

        tracing::info!("System cron job installed at {}", self.path.display());
        Ok(outcome)
    }
}
