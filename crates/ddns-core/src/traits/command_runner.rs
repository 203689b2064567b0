// # Command Runner Trait
//
// Narrow interface for the few external processes the tool starts: the
// privilege helper used for system file writes, `certbot` and `systemctl`.
// The reconciler and the provider client never run processes.

use async_trait::async_trait;

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (`None` when killed by a signal)
    pub code: Option<i32>,
    /// Captured stdout (lossy UTF-8)
    pub stdout: String,
    /// Captured stderr (lossy UTF-8)
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Trait for running external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`, optionally feeding `stdin`, and wait for it
    ///
    /// # Returns
    ///
    /// - `Ok(CommandOutput)`: The process ran (check [`CommandOutput::success`])
    /// - `Err(io::Error)`: The process could not be started
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> std::io::Result<CommandOutput>;
}
