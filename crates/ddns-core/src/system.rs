//! Process-backed [`CommandRunner`]

use crate::traits::{CommandOutput, CommandRunner};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Where a child's stdout and stderr go
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    /// Capture both
    #[default]
    Capture,
    /// Stream both to the terminal (interactive tools)
    Inherit,
    /// Drop stdout, capture stderr (tools that echo their input, like `tee`)
    DiscardStdout,
}

/// Runs commands with `tokio::process`
#[derive(Debug, Default, Clone)]
pub struct TokioCommandRunner {
    output: OutputMode,
}

impl TokioCommandRunner {
    /// Runner that captures stdout and stderr
    pub fn capturing() -> Self {
        Self {
            output: OutputMode::Capture,
        }
    }

    /// Runner that streams child output straight to the terminal
    pub fn inheriting() -> Self {
        Self {
            output: OutputMode::Inherit,
        }
    }

    /// Runner that sends stdout to `/dev/null` and captures only stderr
    pub fn discarding_stdout() -> Self {
        Self {
            output: OutputMode::DiscardStdout,
        }
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        stdin: Option<&[u8]>,
    ) -> std::io::Result<CommandOutput> {
        tracing::debug!("Running {} {}", program, args.join(" "));

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() });
        match self.output {
            OutputMode::Capture => command.stdout(Stdio::piped()).stderr(Stdio::piped()),
            OutputMode::Inherit => command.stdout(Stdio::inherit()).stderr(Stdio::inherit()),
            OutputMode::DiscardStdout => command.stdout(Stdio::null()).stderr(Stdio::piped()),
        };

        let mut child = command.spawn()?;

        // Feed stdin while draining output; an echoing child blocks on a full pipe
        let pipe = child.stdin.take();
        let feed = async move {
            if let (Some(input), Some(mut pipe)) = (stdin, pipe) {
                pipe.write_all(input).await?;
                // Closing stdin lets tools like `tee` see EOF
                drop(pipe);
            }
            Ok::<(), std::io::Error>(())
        };

        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;
        match fed {
            // The child exited without reading everything; its status says why
            Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            other => other?,
        }

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
