// # ddnsctl - Cloudflare Dynamic DNS
//
// Thin command-line layer over `ddns-core`. All DNS logic lives in the
// library crates; this binary only:
//
// 1. Parses the subcommand
// 2. Loads configuration from defaults and `DDNS_*` environment variables
// 3. Builds the log dispatcher (console, plus rotated file)
// 4. Runs the command on a current-thread tokio runtime
//
// ## Configuration
//
// - `DDNS_DOMAIN`: Zone to manage (default `example.com`)
// - `DDNS_RECORDS`: Comma-separated records (default `<domain>,*.<domain>`)
// - `DDNS_API_BASE_URL`: Cloudflare API base URL
// - `DDNS_KEYS_DIR`: Directory holding `cloudflare.sh` and `cloudflare.ini`
// - `DDNS_LOG_DIR`, `DDNS_LOG_LEVEL`: Log directory and minimum level
// - `DDNS_CRON_USER`, `DDNS_CRON_SCHEDULE`, `DDNS_CRON_FILE`: Cron job settings
// - `DDNS_EXECUTABLE`: Path written into the cron job (default: this binary)
// - `DDNS_PRIVILEGE_HELPER`: Helper for system writes (default `sudo`, empty disables)
// - `CF_API_TOKEN`: API token, overrides the key file
//
// ## Example
//
// ```bash
// export DDNS_DOMAIN=example.net
// ddnsctl setup
// ddnsctl schedule
// ddnsctl update-dns
// ```

mod cli;
mod commands;
mod logging;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use commands::DdnsExitCode;
use ddns_core::DdnsConfig;
use std::process::ExitCode;
use tracing::error;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{:#}", e);
            return DdnsExitCode::Failure.into();
        }
    };

    let (dispatch, _guard) = logging::build(&config.logging, cli.command.logs_to_file());
    tracing::dispatcher::with_default(&dispatch, || run(cli.command, &config)).into()
}

/// Defaults plus environment overrides, with the running binary as the cron target
fn load_config() -> Result<DdnsConfig> {
    let mut config = DdnsConfig::from_env()?;

    let explicit = std::env::var("DDNS_EXECUTABLE").is_ok_and(|v| !v.trim().is_empty());
    if !explicit {
        match std::env::current_exe() {
            Ok(exe) => config.schedule.executable = exe,
            Err(e) => eprintln!(
                "WARNING: could not determine executable path ({}); using {}",
                e,
                config.schedule.executable.display()
            ),
        }
    }

    Ok(config)
}

fn run(command: Command, config: &DdnsConfig) -> DdnsExitCode {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("ERROR: failed to create tokio runtime: {}", e);
            return DdnsExitCode::Failure;
        }
    };

    match runtime.block_on(commands::execute(command, config)) {
        Ok(code) => code,
        Err(e) => {
            error!("ERROR: {:#}", e);
            DdnsExitCode::Failure
        }
    }
}
