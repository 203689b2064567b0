//! Command-line interface definition

use clap::{Parser, Subcommand};

/// Keep Cloudflare A records pointed at this host's public IPv4 address.
///
/// Configuration comes from built-in defaults overridden by `DDNS_*`
/// environment variables; the API token from `CF_API_TOKEN` or the key file.
#[derive(Parser, Debug)]
#[command(name = "ddnsctl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Create the log directory and hand it to the cron user
    Setup,

    /// Detect the public address and update every managed record
    UpdateDns,

    /// Install the cron job that runs `update-dns` on boot and on schedule
    Schedule,

    /// Obtain a wildcard certificate with certbot's Cloudflare DNS plugin
    CreateCert,
}

impl Command {
    /// Whether this command writes to the log file
    ///
    /// `setup` is what creates the log directory, so it logs to the console only.
    pub fn logs_to_file(self) -> bool {
        !matches!(self, Command::Setup)
    }
}
