// # Command Handlers
//
// Each subcommand is a thin wrapper over `ddns-core`:
//
// - `setup`: create the log directory and hand it to the cron user
// - `update-dns`: one reconciliation run
// - `schedule`: idempotent cron file install
// - `create-cert`: certbot DNS-01 issuance for `<domain>` and `*.<domain>`
//
// External processes are only ever started through `CommandRunner`.

use crate::cli::Command;
use anyhow::{Context, Result, bail};
use ddns_core::config::DdnsConfig;
use ddns_core::schedule::{FsArtifactStore, PrivilegedArtifactStore};
use ddns_core::system::TokioCommandRunner;
use ddns_core::traits::{ArtifactStore, CommandRunner};
use ddns_core::{CredentialResolver, InstallOutcome, Reconciler, RunStatus, ScheduleInstaller};
use ddns_ip_http::HttpAddressDetector;
use ddns_provider_cloudflare::CloudflareFactory;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};

/// Seconds certbot waits for the TXT record to propagate
const DNS_PROPAGATION_SECS: u32 = 60;

/// Process exit codes
///
/// Usage errors exit with 2 from clap before any handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DdnsExitCode {
    Success = 0,
    Failure = 1,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<RunStatus> for DdnsExitCode {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Success => DdnsExitCode::Success,
            RunStatus::Failure => DdnsExitCode::Failure,
        }
    }
}

/// Run `command` with the process-backed command runners
pub async fn execute(command: Command, config: &DdnsConfig) -> Result<DdnsExitCode> {
    match command {
        Command::Setup => {
            setup(config, &TokioCommandRunner::capturing()).await?;
            Ok(DdnsExitCode::Success)
        }
        Command::UpdateDns => Ok(update_dns(config).await.into()),
        Command::Schedule => {
            schedule(config, schedule_store(config)).await?;
            Ok(DdnsExitCode::Success)
        }
        Command::CreateCert => {
            create_cert(config, &TokioCommandRunner::inheriting()).await?;
            Ok(DdnsExitCode::Success)
        }
    }
}

/// Program and arguments, prefixed with the privilege helper when configured
fn privileged(helper: Option<&str>, program: &str, args: &[&str]) -> (String, Vec<String>) {
    let args = args.iter().map(|a| a.to_string());
    match helper {
        Some(helper) => (
            helper.to_string(),
            std::iter::once(program.to_string()).chain(args).collect(),
        ),
        None => (program.to_string(), args.collect()),
    }
}

/// Create the log directory, then best-effort chown/chmod it for the cron user
pub async fn setup(config: &DdnsConfig, runner: &dyn CommandRunner) -> Result<()> {
    let dir = &config.logging.dir;
    let dir_arg = dir.display().to_string();
    let helper = config.schedule.privilege_helper.as_deref();

    info!("Creating log directory {}...", dir.display());
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        let Some(helper) = helper else {
            return Err(e).with_context(|| format!("failed to create {}", dir.display()));
        };
        let (program, args) = privileged(Some(helper), "mkdir", &["-p", &dir_arg]);
        let output = runner
            .run(&program, &args, None)
            .await
            .with_context(|| format!("could not run {}", program))?;
        if !output.success() {
            bail!("failed to create {}: {}", dir.display(), output.stderr.trim());
        }
    }

    let owner = format!("{0}:{0}", config.schedule.user);
    for step in [["chown", owner.as_str()], ["chmod", "755"]] {
        let (program, args) = privileged(helper, step[0], &[step[1], &dir_arg]);
        match runner.run(&program, &args, None).await {
            Ok(output) if output.success() => {}
            Ok(output) => warn!(
                "Could not {} {}: {}",
                step[0],
                dir.display(),
                output.stderr.trim()
            ),
            Err(e) => warn!("Could not run {}: {}", program, e),
        }
    }

    info!("Logs will be written to {}", config.logging.file_path().display());
    Ok(())
}

/// One reconciliation run
///
/// Fatal errors are logged by [`Reconciler::run`] and reported as failure.
pub async fn update_dns(config: &DdnsConfig) -> RunStatus {
    let reconciler = match Reconciler::new(
        Box::new(HttpAddressDetector::from_config(&config.detector)),
        Box::new(CredentialResolver::new(&config.credentials)),
        Box::new(CloudflareFactory::from_config(&config.provider)),
        config,
    ) {
        Ok(reconciler) => reconciler,
        Err(e) => {
            error!("ERROR: {}", e);
            return RunStatus::Failure;
        }
    };

    match reconciler.run().await {
        Ok(report) => report.status(),
        Err(_) => RunStatus::Failure,
    }
}

/// Artifact store for the cron file, privileged when a helper is configured
fn schedule_store(config: &DdnsConfig) -> Box<dyn ArtifactStore> {
    match &config.schedule.privilege_helper {
        Some(helper) => Box::new(PrivilegedArtifactStore::new(
            helper.clone(),
            Box::new(TokioCommandRunner::discarding_stdout()),
        )),
        None => Box::new(FsArtifactStore),
    }
}

/// Install the cron job
pub async fn schedule(
    config: &DdnsConfig,
    store: Box<dyn ArtifactStore>,
) -> Result<InstallOutcome> {
    let installer = ScheduleInstaller::new(&config.schedule, store);
    debug!("Cron entry for {}:\n{}", installer.path().display(), installer.content());
    let outcome = installer.install().await?;

    info!(
        "Scheduled '{}' and @reboot as {} in {}: {} {}",
        config.schedule.expression,
        config.schedule.user,
        installer.path().display(),
        config.schedule.executable.display(),
        ddns_core::schedule::UPDATE_COMMAND
    );
    Ok(outcome)
}

/// Request a certificate for `<domain>` and `*.<domain>`, then check renewal
pub async fn create_cert(config: &DdnsConfig, runner: &dyn CommandRunner) -> Result<()> {
    let ini = config.credentials.certbot_ini();
    if !ini.exists() {
        let template = config.credentials.keys_dir.join("cloudflare.ini.template");
        error!("Cloudflare credentials file not found: {}", ini.display());
        error!("Create it from the template: cp {} {}", template.display(), ini.display());
        error!("Then restrict it: chmod 600 {}", ini.display());
        bail!("missing certbot credentials {}", ini.display());
    }

    let helper = config.schedule.privilege_helper.as_deref();
    let domain = &config.domain;
    let wildcard = format!("*.{}", domain);
    let ini_arg = ini.display().to_string();
    let propagation = DNS_PROPAGATION_SECS.to_string();

    info!("Requesting certificate for {} and {}...", domain, wildcard);
    let (program, args) = privileged(
        helper,
        "certbot",
        &[
            "certonly",
            "--dns-cloudflare",
            "--dns-cloudflare-credentials",
            &ini_arg,
            "--dns-cloudflare-propagation-seconds",
            &propagation,
            "-d",
            &wildcard,
            "-d",
            domain,
        ],
    );
    run_required(runner, &program, &args).await?;

    info!("Checking certbot renewal timer...");
    let timer_args = vec!["status".to_string(), "certbot.timer".to_string()];
    match runner.run("systemctl", &timer_args, None).await {
        Ok(output) if output.success() => {}
        Ok(_) => warn!("certbot.timer is not active; renewals may not run automatically"),
        Err(e) => warn!("Could not run systemctl: {}", e),
    }

    info!("Testing renewal...");
    let (program, args) = privileged(helper, "certbot", &["renew", "--dry-run"]);
    run_required(runner, &program, &args).await?;

    info!("Certificate ready under /etc/letsencrypt/live/{}", domain);
    Ok(())
}

async fn run_required(runner: &dyn CommandRunner, program: &str, args: &[String]) -> Result<()> {
    let output = runner
        .run(program, args, None)
        .await
        .with_context(|| format!("could not run {}", program))?;
    if !output.success() {
        bail!(
            "`{} {}` failed with exit code {}",
            program,
            args.join(" "),
            output
                .code
                .map_or_else(|| "none (killed)".to_string(), |c| c.to_string())
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ddns_core::traits::CommandOutput;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    type Calls = Arc<Mutex<Vec<Vec<String>>>>;

    /// Records every command line; fails the ones starting with `fail_on`
    struct RecordingRunner {
        calls: Calls,
        fail_on: Option<&'static str>,
    }

    impl RecordingRunner {
        fn new(fail_on: Option<&'static str>) -> (Self, Calls) {
            let calls = Calls::default();
            (
                Self {
                    calls: calls.clone(),
                    fail_on,
                },
                calls,
            )
        }
    }

    #[async_trait]
    impl CommandRunner for RecordingRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            _stdin: Option<&[u8]>,
        ) -> std::io::Result<CommandOutput> {
            let mut line = vec![program.to_string()];
            line.extend(args.iter().cloned());
            let fails = self.fail_on.is_some_and(|f| line.join(" ").contains(f));
            self.calls.lock().unwrap().push(line);
            Ok(CommandOutput {
                code: Some(if fails { 1 } else { 0 }),
                stdout: String::new(),
                stderr: if fails { "not permitted".to_string() } else { String::new() },
            })
        }
    }

    fn config(dir: &Path) -> DdnsConfig {
        let mut config = DdnsConfig::new("example.com");
        config.logging.dir = dir.join("logs");
        config.credentials.keys_dir = dir.join("keys");
        config.schedule.cron_file = dir.join("cloudflare-dns");
        config
    }

    #[test]
    fn privileged_prefixes_helper_when_configured() {
        let (program, args) = privileged(Some("sudo"), "chmod", &["755", "/var/log/ddns"]);
        assert_eq!(program, "sudo");
        assert_eq!(args, vec!["chmod", "755", "/var/log/ddns"]);

        let (program, args) = privileged(None, "chmod", &["755", "/var/log/ddns"]);
        assert_eq!(program, "chmod");
        assert_eq!(args, vec!["755", "/var/log/ddns"]);
    }

    #[test]
    fn run_status_maps_to_exit_code() {
        assert_eq!(DdnsExitCode::from(RunStatus::Success), DdnsExitCode::Success);
        assert_eq!(DdnsExitCode::from(RunStatus::Failure), DdnsExitCode::Failure);
        assert_eq!(DdnsExitCode::Failure as u8, 1);
    }

    #[tokio::test]
    async fn setup_creates_directory_and_hands_it_over() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (runner, calls) = RecordingRunner::new(None);

        setup(&config, &runner).await.unwrap();

        let log_dir = config.logging.dir.display().to_string();
        assert!(config.logging.dir.is_dir());
        assert_eq!(
            *calls.lock().unwrap(),
            vec![
                vec!["sudo".to_string(), "chown".into(), "ddns:ddns".into(), log_dir.clone()],
                vec!["sudo".to_string(), "chmod".into(), "755".into(), log_dir],
            ]
        );
    }

    #[tokio::test]
    async fn setup_ownership_failures_are_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (runner, calls) = RecordingRunner::new(Some("chown"));

        setup(&config, &runner).await.unwrap();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn schedule_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());

        let first = schedule(&config, Box::new(FsArtifactStore)).await.unwrap();
        let second = schedule(&config, Box::new(FsArtifactStore)).await.unwrap();

        assert_eq!(first, InstallOutcome::Created);
        assert_eq!(second, InstallOutcome::Unchanged);
        assert_eq!(
            std::fs::read_to_string(&config.schedule.cron_file).unwrap(),
            ddns_core::schedule::render_cron(&config.schedule)
        );
    }

    #[tokio::test]
    async fn create_cert_requires_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let (runner, calls) = RecordingRunner::new(None);

        let err = create_cert(&config, &runner).await.unwrap_err();

        assert!(err.to_string().contains("cloudflare.ini"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_cert_requests_wildcard_then_tests_renewal() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.credentials.keys_dir).unwrap();
        std::fs::write(config.credentials.certbot_ini(), "dns_cloudflare_api_token = x\n").unwrap();
        let (runner, calls) = RecordingRunner::new(Some("systemctl"));

        create_cert(&config, &runner).await.unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        let certonly = calls[0].join(" ");
        assert!(certonly.starts_with("sudo certbot certonly --dns-cloudflare"));
        assert!(certonly.contains("--dns-cloudflare-propagation-seconds 60"));
        assert!(certonly.ends_with("-d *.example.com -d example.com"));
        assert_eq!(calls[1], vec!["systemctl", "status", "certbot.timer"]);
        assert_eq!(calls[2], vec!["sudo", "certbot", "renew", "--dry-run"]);
    }

    #[tokio::test]
    async fn create_cert_stops_when_issuance_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        std::fs::create_dir_all(&config.credentials.keys_dir).unwrap();
        std::fs::write(config.credentials.certbot_ini(), "").unwrap();
        let (runner, calls) = RecordingRunner::new(Some("certonly"));

        let err = create_cert(&config, &runner).await.unwrap_err();

        assert!(err.to_string().contains("exit code 1"));
        assert_eq!(calls.lock().unwrap().len(), 1);
    }
}
