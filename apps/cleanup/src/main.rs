//! Retentor cleanup runner.
//!
//! Loads retention policies from the configuration store and deletes expired
//! rows in bounded batches.

#![forbid(unsafe_code)]

mod cleanup_config;

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use retentor_application::{BatchDeleter, CleanupService};
use retentor_core::AppResult;
use retentor_domain::RunSummary;
use retentor_infrastructure::MySqlGatewayRegistry;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cleanup_config::CleanupConfig;

/// Exit status used when `--fail-on-policy-error` is set and a policy failed.
const POLICY_FAILURE_EXIT: u8 = 2;

#[derive(Debug, Parser)]
#[command(version, about = "Delete expired rows according to retention policies", long_about = None)]
struct Args {
    /// Only process policies in this group
    #[arg(long)]
    group_id: Option<i64>,

    /// Path to the cleanup configuration file
    #[arg(short, long, default_value = "cleanup.toml")]
    config: PathBuf,

    /// Log the delete statements without executing them
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Exit with status 2 when any policy failed
    #[arg(long)]
    fail_on_policy_error: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    dotenvy::dotenv().ok();
    init_tracing(args.debug);

    let Some(outcome) = unless_interrupted(run(&args), interrupted()).await else {
        warn!("interrupted by user");
        return ExitCode::FAILURE;
    };

    match outcome {
        Ok(summary) => {
            if args.json {
                match serde_json::to_string_pretty(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(error) => {
                        error!(error = %error, "failed to serialize run summary");
                        return ExitCode::FAILURE;
                    }
                }
            }
            ExitCode::from(exit_status(&summary, args.fail_on_policy_error))
        }
        Err(error) => {
            error!(error = %error, "cleanup run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> AppResult<RunSummary> {
    let config = CleanupConfig::from_file(&args.config)?;
    info!(
        config = %args.config.display(),
        store = %config.store.connection,
        "loaded cleanup configuration"
    );

    let registry = Arc::new(MySqlGatewayRegistry::new(
        config.connection_settings(),
        config.statement_timeout(),
    ));
    let config_gateway = registry.connect(config.store.connection.as_str()).await?;

    let service = CleanupService::new(config_gateway, config.policy_store()?, registry)
        .with_batch_deleter(BatchDeleter::new(config.cleanup.max_iterations)?);

    service.run(args.group_id, args.dry_run).await
}

/// Drives `work` to completion unless `interrupt` resolves first.
async fn unless_interrupted<T>(
    work: impl Future<Output = T>,
    interrupt: impl Future<Output = ()>,
) -> Option<T> {
    tokio::select! {
        output = work => Some(output),
        () = interrupt => None,
    }
}

async fn interrupted() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        // Without a handler the default SIGINT behavior still applies.
        warn!(error = %error, "failed to listen for interrupts");
        std::future::pending::<()>().await;
    }
}

fn exit_status(summary: &RunSummary, fail_on_policy_error: bool) -> u8 {
    if fail_on_policy_error && summary.has_failures() {
        POLICY_FAILURE_EXIT
    } else {
        0
    }
}

fn init_tracing(debug: bool) {
    let env_filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs go to stderr so `--json` output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;
    use retentor_core::PolicyId;
    use retentor_domain::{DeleteOutcome, PolicyRunResult, RunSummary};
    use uuid::Uuid;

    use super::{Args, exit_status, unless_interrupted};

    fn summary_with_failure() -> RunSummary {
        let mut summary = RunSummary::start(Uuid::new_v4(), false);
        summary.record(PolicyRunResult::failed(
            PolicyId::new(7),
            "shop.orders".to_owned(),
            DeleteOutcome::default(),
            "connection refused",
        ));
        summary.finish();
        summary
    }

    #[test]
    fn defaults_point_at_local_config() {
        let args = Args::try_parse_from(["retentor-cleanup"]).unwrap_or_else(|_| unreachable!());

        assert_eq!(args.config, PathBuf::from("cleanup.toml"));
        assert_eq!(args.group_id, None);
        assert!(!args.dry_run);
        assert!(!args.fail_on_policy_error);
    }

    #[test]
    fn flags_are_parsed() {
        let args = Args::try_parse_from([
            "retentor-cleanup",
            "--group-id",
            "3",
            "-c",
            "/etc/retentor/cleanup.toml",
            "--dry-run",
            "--debug",
            "--json",
        ])
        .unwrap_or_else(|_| unreachable!());

        assert_eq!(args.group_id, Some(3));
        assert_eq!(args.config, PathBuf::from("/etc/retentor/cleanup.toml"));
        assert!(args.dry_run && args.debug && args.json);
    }

    #[test]
    fn non_numeric_group_is_rejected() {
        assert!(Args::try_parse_from(["retentor-cleanup", "--group-id", "nightly"]).is_err());
    }

    #[test]
    fn policy_failures_only_change_the_exit_code_when_asked() {
        let summary = summary_with_failure();

        assert_eq!(exit_status(&summary, false), 0);
        assert_eq!(exit_status(&summary, true), 2);
    }

    #[test]
    fn clean_run_succeeds_with_strict_exit() {
        let mut summary = RunSummary::start(Uuid::new_v4(), true);
        summary.finish();

        assert_eq!(exit_status(&summary, true), 0);
    }

    #[tokio::test]
    async fn interrupt_abandons_unfinished_work() {
        let outcome = unless_interrupted(std::future::pending::<u8>(), async {}).await;
        assert_eq!(outcome, None);
    }

    #[tokio::test]
    async fn finished_work_is_returned_without_an_interrupt() {
        let outcome = unless_interrupted(async { 7_u8 }, std::future::pending::<()>()).await;
        assert_eq!(outcome, Some(7));
    }
}
