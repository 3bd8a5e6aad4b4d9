//! ec2-enable-imdsv2: enforce IMDSv2 across every enabled region of an account
//!
//! Scans all EC2 instances and the per-region account metadata defaults,
//! asks for confirmation, then sets `HttpTokens=required` where needed.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use futures::FutureExt;
use imdsv2_common::{Component, ErrorLog};
use imdsv2_enforcer::aws::{AwsContext, get_current_account_id};
use imdsv2_enforcer::config::RunConfig;
use imdsv2_enforcer::logging;
use imdsv2_enforcer::orchestrator::{
    ConsolePrompt, ExitStatus, Orchestrator, RunPhase, RunReport, report,
};
use tracing::info;

const AFTER_HELP: &str = "\
Examples:
  ec2-enable-imdsv2 --profile production
  ec2-enable-imdsv2 --profile dev-account

Required AWS Permissions:
  - ec2:DescribeRegions
  - ec2:DescribeInstances
  - ec2:ModifyInstanceMetadataOptions
  - ec2:GetInstanceMetadataDefaults
  - ec2:ModifyInstanceMetadataDefaults";

#[derive(Parser, Debug)]
#[command(name = "ec2-enable-imdsv2")]
#[command(about = "Enable IMDSv2 enforcement on EC2 instances across all AWS regions")]
#[command(version, after_help = AFTER_HELP)]
struct Args {
    /// AWS profile name from ~/.aws/credentials or ~/.aws/config
    #[arg(long, value_name = "PROFILE")]
    profile: String,
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        RunConfig::new(args.profile)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logging::init();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n\nOperation cancelled by user");
            std::process::exit(ExitStatus::Interrupted.code());
        }
    });

    let errors = Arc::new(ErrorLog::new());
    let mut run_report = RunReport::new(&args.profile, Arc::clone(&errors));

    let outcome = AssertUnwindSafe(run(args, &mut run_report))
        .catch_unwind()
        .await;

    let status = match outcome {
        Ok(Ok(())) => run_report.exit_status(),
        Ok(Err(e)) => {
            print_error(&e);
            print_partial_summary(&run_report);
            ExitStatus::Failure
        }
        Err(panic) => {
            let message = panic_message(&*panic);
            errors.record(Component::Orchestrator, None, None, "Panic", message.as_str());
            print_error(&anyhow::anyhow!("Unexpected error: {message}"));
            print_partial_summary(&run_report);
            ExitStatus::Failure
        }
    };

    std::process::exit(status.code());
}

async fn run(args: Args, run_report: &mut RunReport) -> Result<()> {
    let config: RunConfig = args.into();
    info!(profile = %config.profile, "Using AWS profile");

    let aws = AwsContext::with_profile(&config.profile).await;
    let account_id = get_current_account_id(aws.sdk_config()).await?;
    run_report.account_id = Some(account_id);

    let home_region = aws.home_region().to_string();
    info!(home_region = %home_region, "Resolved home region");

    let errors = Arc::clone(&run_report.errors);
    let mut orchestrator =
        Orchestrator::new(aws, ConsolePrompt::stdio(), home_region, config, errors);
    orchestrator.run(run_report).await
}

/// Print what a run got through before it stopped
fn print_partial_summary(run_report: &RunReport) {
    if run_report.phase >= RunPhase::Scanning {
        report::print_final_summary(run_report);
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Print error in a user-friendly way
fn print_error(e: &anyhow::Error) {
    use std::io::Write;

    let mut stderr = std::io::stderr();

    let _ = writeln!(stderr, "\n\x1b[1;31mError:\x1b[0m {e}");

    let mut source = e.source();
    while let Some(cause) = source {
        let _ = writeln!(stderr, "  \x1b[33mCaused by:\x1b[0m {cause}");
        source = cause.source();
    }

    if std::env::var("RUST_BACKTRACE").is_err() {
        let _ = writeln!(
            stderr,
            "\n\x1b[2mSet RUST_BACKTRACE=1 for a detailed backtrace\x1b[0m"
        );
    } else {
        let backtrace = e.backtrace();
        if backtrace.status() == std::backtrace::BacktraceStatus::Captured {
            let _ = writeln!(stderr, "\n\x1b[2mBacktrace:\x1b[0m\n{backtrace}");
        }
    }
}
