//! Command line adapter for the bucket share reconciler.
//!
//! Exit codes: 0 on success, 1 when the share operation failed (the alarm
//! has been raised by then), 2 on invalid input.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use bucket_share_reconciler::arn::bucket_arns;
use bucket_share_reconciler::synthesis::default_bucket_policy;
use bucket_share_reconciler::synthesis::policy_builder::build_owner_statement;
use bucket_share_reconciler::{ShareConfig, ShareContext, ShareManager};
use clap::{Args, Parser, Subcommand};
use log::{debug, error};

const EXIT_SHARE_FAILED: u8 = 1;
const EXIT_INVALID_INPUT: u8 = 2;

const LONG_ABOUT: &str = "\
Grant and revoke cross-account bucket access for dataset shares.

AWS calls use the ambient credentials of the standard provider chain, and only
the account those credentials belong to is served. A share whose bucket and
requester live in different accounts therefore fails with an account mismatch
when run from this CLI; cross-account shares need an embedding that supplies a
session provider able to reach every account involved.";

#[derive(Parser)]
#[command(name = "bucket-share")]
#[command(about = "Grant and revoke cross-account bucket access for dataset shares")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON configuration file; unset fields keep their defaults
    #[arg(long, global = true, env = "BUCKET_SHARE_CONFIG")]
    config: Option<PathBuf>,

    /// SNS topic receiving failure alarms
    #[arg(long, global = true, env = "BUCKET_SHARE_ALARM_TOPIC_ARN")]
    alarm_topic_arn: Option<String>,

    /// Environment name used in alarm messages
    #[arg(long, global = true, env = "BUCKET_SHARE_ENV_NAME")]
    env_name: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Grant the share's requester access to the bucket
    Approve(ShareArgs),

    /// Revoke the share's requester access to the bucket
    Revoke(ShareArgs),

    /// Print the policy a bucket without one receives on its first grant
    RenderDefaultPolicy {
        /// Bucket name
        #[arg(long)]
        bucket: String,

        /// IAM unique id of an owner role (repeatable)
        #[arg(long = "owner-role-id", required = true, num_args = 1..)]
        owner_role_ids: Vec<String>,
    },
}

#[derive(Args)]
struct ShareArgs {
    /// Share context JSON file
    #[arg(long)]
    context: PathBuf,
}

#[derive(Clone, Copy)]
enum Operation {
    Approve,
    Revoke,
}

impl Cli {
    fn share_config(&self) -> Result<ShareConfig> {
        let mut config = match &self.config {
            Some(path) => ShareConfig::from_file(path)
                .with_context(|| format!("invalid config {}", path.display()))?,
            None => ShareConfig::default(),
        };
        if let Some(topic_arn) = &self.alarm_topic_arn {
            config.alarm_topic_arn = Some(topic_arn.clone());
        }
        if let Some(env_name) = &self.env_name {
            config.environment_name = env_name.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn load_context(path: &Path) -> Result<ShareContext> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read context {}", path.display()))?;
    let context = ShareContext::from_json(&raw)
        .with_context(|| format!("malformed context {}", path.display()))?;
    context.validate()?;
    Ok(context)
}

async fn reconcile(
    config: ShareConfig,
    ctx: &ShareContext,
    operation: Operation,
) -> Result<ExitCode> {
    let manager = ShareManager::from_aws(config).await?;
    let result = match operation {
        Operation::Approve => manager.try_process_approved_share(ctx).await,
        Operation::Revoke => manager.try_process_revoked_share(ctx).await,
    };
    match result {
        Ok(()) => {
            println!("{}: ok", ctx.share.share_uri);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!("{e}");
            eprintln!("Error: {e}");
            Ok(ExitCode::from(EXIT_SHARE_FAILED))
        }
    }
}

fn render_default_policy(
    config: &ShareConfig,
    bucket: &str,
    owner_role_ids: &[String],
) -> Result<String> {
    let arns = bucket_arns(&config.partition, bucket);
    let owner = build_owner_statement(&config.owner_sid, &arns, owner_role_ids);
    Ok(serde_json::to_string_pretty(&default_bucket_policy(owner))?)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = cli.share_config()?;
    debug!("Using configuration {config:?}");
    match &cli.command {
        Commands::Approve(args) => {
            let ctx = load_context(&args.context)?;
            reconcile(config, &ctx, Operation::Approve).await
        }
        Commands::Revoke(args) => {
            let ctx = load_context(&args.context)?;
            reconcile(config, &ctx, Operation::Revoke).await
        }
        Commands::RenderDefaultPolicy { bucket, owner_role_ids } => {
            println!("{}", render_default_policy(&config, bucket, owner_role_ids)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(EXIT_INVALID_INPUT)
        }
    }
}
