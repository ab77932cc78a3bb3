use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use huahua_cli::{parse_block_time, simulate, OutputFormat, Settings};
use huahua_upgrades::{
    decode_identity, decode_records, plan_digest, records_total, IdentityConfig, UpgradeContext, COS_MINTS_JSON,
    UPGRADE_NAME,
};

#[derive(Parser)]
#[command(name = "huahua-cli")]
#[command(about = "Chihuahua v3.1.0 upgrade tooling", long_about = None)]
struct Cli {
    /// Settings file (default: ./huahua.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format, overrides the configured one
    #[arg(long, global = true, value_enum)]
    output: Option<OutputFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode and validate the embedded dataset and validator identity
    Verify,

    /// Print the decoded compensation records
    Records,

    /// Apply the upgrade to an in-memory chain and report the effects
    Simulate {
        /// Upgrade block height
        #[arg(long)]
        height: u64,

        /// Upgrade block time (RFC 3339)
        #[arg(long)]
        time: String,
    },
}

#[derive(Serialize)]
struct VerifySummary {
    upgrade: &'static str,
    operator: String,
    consensus: String,
    records: usize,
    total: u128,
    digest: String,
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", text()),
    }
    Ok(())
}

fn verify(format: OutputFormat) -> Result<()> {
    let identity = decode_identity(IdentityConfig::cos())?;
    let records = decode_records(COS_MINTS_JSON)?;
    let total = records_total(&records)?;

    let summary = VerifySummary {
        upgrade: UPGRADE_NAME,
        operator: identity.operator.to_string(),
        consensus: identity.consensus.to_string(),
        records: records.len(),
        total,
        digest: plan_digest(&identity, &records),
    };
    info!(records = summary.records, "Embedded inputs are valid");
    emit(format, &summary, || {
        format!(
            "upgrade:   {}\noperator:  {}\nconsensus: {}\nrecords:   {}\ntotal:     {}uhuahua\ndigest:    {}\n",
            summary.upgrade, summary.operator, summary.consensus, summary.records, summary.total, summary.digest
        )
    })
}

fn records(format: OutputFormat) -> Result<()> {
    let records = decode_records(COS_MINTS_JSON)?;
    emit(format, &records, || {
        records
            .iter()
            .map(|r| format!("{} {}\n", r.recipient, r.amount))
            .collect()
    })
}

fn run(cli: Cli, settings: Settings) -> Result<()> {
    let format = cli.output.unwrap_or(settings.output);
    match cli.command {
        Commands::Verify => verify(format),
        Commands::Records => records(format),
        Commands::Simulate { height, time } => {
            let ctx = UpgradeContext {
                height,
                block_time: parse_block_time(&time)?,
            };
            let report = simulate(&settings.chain_id, ctx)?;
            emit(format, &report, || report.to_string())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&settings.log_filter))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli, settings);
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}
