//! Generate structured actionable alerts from scraped RFMO artifacts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rfmo_ingestion::AlertGenerator;

#[derive(Parser)]
#[command(name = "rfmo-alerts")]
#[command(about = "Generate structured actionable alerts from scraped RFMO artifacts")]
#[command(version)]
struct Args {
    /// Root of the versioned artifact tree.
    #[arg(long, default_value = "rfmo")]
    storage_root: PathBuf,

    /// Where to write the alerts payload.
    #[arg(long, default_value = "alerts.json")]
    output: PathBuf,

    /// Only include documents published in the last N days; 0 for all.
    #[arg(long, default_value_t = 7)]
    days: i64,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let alerts = AlertGenerator::new(&args.storage_root).generate(args.days);

    let payload = serde_json::json!({ "alerts": &alerts });
    std::fs::write(&args.output, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!("saved={}", args.output.display());
    println!("alerts={}", alerts.len());

    Ok(())
}
