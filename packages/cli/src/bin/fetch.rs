//! Run one ingestion pass and dump the run result plus stored artifact
//! paths as JSON.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rfmo_ingestion::Engine;

#[derive(Parser)]
#[command(name = "rfmo-fetch")]
#[command(about = "Run RFMO scrape/ingestion and output raw file paths")]
#[command(version)]
struct Args {
    /// SQLite metadata database.
    #[arg(long, default_value = "rfmo_ingestion.db")]
    db_path: PathBuf,

    /// Root of the versioned artifact tree.
    #[arg(long, default_value = "rfmo")]
    storage_root: PathBuf,

    /// Where to write the run payload.
    #[arg(long, default_value = "raw_file_paths.json")]
    output: PathBuf,

    /// Comma-separated adapter names.
    #[arg(long, default_value = "iccat,wcpfc,iotc")]
    adapters: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let adapter_names: Vec<String> = args
        .adapters
        .split(',')
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();

    let engine = Engine::open(&args.db_path, &args.storage_root)
        .await
        .context("failed to open ingestion engine")?;

    let result = engine
        .run_once(Some(&adapter_names))
        .await
        .context("ingestion run failed")?;

    let raw_paths = engine
        .store()
        .list_storage_paths()
        .await
        .context("failed to list stored artifact paths")?;

    let payload = serde_json::json!({
        "run": &result,
        "raw_paths": raw_paths,
    });
    std::fs::write(&args.output, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    // Per-document failures are reported in the payload, not the exit
    // code.
    println!("saved={}", args.output.display());
    println!("ingested={}", result.metrics.documents_ingested);
    println!("skipped={}", result.metrics.documents_skipped);
    println!("failures={}", result.metrics.failures);

    Ok(())
}
