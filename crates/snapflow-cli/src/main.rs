//! Snapflow CLI — run the ingestion pipeline against local files.
//!
//! Reads policy overrides from the environment (SNAPFLOW_* variables, see
//! snapflow-core), transcodes the given images, writes the results under
//! `--out-dir`, and prints a JSON report of every record.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use snapflow_core::{CandidateFile, FitMode, TranscodeOptions, UploadPolicy};
use snapflow_ingest::{UploadOrchestrator, UploadRecord};
use snapflow_storage::LocalStorage;
use tokio::sync::mpsc;

use snapflow_cli::{content_type_for_path, init_tracing};

#[derive(Parser)]
#[command(name = "snapflow", about = "Validate, transcode and store images")]
struct Cli {
    /// Image files to ingest
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory for encoded artifacts
    #[arg(long, default_value = "./out")]
    out_dir: PathBuf,

    /// Base URL prefixed to returned artifact URLs
    #[arg(long, default_value = "file://./out")]
    base_url: String,

    /// Encoding quality, 1-100
    #[arg(long, default_value = "85")]
    quality: u8,

    /// Maximum output width in pixels
    #[arg(long)]
    max_width: Option<u32>,

    /// Maximum output height in pixels
    #[arg(long)]
    max_height: Option<u32>,

    /// Fit mode when both dimensions are bounded: cover, contain or fill
    #[arg(long, default_value = "cover")]
    fit: String,

    /// Also generate thumbnails
    #[arg(long)]
    thumbnails: bool,

    /// Thumbnail width in pixels
    #[arg(long, default_value = "300")]
    thumbnail_width: u32,
}

#[derive(Serialize)]
struct Report {
    records: Vec<UploadRecord>,
    rejected: Vec<RejectedEntry>,
}

#[derive(Serialize)]
struct RejectedEntry {
    name: String,
    reason: String,
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize report")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let policy = UploadPolicy::from_env().context("Invalid upload policy")?;
    let options = TranscodeOptions {
        quality: cli.quality,
        max_width: cli.max_width,
        max_height: cli.max_height,
        fit_mode: FitMode::parse(&cli.fit)?,
        generate_thumbnail: cli.thumbnails,
        thumbnail_width: cli.thumbnail_width,
    };

    let storage = LocalStorage::new(&cli.out_dir, cli.base_url.clone())
        .await
        .context("Failed to initialize local storage")?;

    let (completion_tx, mut completion_rx) = mpsc::channel(64);
    let orchestrator = UploadOrchestrator::with_completions(
        Arc::new(storage),
        policy,
        options,
        completion_tx,
    )?;

    let mut candidates = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        candidates.push(CandidateFile::new(data, name, content_type_for_path(path)));
    }

    let outcome = orchestrator.submit(candidates).await?;

    let rejected: Vec<RejectedEntry> = outcome
        .rejected
        .iter()
        .map(|r| RejectedEntry {
            name: r.name.clone(),
            reason: r.message(),
        })
        .collect();
    for entry in &rejected {
        tracing::warn!(name = %entry.name, reason = %entry.reason, "File rejected");
    }

    // Every accepted file reports exactly one terminal record.
    for _ in 0..outcome.accepted.len() {
        if completion_rx.recv().await.is_none() {
            break;
        }
    }

    let report = Report {
        records: orchestrator.list().await?,
        rejected,
    };
    print_json(&report)?;

    if report.records.iter().any(|r| r.error_message.is_some()) || !report.rejected.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
