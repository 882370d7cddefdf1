use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use atelier_album::{AlbumCompositor, AlbumConfig};
use atelier_core::mode::{builtin_catalog, find_mode, parse_catalog, Mode, ModeKind};
use atelier_core::types::ImageData;
use atelier_generation::api::GeminiApi;
use atelier_generation::config::GeminiConfig;
use atelier_pipeline::config::parse_concurrency;
use atelier_pipeline::events::StoreEvent;
use atelier_pipeline::{Download, RecordStatus, Studio, StudioConfig};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "atelier", version, about = "Creative photo generation studio")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the available creative modes.
    Modes(ModesArgs),
    /// Transform a photo with one mode and save the results.
    Generate(GenerateArgs),
}

#[derive(Parser, Debug)]
struct ModesArgs {
    /// JSON mode catalog to use instead of the built-in one.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Print the catalog as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    /// Mode id (see `atelier modes`).
    #[arg(long)]
    mode: String,

    /// Source photo.
    #[arg(long)]
    input: PathBuf,

    /// Directory the images are written to (created if missing).
    #[arg(long)]
    output_dir: PathBuf,

    /// Maximum concurrent generation calls (overrides ATELIER_CONCURRENCY).
    #[arg(long, value_parser = concurrency_arg)]
    concurrency: Option<usize>,

    /// Also compose the album page when every image succeeded.
    #[arg(long)]
    album: bool,

    /// JSON mode catalog to use instead of the built-in one.
    #[arg(long)]
    catalog: Option<PathBuf>,
}

fn concurrency_arg(raw: &str) -> Result<usize, String> {
    parse_concurrency(raw).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier=info,atelier_pipeline=info,atelier_album=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Modes(args) => cmd_modes(args).await,
        Command::Generate(args) => cmd_generate(args).await,
    }
}

async fn load_catalog(path: Option<&Path>) -> anyhow::Result<Vec<Mode>> {
    let Some(path) = path else {
        return Ok(builtin_catalog());
    };
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read catalog '{}'", path.display()))?;
    let modes =
        parse_catalog(&json).with_context(|| format!("parse catalog '{}'", path.display()))?;
    Ok(modes)
}

async fn cmd_modes(args: ModesArgs) -> anyhow::Result<()> {
    let modes = load_catalog(args.catalog.as_deref()).await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&modes)?);
        return Ok(());
    }
    for mode in &modes {
        let kind = match &mode.kind {
            ModeKind::Single { .. } => "single".to_string(),
            ModeKind::Multi { prompts } => format!("multi x{}", prompts.len()),
        };
        println!("{:<18} {:<10} {}", mode.id, kind, mode.title);
    }
    Ok(())
}

async fn cmd_generate(args: GenerateArgs) -> anyhow::Result<()> {
    let catalog = load_catalog(args.catalog.as_deref()).await?;
    let mode = find_mode(&catalog, &args.mode)?.clone();

    let client = Arc::new(GeminiApi::new(GeminiConfig::from_env()?)?);
    let mut config = StudioConfig::from_env()?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }

    let bytes = tokio::fs::read(&args.input)
        .await
        .with_context(|| format!("read photo '{}'", args.input.display()))?;
    let source = ImageData::from_bytes(bytes)?;

    let studio = Studio::new(client, config);
    studio.select_mode(mode.clone()).await?;
    studio.set_source(source).await?;

    let progress = tokio::spawn(report_progress(studio.store().subscribe()));
    let summary = studio.generate().await?;
    progress.abort();

    tokio::fs::create_dir_all(&args.output_dir)
        .await
        .with_context(|| format!("create '{}'", args.output_dir.display()))?;

    for record in studio.snapshot().await.records {
        match record.status() {
            RecordStatus::Done => {
                let download = studio.download_image(&record.key).await?;
                save(&args.output_dir, &download).await?;
            }
            RecordStatus::Error => {
                eprintln!(
                    "{}: {}",
                    record.key,
                    record.error_message().unwrap_or_default()
                );
            }
            RecordStatus::Pending => {}
        }
    }

    if args.album {
        if !mode.is_multi() {
            tracing::warn!(mode = %mode.id, "Mode has no album; skipping");
        } else if !studio.is_complete().await {
            tracing::warn!(failed = summary.failed, "Not every image succeeded; skipping album");
        } else {
            let compositor = AlbumCompositor::new(AlbumConfig::from_env());
            let album = studio.download_album(&compositor).await?;
            save(&args.output_dir, &album).await?;
        }
    }

    println!("{} of {} images generated", summary.done, summary.total);
    if summary.failed > 0 {
        anyhow::bail!("{} generation(s) failed", summary.failed);
    }
    Ok(())
}

async fn save(dir: &Path, download: &Download) -> anyhow::Result<()> {
    let path = dir.join(&download.filename);
    tokio::fs::write(&path, download.image.bytes())
        .await
        .with_context(|| format!("write '{}'", path.display()))?;
    tracing::info!(path = %path.display(), bytes = download.image.len(), "Saved");
    Ok(())
}

/// Log store changes as they happen.
async fn report_progress(mut events: broadcast::Receiver<StoreEvent>) {
    loop {
        match events.recv().await {
            Ok(StoreEvent::RunReset { keys, .. }) => {
                tracing::info!(tasks = keys.len(), "Run started");
            }
            Ok(StoreEvent::RecordUpdated { key, status, .. }) => {
                tracing::info!(key = %key, status = %status, "Progress");
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Progress reporter fell behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
