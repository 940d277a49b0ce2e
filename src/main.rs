use anyhow::{bail, Context};
use chrono::Utc;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use pano_views::input::SceneList;
use pano_views::report::RunReport;
use pano_views::ui::RunProgress;
use pano_views::{DownloaderConfig, Orchestrator, RunSummary, SceneId};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Download tiled panoramas and render eight directional views per scene
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Single scene id to process
    scene: Option<String>,

    /// File with scene ids (CSV with header, or one id per line)
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Output directory for the views
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Scene workers; twice this many scenes are submitted per batch
    #[arg(short = 'p', long)]
    pano_threads: Option<usize>,

    /// Upper bound on worker threads
    #[arg(long)]
    max_threads: Option<usize>,

    /// Override the detected host parallelism
    #[arg(long)]
    host_concurrency: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Attempts per tile
    #[arg(long)]
    retries: Option<u32>,

    /// Do not crop stitched panoramas
    #[arg(long)]
    no_crop: bool,

    /// Draw tile borders and coordinates (implies no cropping)
    #[arg(long)]
    labels: bool,

    /// Skip scenes whose eight views already exist
    #[arg(long)]
    skip_existing: bool,

    /// Seed for reproducible view jitter
    #[arg(long)]
    seed: Option<u64>,

    /// JSON config file; command line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the input CSV without failed scenes (default `<stem>_cleaned.csv`)
    #[arg(long, num_args = 0..=1, value_name = "FILE")]
    clean_csv: Option<Option<PathBuf>>,

    /// Write a JSON run report
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Also append log records to this file
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,
}

impl Cli {
    /// Config file (or defaults) with command line overrides applied
    fn resolve_config(&self) -> anyhow::Result<DownloaderConfig> {
        let mut config = match &self.config {
            Some(path) => DownloaderConfig::load(path)?,
            None => DownloaderConfig::default(),
        };

        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(threads) = self.pano_threads {
            config.pano_thread_count = threads;
        }
        if let Some(threads) = self.max_threads {
            config.max_total_threads = threads;
        }
        if let Some(host) = self.host_concurrency {
            config.host_concurrency = Some(host);
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.retry_count = retries;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        config.auto_crop &= !self.no_crop;
        config.draw_tile_labels |= self.labels;
        config.skip_existing |= self.skip_existing;

        config.validate()?;
        Ok(config)
    }

    fn load_scenes(&self) -> anyhow::Result<SceneList> {
        match (&self.scene, &self.file) {
            (Some(_), Some(_)) => bail!("give either a scene id or --file, not both"),
            (Some(scene), None) => Ok(SceneList::single(SceneId::from(scene.as_str()))),
            (None, Some(path)) => SceneList::load(path)
                .with_context(|| format!("failed to load scene ids from {}", path.display())),
            (None, None) => bail!("no input: give a scene id or --file <FILE>"),
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let console = tracing_subscriber::fmt::layer()
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_writer(std::io::stderr);

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()?;
    Ok(())
}

fn log_summary(summary: &RunSummary, elapsed_secs: f64) {
    info!("Processing complete in {:.1}s", elapsed_secs);
    info!(
        "Total: {}, Successful: {}, Failed: {}",
        summary.total, summary.successful, summary.failed
    );

    if !summary.failed_scenes.is_empty() {
        info!("Failed panoramas:");
        for (i, scene) in summary.failed_scenes.iter().enumerate() {
            info!("  {}. {}", i + 1, scene);
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    let config = cli.resolve_config()?;
    let scenes = cli.load_scenes()?;

    info!("Output directory: {}", config.output_dir.display());
    info!(
        "Retries: {}, timeout: {}s, auto-crop: {}, labels: {}",
        config.retry_count, config.timeout_secs, config.auto_crop, config.draw_tile_labels
    );

    let orchestrator = Orchestrator::new(config).context("failed to set up the run")?;

    let started_at = Utc::now();
    let progress = RunProgress::new(scenes.len(), std::io::stderr().is_terminal());
    let summary = orchestrator.run(scenes.scenes(), |result, counts| {
        progress.update(result, counts)
    });
    progress.finish();
    let finished_at = Utc::now();

    let report = RunReport::new(&summary, started_at, finished_at);
    log_summary(&summary, report.elapsed_secs());

    if let Some(target) = &cli.clean_csv {
        if !scenes.is_table() {
            warn!("--clean-csv needs a CSV input file; skipping");
        } else if summary.failed_scenes.is_empty() {
            info!("No failed scenes, cleaned CSV not needed");
        } else {
            let path = target.clone().unwrap_or_else(|| scenes.default_cleaned_path());
            scenes
                .write_cleaned(&summary.failed_scenes, &path)
                .with_context(|| format!("failed to write cleaned CSV {}", path.display()))?;
        }
    }

    if let Some(path) = &cli.report {
        report.write(path)?;
        info!("Run report written to {}", path.display());
    }

    Ok(if summary.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
