//! VBET CLI - valley bottom extraction per watershed

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use vbet_parallel::ProcessingMode;
use vbet_pipeline::{
    derive_terrain_files, run, run_batch, BatchFile, CancelToken, InputPaths, RunObserver, RunRequest, RunStatus,
    RunSummary, Stage, VbetConfig,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "vbet")]
#[command(author, version, about = "Valley Bottom Extraction Tool", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Trace-level output
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the valley bottom pipeline for one watershed
    Run {
        /// Watershed identifier (HUC)
        huc: String,
        /// Drainage network lines (GeoJSON)
        network: PathBuf,
        /// Waterbody polygons (GeoJSON)
        waterbodies: PathBuf,
        /// Slope raster in degrees
        slope: PathBuf,
        /// Height above nearest drainage raster
        hand: PathBuf,
        /// Hillshade raster
        hillshade: PathBuf,
        /// Output directory
        output_dir: PathBuf,
        /// Comma-separated reach codes to keep
        #[arg(long, value_delimiter = ',')]
        reach_codes: Option<Vec<String>>,
        /// Project metadata as key=value, repeatable
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Discard cached intermediates
        #[arg(long)]
        force: bool,
        /// Remove the working directory when done
        #[arg(long)]
        cleanup: bool,
        /// Parent of the per-watershed working directory
        #[arg(long)]
        temp_folder: Option<PathBuf>,
    },
    /// Run many watersheds from a JSON job file
    Batch {
        /// Job file: {"jobs": [...]}
        jobs: PathBuf,
        /// Run watersheds concurrently
        #[arg(long)]
        parallel: bool,
        /// Worker threads (defaults to all cores)
        #[arg(short = 'j', long = "jobs")]
        jobs_count: Option<usize>,
    },
    /// Derive slope, HAND and hillshade rasters from a DEM
    DeriveTerrain {
        /// Input DEM
        dem: PathBuf,
        /// Drainage network lines (GeoJSON)
        network: PathBuf,
        /// Output directory
        out_dir: PathBuf,
        /// Waterbody polygons (GeoJSON)
        #[arg(long)]
        waterbodies: Option<PathBuf>,
        /// Comma-separated reach codes to keep
        #[arg(long, value_delimiter = ',')]
        reach_codes: Option<Vec<String>>,
        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ─── Progress ───────────────────────────────────────────────────────────

/// One spinner per watershed, driven by stage events
struct SpinnerObserver {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl SpinnerObserver {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn with_bar(&self, huc: &str, f: impl FnOnce(&ProgressBar)) {
        let Ok(mut bars) = self.bars.lock() else {
            return;
        };
        let bar = bars.entry(huc.to_string()).or_insert_with(|| {
            let pb = self.multi.add(ProgressBar::new_spinner());
            pb.set_style(spinner_style());
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });
        f(bar);
    }
}

impl RunObserver for SpinnerObserver {
    fn stage_started(&self, huc: &str, stage: Stage) {
        self.with_bar(huc, |pb| pb.set_message(format!("{huc}: {stage}")));
    }

    fn cache_hit(&self, huc: &str, artifact: &str) {
        self.with_bar(huc, |pb| pb.set_message(format!("{huc}: reusing {artifact}")));
    }

    fn run_finished(&self, huc: &str, status: RunStatus) {
        self.with_bar(huc, |pb| match status {
            RunStatus::Succeeded => pb.finish_with_message(format!("{huc}: done")),
            _ => pb.abandon_with_message(format!("{huc}: failed")),
        });
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool, debug: bool) -> Result<()> {
    let level = if debug {
        Level::TRACE
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn parse_meta(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once('=')
        .with_context(|| format!("metadata must be key=value, got: {s}"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("metadata key is empty in: {s}");
    }
    Ok((key.to_string(), value.trim().to_string()))
}

fn load_config(path: Option<&PathBuf>, reach_codes: Option<Vec<String>>) -> Result<VbetConfig> {
    let mut config = match path {
        Some(p) => VbetConfig::from_file(p).with_context(|| format!("Failed to load config {}", p.display()))?,
        None => VbetConfig::default(),
    };
    if reach_codes.is_some() {
        config.network.reach_codes = reach_codes;
    }
    Ok(config)
}

fn report(summary: &RunSummary, elapsed: Duration) {
    println!("HUC {} written to: {}", summary.huc, summary.output_dir.display());
    for layer in &summary.layers {
        println!(
            "  {:<9} area {:>14.1}  parts {:>4}{}",
            layer.name,
            layer.area,
            layer.part_count,
            if layer.classification_cached { "  (cached)" } else { "" }
        );
    }
    println!("  Manifest: {}", summary.manifest.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.debug)?;
    let cancel = CancelToken::new();

    match cli.command {
        Commands::Run {
            huc,
            network,
            waterbodies,
            slope,
            hand,
            hillshade,
            output_dir,
            reach_codes,
            meta,
            config,
            force,
            cleanup,
            temp_folder,
        } => {
            let config = load_config(config.as_ref(), reach_codes)?;
            let request = RunRequest {
                huc: huc.clone(),
                inputs: InputPaths {
                    network,
                    waterbodies,
                    slope,
                    hand,
                    hillshade,
                },
                output_dir,
                config,
                force,
                cleanup,
                temp_folder,
                meta: meta.into_iter().collect::<BTreeMap<_, _>>(),
            };
            let observer = SpinnerObserver::new();
            let start = Instant::now();
            let summary =
                run(&request, &observer, &cancel).with_context(|| format!("VBET run for HUC {huc} failed"))?;
            report(&summary, start.elapsed());
        }

        Commands::Batch {
            jobs,
            parallel,
            jobs_count,
        } => {
            let batch = BatchFile::from_file(&jobs).with_context(|| format!("Failed to read {}", jobs.display()))?;
            let mode = if parallel {
                ProcessingMode::from_jobs(jobs_count)
            } else {
                ProcessingMode::Sequential
            };
            info!("{} watersheds, mode {:?}", batch.jobs.len(), mode);

            let observer = SpinnerObserver::new();
            let start = Instant::now();
            let outcomes = run_batch(&batch.jobs, mode, &observer, &cancel).context("Batch rejected")?;

            let mut failed = 0;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(summary) => println!("{}: ok ({} layers)", outcome.huc, summary.layers.len()),
                    Err(e) => {
                        failed += 1;
                        println!("{}: {} ({})", outcome.huc, e, e.kind_name());
                    }
                }
            }
            println!("  Processing time: {:.2?}", start.elapsed());
            if failed > 0 {
                anyhow::bail!("{failed} of {} watersheds failed", outcomes.len());
            }
        }

        Commands::DeriveTerrain {
            dem,
            network,
            out_dir,
            waterbodies,
            reach_codes,
            config,
        } => {
            let config = load_config(config.as_ref(), reach_codes)?;
            let pb = ProgressBar::new_spinner();
            pb.set_style(spinner_style());
            pb.set_message("Deriving terrain...");
            pb.enable_steady_tick(Duration::from_millis(100));
            let start = Instant::now();
            let outputs = derive_terrain_files(&dem, &network, waterbodies.as_deref(), &out_dir, &config)
                .context("Failed to derive terrain")?;
            pb.finish_and_clear();
            for path in [&outputs.slope, &outputs.hand, &outputs.hillshade] {
                println!("Saved to: {}", path.display());
            }
            println!("  Processing time: {:.2?}", start.elapsed());
        }
    }

    Ok(())
}
