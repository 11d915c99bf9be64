//! Strato - atmospheric trajectory tools
//!
//! - `convert`: trajectory file to OBJ polylines
//! - `histogram`: per-attribute histograms in the terminal
//! - `render`: headless order-independent transparency render to PNG

mod config;
mod histogram;
mod render;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use strato_oit::{GpuContext, OitMode};
use strato_traj::{MultiVarHistograms, TrajectorySet};

use crate::config::StratoConfig;

#[derive(Parser, Debug)]
#[command(name = "strato")]
#[command(about = "Atmospheric trajectory conversion, inspection and rendering")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to ./strato.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a trajectory file to Wavefront OBJ polylines
    Convert {
        /// Trajectory file
        input: PathBuf,

        /// Output file (defaults to the input with an .obj extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print attribute histograms
    Histogram {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of buckets (1-255)
        #[arg(short, long)]
        buckets: Option<usize>,
    },

    /// Render trajectories headless and save the last frame as PNG
    Render {
        #[command(flatten)]
        source: SourceArgs,

        /// Transparency mode (dummy, linked-list)
        #[arg(short, long)]
        mode: Option<OitMode>,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        /// Number of frames to render
        #[arg(long)]
        frames: Option<u32>,

        /// PNG output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Where trajectories come from
#[derive(Args, Debug)]
struct SourceArgs {
    /// Trajectory file
    input: Option<PathBuf>,

    /// Generate this many synthetic spiral trajectories instead of reading a file
    #[arg(long, conflicts_with = "input")]
    synthetic: Option<usize>,
}

/// Samples per synthetic trajectory
const SYNTHETIC_STEPS: usize = 120;

impl SourceArgs {
    fn load(&self) -> Result<TrajectorySet> {
        match (&self.input, self.synthetic) {
            (Some(path), _) => load_file(path),
            (None, Some(count)) => Ok(strato_traj::spiral_trajectories(count, SYNTHETIC_STEPS)),
            (None, None) => anyhow::bail!("Provide a trajectory file or --synthetic <COUNT>"),
        }
    }
}

#[cfg(feature = "netcdf")]
fn load_file(path: &Path) -> Result<TrajectorySet> {
    let data = strato_traj::load_netcdf_file(path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(data.trajectories)
}

#[cfg(not(feature = "netcdf"))]
fn load_file(path: &Path) -> Result<TrajectorySet> {
    anyhow::bail!(
        "Cannot read {}: strato was built without NetCDF support (rebuild with --features netcdf)",
        path.display()
    )
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = StratoConfig::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Convert { input, output } => {
            let set = load_file(&input)?;
            let output = output.unwrap_or_else(|| strato_traj::default_obj_path(&input));
            let summary = strato_traj::export_obj_file(&set, &output)
                .with_context(|| format!("Failed to convert {}", input.display()))?;
            println!(
                "Wrote {} lines ({} vertices) to {}",
                summary.lines,
                summary.vertices,
                output.display()
            );
        }
        Command::Histogram { source, buckets } => {
            if let Some(buckets) = buckets {
                config.histogram.buckets = buckets;
            }
            let set = source.load()?;
            let mut model = MultiVarHistograms::new(set.attribute_series());
            model.set_bucket_count(config.histogram.buckets);
            print!(
                "{}",
                histogram::format_histograms(&model, config.histogram.bar_width)
            );
        }
        Command::Render {
            source,
            mode,
            width,
            height,
            frames,
            output,
        } => {
            if let Some(width) = width {
                config.output.width = width;
            }
            if let Some(height) = height {
                config.output.height = height;
            }
            if let Some(frames) = frames {
                config.output.frames = frames;
            }
            if let Some(output) = output {
                config.output.image = output;
            }
            let mut oit = config.oit_config()?;
            if let Some(mode) = mode {
                oit.mode = mode;
            }

            let set = source.load()?;
            let ctx = GpuContext::headless_blocking().context("Failed to initialize the GPU")?;
            tracing::info!("using adapter {}", ctx.adapter_name());

            let outcome = render::render_frames(&ctx, &set, &oit, &config.output, &config.camera)?;
            let stats = outcome.stats;
            render::save_png(
                &config.output.image,
                outcome.width,
                outcome.height,
                outcome.pixels,
            )?;
            println!(
                "Rendered {} frame(s) to {} ({} fragments, {} dropped, {:.1}% of capacity)",
                outcome.frames,
                config.output.image.display(),
                stats.stored(),
                stats.dropped(),
                stats.fill_ratio() * 100.0
            );
        }
    }

    Ok(())
}
