use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use blarp::{
    BackendKind, BlarpBackend, CpuEffect, EffectEngine, GraphicsContext, Mode, RunOpts,
    RunSummary, processor_for,
};

#[derive(Parser, Debug)]
#[command(
    name = "blarp",
    version,
    about = "Blarp (blur and sharpen) videos and images a lot of times for interesting effects"
)]
struct Cli {
    /// Input image or video.
    #[arg(short = 'i', long)]
    input_media: PathBuf,

    /// Output image or video; the extension picks the mode.
    #[arg(short = 'o', long)]
    output_media: PathBuf,

    /// Pass count per frame (image→video: number of frames).
    #[arg(short = 'n', long, default_value_t = blarp::process::opts::DEFAULT_ITERATIONS)]
    num_blarp: u32,

    /// Output frame rate for video modes.
    #[arg(long, default_value_t = blarp::process::opts::DEFAULT_FPS)]
    fps: u32,

    /// End blarping after this many frames (video→video only).
    #[arg(long)]
    max_frames: Option<u64>,

    /// Where the passes run.
    #[arg(long, value_enum, default_value_t = BackendChoice::Gpu)]
    backend: BackendChoice,

    /// Threads finishing and writing video frames.
    #[arg(long, default_value_t = blarp::pipeline::frame_pipeline::DEFAULT_WORKERS)]
    workers: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    Gpu,
    Cpu,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("blarp=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = RunOpts {
        input: cli.input_media,
        output: cli.output_media,
        iterations: cli.num_blarp,
        fps: cli.fps,
        max_frames: cli.max_frames,
        workers: cli.workers,
    };

    // Mode and options are checked before any GPU work.
    let mode = Mode::select(&opts.input, &opts.output)?;
    opts.validate(mode)?;
    let kind = match cli.backend {
        BackendChoice::Gpu => BackendKind::Gpu,
        BackendChoice::Cpu => BackendKind::Cpu,
    };
    tracing::info!(%mode, backend = ?kind, "starting");

    let summary = match kind {
        BackendKind::Gpu => {
            let mut ctx =
                GraphicsContext::initialize().context("failed to initialize the gpu context")?;
            let summary = {
                let mut engine = EffectEngine::new(&ctx);
                run(mode, opts, &mut engine)
            };
            ctx.release();
            summary?
        }
        BackendKind::Cpu => run(mode, opts, &mut CpuEffect::new())?,
    };

    println!(
        "✅ Saved blarped {} to {}",
        if mode.produces_video() { "video" } else { "image" },
        summary.output.display()
    );
    Ok(())
}

fn run(mode: Mode, opts: RunOpts, backend: &mut dyn BlarpBackend) -> anyhow::Result<RunSummary> {
    let input = opts.input.clone();
    let mut processor = processor_for(mode, opts);
    let summary = processor
        .run(backend)
        .with_context(|| format!("{mode} run failed for '{}'", input.display()))?;
    if let Some(stats) = summary.pipeline {
        tracing::info!(
            frames = stats.frames_written,
            peak_in_flight = stats.peak_in_flight,
            peak_reorder_depth = stats.peak_reorder_depth,
            "frames written"
        );
    }
    Ok(summary)
}
