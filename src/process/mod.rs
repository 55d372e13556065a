//! The three run modes.
//!
//! A processor owns file I/O for its mode and borrows a [`BlarpBackend`] for the effect
//! itself, so the same processor runs against the GPU engine or the CPU reference.

pub mod image_to_image;
pub mod image_to_video;
pub mod mode;
pub mod opts;
pub mod video_to_video;

use std::path::PathBuf;

use crate::effect::BlarpBackend;
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::BlarpResult;
use crate::pipeline::frame_pipeline::{FramePipeline, PipelineOpts, PipelineStats};
use crate::pipeline::jobs::{FrameJob, drive};

pub use image_to_image::ImageToImage;
pub use image_to_video::ImageToVideo;
pub use mode::Mode;
pub use opts::RunOpts;
pub use video_to_video::VideoToVideo;

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub output: PathBuf,
    pub frames: u64,
    /// Writer-stage counters for the video modes.
    pub pipeline: Option<PipelineStats>,
}

pub trait Processor {
    fn mode(&self) -> Mode;
    fn run(&mut self, backend: &mut dyn BlarpBackend) -> BlarpResult<RunSummary>;
}

/// Build the processor for `mode`. `opts` must already be validated for it.
pub fn processor_for(mode: Mode, opts: RunOpts) -> Box<dyn Processor> {
    match mode {
        Mode::ImageToImage => Box::new(ImageToImage::new(opts)),
        Mode::ImageToVideo => Box::new(ImageToVideo::new(opts)),
        Mode::VideoToVideo => Box::new(VideoToVideo::new(opts)),
    }
}

/// Render `jobs` through a fresh [`FramePipeline`] into `sink`, then end the sink.
pub(crate) fn render_video<'a, S, I>(
    backend: &mut dyn BlarpBackend,
    jobs: I,
    sink: S,
    cfg: SinkConfig,
    workers: usize,
    expected_frames: Option<u64>,
) -> BlarpResult<(S, PipelineStats)>
where
    S: FrameSink + 'static,
    I: IntoIterator<Item = BlarpResult<FrameJob<'a>>>,
{
    let opts = PipelineOpts {
        expected_frames,
        ..PipelineOpts::with_workers(workers)
    };
    let pipeline = FramePipeline::new(sink, cfg, opts)?;
    drive(backend, jobs, &pipeline, expected_frames)?;
    pipeline.finish()
}
