use image::RgbImage;

use crate::effect::BlarpBackend;
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::BlarpResult;
use crate::media::image_io::load_rgb;
use crate::pipeline::frame_pipeline::PipelineStats;
use crate::pipeline::jobs::accumulating_jobs;
use crate::process::{Mode, Processor, RunOpts, RunSummary, render_video};

/// Turn one image into a video whose frame `i` carries `i + 1` passes.
#[derive(Debug, Clone)]
pub struct ImageToVideo {
    opts: RunOpts,
}

impl ImageToVideo {
    pub fn new(opts: RunOpts) -> Self {
        Self { opts }
    }

    /// Render all frames of `image` into `sink`.
    pub fn render_frames<S: FrameSink + 'static>(
        &self,
        backend: &mut dyn BlarpBackend,
        image: &RgbImage,
        sink: S,
    ) -> BlarpResult<(S, PipelineStats)> {
        let cfg = SinkConfig {
            width: image.width(),
            height: image.height(),
            fps: self.opts.output_fps()?,
        };
        let count = self.opts.iterations;
        render_video(
            backend,
            accumulating_jobs(image, count),
            sink,
            cfg,
            self.opts.workers,
            Some(u64::from(count)),
        )
    }
}

impl Processor for ImageToVideo {
    fn mode(&self) -> Mode {
        Mode::ImageToVideo
    }

    #[tracing::instrument(skip_all, fields(input = %self.opts.input.display(), frames = self.opts.iterations))]
    fn run(&mut self, backend: &mut dyn BlarpBackend) -> BlarpResult<RunSummary> {
        let img = load_rgb(&self.opts.input)?;
        let sink = FfmpegSink::new(FfmpegSinkOpts::new(&self.opts.output));
        let (_, stats) = self.render_frames(backend, &img, sink)?;

        Ok(RunSummary {
            output: self.opts.output.clone(),
            frames: stats.frames_written,
            pipeline: Some(stats),
        })
    }
}
