use crate::effect::BlarpBackend;
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, ensure_parent_dir};
use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::error::{BlarpError, BlarpResult};
use crate::media::decode::{FfmpegFrameSource, FrameSource};
use crate::media::probe::probe_video;
use crate::media::remux::{FfmpegRemuxer, Remuxer, TempFileGuard, intermediate_path, move_file};
use crate::pipeline::frame_pipeline::PipelineStats;
use crate::pipeline::jobs::per_frame_jobs;
use crate::process::{Mode, Processor, RunOpts, RunSummary, render_video};

/// Blarp every frame of a video with the same pass count and put the source audio back.
pub struct VideoToVideo {
    opts: RunOpts,
    remuxer: Box<dyn Remuxer>,
}

impl VideoToVideo {
    pub fn new(opts: RunOpts) -> Self {
        Self::with_remuxer(opts, Box::new(FfmpegRemuxer))
    }

    pub fn with_remuxer(opts: RunOpts, remuxer: Box<dyn Remuxer>) -> Self {
        Self { opts, remuxer }
    }

    /// Number of frames a run over `source` will produce, when knowable up front.
    pub fn expected_frames(&self, source: &dyn FrameSource) -> Option<u64> {
        match (source.frame_count_hint(), self.opts.max_frames) {
            (Some(n), Some(cap)) => Some(n.min(cap)),
            (None, Some(cap)) => Some(cap),
            (n, None) => n,
        }
    }

    /// Render frames pulled from `source` into `sink`, honoring `max_frames`.
    pub fn render_frames<S: FrameSink + 'static>(
        &self,
        backend: &mut dyn BlarpBackend,
        source: &mut dyn FrameSource,
        sink: S,
    ) -> BlarpResult<(S, PipelineStats)> {
        let cfg = SinkConfig {
            width: source.width(),
            height: source.height(),
            fps: self.opts.output_fps()?,
        };
        let expected = self.expected_frames(source);
        let jobs = per_frame_jobs(source, self.opts.iterations, self.opts.max_frames);
        render_video(backend, jobs, sink, cfg, self.opts.workers, expected)
    }
}

impl Processor for VideoToVideo {
    fn mode(&self) -> Mode {
        Mode::VideoToVideo
    }

    #[tracing::instrument(skip_all, fields(input = %self.opts.input.display(), n = self.opts.iterations))]
    fn run(&mut self, backend: &mut dyn BlarpBackend) -> BlarpResult<RunSummary> {
        let info = probe_video(&self.opts.input)?;
        let has_audio = info.has_audio;
        let mut source = FfmpegFrameSource::open(info)?;

        ensure_parent_dir(&self.opts.output)?;
        let video_only = intermediate_path(&self.opts.output);
        if video_only == self.opts.input {
            return Err(BlarpError::validation(format!(
                "intermediate file '{}' would overwrite the input",
                video_only.display()
            )));
        }
        let _cleanup = TempFileGuard::new(&video_only);

        let sink = FfmpegSink::new(FfmpegSinkOpts::new(&video_only));
        let (_, stats) = self.render_frames(backend, &mut source, sink)?;
        drop(source);

        if has_audio {
            self.remuxer
                .remux(&video_only, &self.opts.input, &self.opts.output)?;
        } else {
            tracing::warn!(
                input = %self.opts.input.display(),
                "source has no audio stream; writing video without audio"
            );
            move_file(&video_only, &self.opts.output)?;
        }

        Ok(RunSummary {
            output: self.opts.output.clone(),
            frames: stats.frames_written,
            pipeline: Some(stats),
        })
    }
}
