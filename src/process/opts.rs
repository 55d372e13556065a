use std::path::PathBuf;

use crate::foundation::core::Fps;
use crate::foundation::error::{BlarpError, BlarpResult};
use crate::pipeline::frame_pipeline::DEFAULT_WORKERS;
use crate::process::mode::Mode;

pub const DEFAULT_ITERATIONS: u32 = 750;
pub const DEFAULT_FPS: u32 = 30;

/// Everything a processor needs to know about one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOpts {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Pass count for image→image and video→video; frame count for image→video.
    pub iterations: u32,
    /// Output frame rate of the video modes.
    pub fps: u32,
    /// Upper bound on frames taken from the source in video→video.
    pub max_frames: Option<u64>,
    /// Writer pool size.
    pub workers: usize,
}

impl RunOpts {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            iterations: DEFAULT_ITERATIONS,
            fps: DEFAULT_FPS,
            max_frames: None,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn validate(&self, mode: Mode) -> BlarpResult<()> {
        if self.fps == 0 {
            return Err(BlarpError::validation("fps must be > 0"));
        }
        if self.workers == 0 {
            return Err(BlarpError::validation("workers must be >= 1"));
        }
        if self.max_frames == Some(0) {
            return Err(BlarpError::validation("max-frames must be >= 1 when set"));
        }
        if self.max_frames.is_some() && mode != Mode::VideoToVideo {
            return Err(BlarpError::validation(format!(
                "max-frames only applies to video→video, not {mode}"
            )));
        }
        if mode == Mode::ImageToVideo && self.iterations == 0 {
            return Err(BlarpError::validation(
                "image→video needs num-blarp >= 1 (it is the frame count)",
            ));
        }
        Ok(())
    }

    pub fn output_fps(&self) -> BlarpResult<Fps> {
        Fps::integer(self.fps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> RunOpts {
        RunOpts::new("in.png", "out.mp4")
    }

    #[test]
    fn defaults_are_valid_for_every_mode() {
        for mode in [Mode::ImageToImage, Mode::ImageToVideo, Mode::VideoToVideo] {
            opts().validate(mode).unwrap();
        }
        assert_eq!(opts().iterations, 750);
        assert_eq!(opts().fps, 30);
        assert_eq!(opts().workers, 5);
    }

    #[test]
    fn zero_fps_and_workers_are_rejected() {
        let mut o = opts();
        o.fps = 0;
        assert!(o.validate(Mode::ImageToVideo).is_err());

        let mut o = opts();
        o.workers = 0;
        assert!(o.validate(Mode::VideoToVideo).is_err());
    }

    #[test]
    fn max_frames_is_video_to_video_only() {
        let mut o = opts();
        o.max_frames = Some(10);
        o.validate(Mode::VideoToVideo).unwrap();
        assert!(o.validate(Mode::ImageToVideo).is_err());

        o.max_frames = Some(0);
        assert!(o.validate(Mode::VideoToVideo).is_err());
    }

    #[test]
    fn zero_iterations_only_breaks_image_to_video() {
        let mut o = opts();
        o.iterations = 0;
        o.validate(Mode::ImageToImage).unwrap();
        o.validate(Mode::VideoToVideo).unwrap();
        assert!(o.validate(Mode::ImageToVideo).is_err());
    }
}
