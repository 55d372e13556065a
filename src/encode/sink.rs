use image::RgbImage;

use crate::foundation::core::{Fps, FrameIndex};
use crate::foundation::error::{BlarpError, BlarpResult};

/// Configuration provided to a [`FrameSink`] before any frame is pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    pub fps: Fps,
}

/// Sink contract for consuming frames in sequence order.
///
/// Ordering contract: `push_frame` is called with strictly increasing, gap-free
/// `FrameIndex` values starting at 0.
pub trait FrameSink: Send {
    /// Called once before any frames are pushed.
    fn begin(&mut self, cfg: SinkConfig) -> BlarpResult<()>;
    /// Append one frame.
    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> BlarpResult<()>;
    /// Called once after the last frame is pushed.
    fn end(&mut self) -> BlarpResult<()>;
}

impl<S: FrameSink + ?Sized> FrameSink for Box<S> {
    fn begin(&mut self, cfg: SinkConfig) -> BlarpResult<()> {
        (**self).begin(cfg)
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> BlarpResult<()> {
        (**self).push_frame(idx, frame)
    }

    fn end(&mut self) -> BlarpResult<()> {
        (**self).end()
    }
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, RgbImage)>,
    ended: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<SinkConfig> {
        self.cfg
    }

    /// Frames in the order they were pushed.
    pub fn frames(&self) -> &[(FrameIndex, RgbImage)] {
        &self.frames
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> BlarpResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.ended = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &RgbImage) -> BlarpResult<()> {
        let cfg = self
            .cfg
            .ok_or_else(|| BlarpError::pipeline("in-memory sink not started"))?;
        if frame.dimensions() != (cfg.width, cfg.height) {
            return Err(BlarpError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width(),
                frame.height(),
                cfg.width,
                cfg.height
            )));
        }
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> BlarpResult<()> {
        self.ended = true;
        Ok(())
    }
}
