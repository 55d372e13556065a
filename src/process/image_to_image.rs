use crate::effect::BlarpBackend;
use crate::foundation::error::BlarpResult;
use crate::media::image_io::{load_rgb, save_rgb};
use crate::process::{Mode, Processor, RunOpts, RunSummary};

/// Blarp one image into another image.
#[derive(Debug, Clone)]
pub struct ImageToImage {
    opts: RunOpts,
}

impl ImageToImage {
    pub fn new(opts: RunOpts) -> Self {
        Self { opts }
    }
}

impl Processor for ImageToImage {
    fn mode(&self) -> Mode {
        Mode::ImageToImage
    }

    #[tracing::instrument(skip_all, fields(input = %self.opts.input.display(), n = self.opts.iterations))]
    fn run(&mut self, backend: &mut dyn BlarpBackend) -> BlarpResult<RunSummary> {
        let img = load_rgb(&self.opts.input)?;
        let result = backend.apply(&img, self.opts.iterations)?;
        save_rgb(&result, &self.opts.output)?;

        Ok(RunSummary {
            output: self.opts.output.clone(),
            frames: 1,
            pipeline: None,
        })
    }
}
