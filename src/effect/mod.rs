pub mod cpu;
pub mod plan;

use image::RgbImage;

use crate::foundation::error::{BlarpError, BlarpResult};
use plan::PassTrace;

/// Host-side copy of a rendered RGBA8 buffer.
///
/// Rows may be padded (`bytes_per_row >= width * 4`); GPU readbacks keep the copy alignment
/// so that stripping it can happen off the render thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbaReadback {
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
    pub data: Vec<u8>,
}

impl RgbaReadback {
    pub fn from_rgb_image(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            bytes_per_row: width * 4,
            data: rgb_to_rgba8(image.as_raw()),
        }
    }

    /// Drop row padding and alpha, producing a tight 3-channel image.
    pub fn into_rgb_image(self) -> BlarpResult<RgbImage> {
        let row_bytes = (self.width as usize) * 4;
        let stride = self.bytes_per_row as usize;
        if stride < row_bytes {
            return Err(BlarpError::validation(format!(
                "readback stride {stride} is smaller than row size {row_bytes}"
            )));
        }
        let expected = stride * self.height as usize;
        if self.data.len() < expected {
            return Err(BlarpError::validation(format!(
                "readback has {} bytes, expected at least {expected}",
                self.data.len()
            )));
        }

        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3);
        for row in self.data.chunks_exact(stride).take(self.height as usize) {
            for px in row[..row_bytes].chunks_exact(4) {
                out.extend_from_slice(&px[..3]);
            }
        }
        RgbImage::from_raw(self.width, self.height, out)
            .ok_or_else(|| BlarpError::validation("readback does not fit an rgb image"))
    }
}

/// Expand tight RGB8 pixels to opaque RGBA8.
pub fn rgb_to_rgba8(rgb: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
    out
}

/// Something that can blarp an image.
///
/// `render` is the round trip used by the frame pipeline; `apply` is the one-shot form that
/// also strips the readback into a 3-channel image.
pub trait BlarpBackend {
    fn render(&mut self, image: &RgbImage, iterations: u32) -> BlarpResult<RgbaReadback>;

    fn apply(&mut self, image: &RgbImage, iterations: u32) -> BlarpResult<RgbImage> {
        self.render(image, iterations)?.into_rgb_image()
    }

    /// Passes executed by the most recent successful render.
    fn last_trace(&self) -> Option<&PassTrace>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Gpu,
    Cpu,
}

pub(crate) fn validate_source(image: &RgbImage) -> BlarpResult<()> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Err(BlarpError::validation(
            "blarp source image must have non-zero width and height",
        ));
    }
    Ok(())
}
