use image::RgbImage;
use rayon::prelude::*;

use crate::{
    effect::{
        BlarpBackend, RgbaReadback,
        plan::{
            BLUR_CENTER_WEIGHT, BLUR_SIDE_OFFSET, BLUR_SIDE_WEIGHT, BlurDirection, PassPlan,
            PassState, PassTrace, SHARPEN_STRENGTH, Slot,
        },
        rgb_to_rgba8, validate_source,
    },
    foundation::error::BlarpResult,
};

/// Reference renderer running the same pass graph on the CPU.
///
/// Mirrors the GPU render targets: RGBA8 storage between passes, bilinear sampling with
/// repeat addressing, and round-to-nearest quantization after every pass.
#[derive(Debug, Default)]
pub struct CpuEffect {
    last_trace: Option<PassTrace>,
}

impl CpuEffect {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlarpBackend for CpuEffect {
    #[tracing::instrument(skip(self, image), fields(w = image.width(), h = image.height()))]
    fn render(&mut self, image: &RgbImage, iterations: u32) -> BlarpResult<RgbaReadback> {
        validate_source(image)?;
        let (width, height) = image.dimensions();
        let plan = PassPlan::new(iterations);

        let mut a = rgb_to_rgba8(image.as_raw());
        let mut b = vec![0u8; a.len()];
        for step in plan.steps() {
            match step.state {
                PassState::Blur(dir) => blur_pass(&a, &mut b, width, height, dir),
                PassState::Sharpen => sharpen_pass(&b, &mut a, width, height),
            }
        }

        let final_slot = plan.final_slot();
        self.last_trace = Some(PassTrace {
            steps: plan.steps().collect(),
            read_back_from: final_slot,
        });

        let data = match final_slot {
            Slot::A => a,
            Slot::B => b,
        };
        Ok(RgbaReadback {
            width,
            height,
            bytes_per_row: width * 4,
            data,
        })
    }

    fn last_trace(&self) -> Option<&PassTrace> {
        self.last_trace.as_ref()
    }
}

fn blur_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32, dir: BlurDirection) {
    let [dx, dy] = dir.vector();
    let (ox, oy) = (dx * BLUR_SIDE_OFFSET, dy * BLUR_SIDE_OFFSET);
    let row_bytes = width as usize * 4;

    dst.par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width as usize {
                let (fx, fy) = (x as f32, y as f32);
                let c = sample_bilinear(src, width, height, fx, fy);
                let p = sample_bilinear(src, width, height, fx + ox, fy + oy);
                let m = sample_bilinear(src, width, height, fx - ox, fy - oy);
                for ch in 0..4 {
                    let v = c[ch] * BLUR_CENTER_WEIGHT
                        + p[ch] * BLUR_SIDE_WEIGHT
                        + m[ch] * BLUR_SIDE_WEIGHT;
                    row[x * 4 + ch] = quantize(v);
                }
            }
        });
}

fn sharpen_pass(src: &[u8], dst: &mut [u8], width: u32, height: u32) {
    let a = SHARPEN_STRENGTH;
    let row_bytes = width as usize * 4;
    let w = i64::from(width);

    dst.par_chunks_exact_mut(row_bytes)
        .enumerate()
        .for_each(|(y, row)| {
            let y = y as i64;
            for x in 0..w {
                let center = texel(src, width, height, x, y);
                let up = texel(src, width, height, x, y - 1);
                let down = texel(src, width, height, x, y + 1);
                let left = texel(src, width, height, x - 1, y);
                let right = texel(src, width, height, x + 1, y);
                for ch in 0..4 {
                    let v = (4.0 * a + 1.0) * center[ch]
                        - a * (up[ch] + down[ch] + left[ch] + right[ch]);
                    row[x as usize * 4 + ch] = quantize(v);
                }
            }
        });
}

/// Fetch one texel as normalized floats, wrapping out-of-range coordinates.
fn texel(buf: &[u8], width: u32, height: u32, x: i64, y: i64) -> [f32; 4] {
    let xi = x.rem_euclid(i64::from(width)) as usize;
    let yi = y.rem_euclid(i64::from(height)) as usize;
    let idx = (yi * width as usize + xi) * 4;
    [
        f32::from(buf[idx]) / 255.0,
        f32::from(buf[idx + 1]) / 255.0,
        f32::from(buf[idx + 2]) / 255.0,
        f32::from(buf[idx + 3]) / 255.0,
    ]
}

/// Bilinear sample at texel-space coordinates where integers are texel centers.
fn sample_bilinear(buf: &[u8], width: u32, height: u32, fx: f32, fy: f32) -> [f32; 4] {
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let c00 = texel(buf, width, height, x0, y0);
    let c10 = texel(buf, width, height, x0 + 1, y0);
    let c01 = texel(buf, width, height, x0, y0 + 1);
    let c11 = texel(buf, width, height, x0 + 1, y0 + 1);

    let mut out = [0.0f32; 4];
    for ch in 0..4 {
        let top = c00[ch] + (c10[ch] - c00[ch]) * tx;
        let bottom = c01[ch] + (c11[ch] - c01[ch]) * tx;
        out[ch] = top + (bottom - top) * ty;
    }
    out
}

fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 37 % 256) as u8, (y * 53 % 256) as u8, ((x + y) * 11 % 256) as u8])
        })
    }

    #[test]
    fn zero_iterations_returns_input_unchanged() {
        let img = gradient(5, 3);
        let mut cpu = CpuEffect::new();
        let out = cpu.apply(&img, 0).unwrap();
        assert_eq!(out, img);
        assert_eq!(cpu.last_trace().unwrap().read_back_from, Slot::A);
        assert!(cpu.last_trace().unwrap().steps.is_empty());
    }

    #[test]
    fn one_iteration_reads_back_the_untouched_source() {
        let img = gradient(7, 5);
        let mut cpu = CpuEffect::new();
        let out = cpu.apply(&img, 1).unwrap();
        assert_eq!(out, img);

        let trace = cpu.last_trace().unwrap();
        assert_eq!(trace.steps.len(), 1);
        assert_eq!(trace.read_back_from, Slot::A);
        assert_eq!(trace.last_written(), Some(Slot::B));
    }

    #[test]
    fn solid_image_is_a_fixed_point() {
        let img = RgbImage::from_pixel(6, 5, Rgb([17, 128, 250]));
        let mut cpu = CpuEffect::new();
        for n in [2, 9, 10] {
            assert_eq!(cpu.apply(&img, n).unwrap(), img, "n={n}");
        }
    }

    #[test]
    fn two_iterations_read_back_blurred_buffer_b() {
        let img = gradient(8, 8);
        let mut cpu = CpuEffect::new();
        let out = cpu.render(&img, 2).unwrap();
        let trace = cpu.last_trace().unwrap();
        assert_eq!(trace.steps[0].write, Slot::B);
        assert_eq!(trace.steps[1].read, Slot::B);
        assert_eq!(trace.steps[1].write, Slot::A);
        assert_eq!(trace.read_back_from, Slot::B);

        let mut blurred = vec![0u8; 8 * 8 * 4];
        blur_pass(&rgb_to_rgba8(img.as_raw()), &mut blurred, 8, 8, BlurDirection::Horizontal);
        assert_eq!(out.data, blurred);
    }

    #[test]
    fn three_iterations_read_back_sharpened_buffer_a() {
        let img = gradient(8, 8);
        let mut cpu = CpuEffect::new();
        let out = cpu.render(&img, 3).unwrap();
        assert_eq!(cpu.last_trace().unwrap().read_back_from, Slot::A);

        let mut blurred = vec![0u8; 8 * 8 * 4];
        blur_pass(&rgb_to_rgba8(img.as_raw()), &mut blurred, 8, 8, BlurDirection::Horizontal);
        let mut sharpened = vec![0u8; blurred.len()];
        sharpen_pass(&blurred, &mut sharpened, 8, 8);
        assert_eq!(out.data, sharpened);
    }

    #[test]
    fn horizontal_blur_spreads_a_bright_column() {
        let mut img = RgbImage::from_pixel(8, 2, Rgb([0, 0, 0]));
        for y in 0..2 {
            img.put_pixel(4, y, Rgb([255, 255, 255]));
        }
        let mut cpu = CpuEffect::new();
        // Two iterations read back the first blur.
        let out = cpu.apply(&img, 2).unwrap();
        assert!(out.get_pixel(3, 0)[0] > 0);
        assert!(out.get_pixel(5, 0)[0] > 0);
        assert!(out.get_pixel(4, 0)[0] < 255);
        // Rows stay identical because nothing mixes vertically.
        assert_eq!(out.get_pixel(3, 0), out.get_pixel(3, 1));
    }

    #[test]
    fn sharpen_boosts_an_isolated_peak() {
        let center = 100u8;
        let src = {
            let mut buf = vec![0u8; 3 * 3 * 4];
            for px in buf.chunks_exact_mut(4) {
                px.copy_from_slice(&[50, 50, 50, 255]);
            }
            buf[4 * 4..4 * 4 + 4].copy_from_slice(&[center, center, center, 255]);
            buf
        };
        let mut dst = vec![0u8; src.len()];
        sharpen_pass(&src, &mut dst, 3, 3);

        let expected = ((4.0 * SHARPEN_STRENGTH + 1.0) * 100.0 - SHARPEN_STRENGTH * 200.0)
            .round()
            .min(255.0) as u8;
        assert_eq!(dst[4 * 4], expected);
        assert_eq!(dst[4 * 4 + 3], 255);
    }

    #[test]
    fn render_is_deterministic() {
        let img = gradient(16, 9);
        let mut cpu = CpuEffect::new();
        let first = cpu.render(&img, 7).unwrap();
        let second = cpu.render(&img, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_image_is_rejected() {
        let mut cpu = CpuEffect::new();
        assert!(cpu.render(&RgbImage::new(0, 4), 1).is_err());
    }
}
