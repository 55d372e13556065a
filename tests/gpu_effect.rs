use blarp::{BlarpBackend, CpuEffect, EffectEngine, GraphicsContext, Slot};
use image::{Rgb, RgbImage};

fn context() -> Option<GraphicsContext> {
    match GraphicsContext::initialize() {
        Ok(ctx) => Some(ctx),
        Err(e) if e.to_string().contains("no gpu adapter available") => None,
        Err(e) => panic!("gpu init failed: {e}"),
    }
}

fn gradient(w: u32, h: u32) -> RgbImage {
    RgbImage::from_fn(w, h, |x, y| {
        Rgb([(x * 29 % 256) as u8, (y * 47 % 256) as u8, ((x * y) % 256) as u8])
    })
}

fn max_channel_diff(a: &RgbImage, b: &RgbImage) -> u8 {
    a.as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(x, y)| x.abs_diff(*y))
        .max()
        .unwrap_or(0)
}

#[test]
fn one_pass_reads_back_the_source_from_a() {
    let Some(ctx) = context() else { return };
    let mut engine = EffectEngine::new(&ctx);

    let img = gradient(9, 7);
    let out = engine.apply(&img, 1).unwrap();
    assert_eq!(out, img);

    let trace = engine.last_trace().unwrap();
    assert_eq!(trace.steps.len(), 1);
    assert_eq!(trace.read_back_from, Slot::A);
    assert_eq!(trace.last_written(), Some(Slot::B));
    assert_eq!(ctx.live_targets(), 0);
}

#[test]
fn two_passes_read_back_from_b() {
    let Some(ctx) = context() else { return };
    let mut engine = EffectEngine::new(&ctx);

    let img = RgbImage::from_pixel(4, 4, Rgb([200, 40, 90]));
    let out = engine.apply(&img, 2).unwrap();
    assert!(max_channel_diff(&out, &img) <= 1);

    let trace = engine.last_trace().unwrap();
    assert_eq!(trace.steps[0].write, Slot::B);
    assert_eq!(trace.steps[1].read, Slot::B);
    assert_eq!(trace.read_back_from, Slot::B);
    assert_eq!(trace.last_written(), Some(Slot::A));
}

#[test]
fn apply_is_deterministic_and_leaves_no_targets() {
    let Some(ctx) = context() else { return };
    let mut engine = EffectEngine::new(&ctx);
    let img = gradient(33, 17);

    for n in [0, 1, 2, 5, 12] {
        let first = engine.apply(&img, n).unwrap();
        let second = engine.apply(&img, n).unwrap();
        assert_eq!(first, second, "n={n}");
        assert_eq!(first.dimensions(), img.dimensions());
        assert_eq!(ctx.live_targets(), 0, "n={n}");
    }
    assert_eq!(engine.apply(&img, 0).unwrap(), img);
}

#[test]
fn failed_apply_leaves_no_targets() {
    let Some(ctx) = context() else { return };
    let mut engine = EffectEngine::new(&ctx);
    assert!(engine.apply(&RgbImage::new(0, 3), 3).is_err());
    assert_eq!(ctx.live_targets(), 0);

    let too_wide = RgbImage::new(100_000, 1);
    assert!(engine.apply(&too_wide, 1).is_err());
    assert_eq!(ctx.live_targets(), 0);
}

#[test]
fn gpu_tracks_the_cpu_reference() {
    let Some(ctx) = context() else { return };
    let mut engine = EffectEngine::new(&ctx);
    let mut cpu = CpuEffect::new();
    let img = gradient(24, 16);

    // Filtering precision differs between GPUs and sharpen amplifies it.
    for (n, tolerance) in [(2, 2), (3, 8)] {
        let gpu = engine.apply(&img, n).unwrap();
        let reference = cpu.apply(&img, n).unwrap();
        let diff = max_channel_diff(&gpu, &reference);
        assert!(diff <= tolerance, "n={n} diff={diff}");
    }
}

#[test]
fn released_context_rejects_apply() {
    let Some(mut ctx) = context() else { return };
    ctx.release();
    ctx.release();
    assert!(ctx.is_released());

    let mut engine = EffectEngine::new(&ctx);
    let err = engine.apply(&gradient(4, 4), 1).unwrap_err();
    assert!(err.to_string().contains("released"), "{err}");
}
