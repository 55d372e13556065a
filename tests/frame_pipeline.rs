use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use blarp::media::decode::VecFrameSource;
use blarp::pipeline::jobs::{accumulating_jobs, drive, per_frame_jobs};
use blarp::{
    BlarpError, BlarpResult, CpuEffect, Fps, FrameIndex, FramePipeline, FrameSink, InMemorySink,
    PipelineOpts, SinkConfig,
};
use image::{Rgb, RgbImage};

/// Records the order and time at which frames arrive.
#[derive(Clone, Default)]
struct RecordingSink {
    log: Arc<Mutex<Vec<(u64, Instant)>>>,
}

impl FrameSink for RecordingSink {
    fn begin(&mut self, _cfg: SinkConfig) -> BlarpResult<()> {
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, _frame: &RgbImage) -> BlarpResult<()> {
        self.log.lock().unwrap().push((idx.0, Instant::now()));
        Ok(())
    }

    fn end(&mut self) -> BlarpResult<()> {
        Ok(())
    }
}

fn cfg(width: u32, height: u32) -> SinkConfig {
    SinkConfig {
        width,
        height,
        fps: Fps::integer(30).unwrap(),
    }
}

fn tagged(v: u8) -> RgbImage {
    RgbImage::from_pixel(2, 2, Rgb([v, 0, 0]))
}

#[test]
fn writes_stay_in_index_order_when_later_frames_finish_first() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    const N: u64 = 24;
    let sink = RecordingSink::default();
    let log = Arc::clone(&sink.log);
    let opts = PipelineOpts {
        workers: 4,
        max_in_flight: 6,
        expected_frames: Some(N),
    };
    let pipeline = FramePipeline::new(sink, cfg(2, 2), opts).unwrap();

    for i in 0..N {
        // Earlier frames take longer, so workers complete in roughly reverse order.
        let delay = Duration::from_millis((N - i) % 6 * 4);
        pipeline
            .submit_with(FrameIndex(i), move || {
                std::thread::sleep(delay);
                Ok(tagged(i as u8))
            })
            .unwrap();
    }
    let (_, stats) = pipeline.finish().unwrap();

    let log = log.lock().unwrap();
    let order: Vec<u64> = log.iter().map(|(idx, _)| *idx).collect();
    assert_eq!(order, (0..N).collect::<Vec<_>>());
    assert!(log.windows(2).all(|w| w[0].1 <= w[1].1));
    assert_eq!(stats.frames_written, N);
}

#[test]
fn in_flight_frames_never_exceed_the_bound() {
    let opts = PipelineOpts {
        workers: 2,
        max_in_flight: 3,
        expected_frames: None,
    };
    let pipeline = FramePipeline::new(InMemorySink::new(), cfg(2, 2), opts).unwrap();
    for i in 0..30u64 {
        pipeline
            .submit_with(FrameIndex(i), move || {
                std::thread::sleep(Duration::from_millis(1));
                Ok(tagged(i as u8))
            })
            .unwrap();
    }
    let (sink, stats) = pipeline.finish().unwrap();

    assert!(stats.peak_in_flight >= 1);
    assert!(stats.peak_in_flight <= 3, "peak {}", stats.peak_in_flight);
    assert_eq!(sink.frames().len(), 30);
    for (n, (idx, img)) in sink.frames().iter().enumerate() {
        assert_eq!(idx.0, n as u64);
        assert_eq!(img.get_pixel(0, 0)[0], n as u8);
    }
}

#[test]
fn a_failed_frame_stops_the_run_and_surfaces() {
    let sink = RecordingSink::default();
    let log = Arc::clone(&sink.log);
    let pipeline =
        FramePipeline::new(sink, cfg(2, 2), PipelineOpts::with_workers(2)).unwrap();

    let mut submit_err = None;
    for i in 0..50u64 {
        let res = pipeline.submit_with(FrameIndex(i), move || {
            if i == 3 {
                Err(BlarpError::media("frame 3 is corrupt"))
            } else {
                Ok(tagged(i as u8))
            }
        });
        if let Err(e) = res {
            submit_err = Some(e);
            break;
        }
    }

    let finish_err = pipeline.finish().err();
    let err = finish_err.or(submit_err).unwrap();
    assert!(err.to_string().contains("frame 3 is corrupt"), "{err}");

    // Nothing at or after the failed index reaches the sink.
    let written: Vec<u64> = log.lock().unwrap().iter().map(|(i, _)| *i).collect();
    assert!(written.iter().all(|&i| i < 3), "{written:?}");
    assert_eq!(written, (0..written.len() as u64).collect::<Vec<_>>());
}

#[test]
fn accumulating_run_renders_one_pass_deeper_per_frame() {
    let img = RgbImage::from_fn(6, 4, |x, y| Rgb([(x * 40) as u8, (y * 60) as u8, 128]));
    let pipeline =
        FramePipeline::new(InMemorySink::new(), cfg(6, 4), PipelineOpts::with_workers(3)).unwrap();

    let mut backend = CpuEffect::new();
    let submitted = drive(&mut backend, accumulating_jobs(&img, 5), &pipeline, Some(5)).unwrap();
    let (sink, _) = pipeline.finish().unwrap();
    assert_eq!(submitted, 5);

    let mut reference = CpuEffect::new();
    for (i, (idx, frame)) in sink.frames().iter().enumerate() {
        assert_eq!(idx.0, i as u64);
        let expected = blarp::BlarpBackend::apply(&mut reference, &img, i as u32 + 1).unwrap();
        assert_eq!(frame, &expected, "frame {i}");
    }
}

#[test]
fn frame_cap_limits_a_longer_source() {
    let frames: Vec<RgbImage> = (0..100u32)
        .map(|i| RgbImage::from_pixel(4, 4, Rgb([i as u8, 0, 0])))
        .collect();
    let mut source = VecFrameSource::new(frames).unwrap();
    let pipeline =
        FramePipeline::new(InMemorySink::new(), cfg(4, 4), PipelineOpts::default()).unwrap();

    let mut backend = CpuEffect::new();
    let jobs = per_frame_jobs(&mut source, 2, Some(10));
    let submitted = drive(&mut backend, jobs, &pipeline, Some(10)).unwrap();
    let (sink, stats) = pipeline.finish().unwrap();

    assert_eq!(submitted, 10);
    assert_eq!(stats.frames_written, 10);
    assert_eq!(sink.frames().len(), 10);
    // A solid frame is a fixed point, so each output still carries its source tag.
    for (i, (_, frame)) in sink.frames().iter().enumerate() {
        assert_eq!(frame.get_pixel(1, 1)[0], i as u8);
    }
}

#[test]
fn short_source_ends_the_run_early() {
    let frames = vec![RgbImage::new(3, 3); 4];
    let mut source = VecFrameSource::new(frames).unwrap();
    let pipeline =
        FramePipeline::new(InMemorySink::new(), cfg(3, 3), PipelineOpts::default()).unwrap();

    let mut backend = CpuEffect::new();
    let jobs = per_frame_jobs(&mut source, 1, Some(10));
    assert_eq!(drive(&mut backend, jobs, &pipeline, None).unwrap(), 4);
    let (sink, _) = pipeline.finish().unwrap();
    assert_eq!(sink.frames().len(), 4);
}
