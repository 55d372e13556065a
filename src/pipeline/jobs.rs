use std::borrow::Cow;

use image::RgbImage;

use crate::effect::BlarpBackend;
use crate::encode::sink::FrameSink;
use crate::foundation::core::FrameIndex;
use crate::foundation::error::BlarpResult;
use crate::media::decode::FrameSource;
use crate::pipeline::frame_pipeline::FramePipeline;
use crate::pipeline::progress::Progress;

/// One unit of work: render `source` with `iterations` passes as output frame `index`.
#[derive(Debug, Clone)]
pub struct FrameJob<'a> {
    pub index: FrameIndex,
    pub source: Cow<'a, RgbImage>,
    pub iterations: u32,
}

/// Jobs for image→video: `count` frames of the same image, frame `i` with `i + 1` passes.
pub fn accumulating_jobs(
    image: &RgbImage,
    count: u32,
) -> impl Iterator<Item = BlarpResult<FrameJob<'_>>> {
    (0..count).map(move |i| {
        Ok(FrameJob {
            index: FrameIndex(u64::from(i)),
            source: Cow::Borrowed(image),
            iterations: i + 1,
        })
    })
}

/// Jobs for video→video: one per decoded frame, each with the same pass count.
///
/// Stops at `cap` frames or when the source runs dry, whichever comes first. A decode
/// error is yielded once and ends the sequence.
pub fn per_frame_jobs<'a>(
    source: &'a mut dyn FrameSource,
    iterations: u32,
    cap: Option<u64>,
) -> PerFrameJobs<'a> {
    PerFrameJobs {
        source,
        iterations,
        cap,
        next: 0,
        done: false,
    }
}

pub struct PerFrameJobs<'a> {
    source: &'a mut dyn FrameSource,
    iterations: u32,
    cap: Option<u64>,
    next: u64,
    done: bool,
}

impl<'a> Iterator for PerFrameJobs<'a> {
    type Item = BlarpResult<FrameJob<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.cap.is_some_and(|cap| self.next >= cap) {
            return None;
        }
        match self.source.next_frame() {
            Ok(Some(frame)) => {
                let index = FrameIndex(self.next);
                self.next += 1;
                Some(Ok(FrameJob {
                    index,
                    source: Cow::Owned(frame),
                    iterations: self.iterations,
                }))
            }
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Render every job on the calling thread and hand the results to `pipeline`.
///
/// Returns the number of frames submitted. Readback conversion runs on the writer pool.
pub fn drive<'a, B, S, I>(
    backend: &mut B,
    jobs: I,
    pipeline: &FramePipeline<S>,
    expected_frames: Option<u64>,
) -> BlarpResult<u64>
where
    B: BlarpBackend + ?Sized,
    S: FrameSink + 'static,
    I: IntoIterator<Item = BlarpResult<FrameJob<'a>>>,
{
    let mut progress = Progress::new("generating frames", expected_frames);
    for job in jobs {
        let job = job?;
        let readback = backend.render(&job.source, job.iterations)?;
        pipeline.submit_with(job.index, move || readback.into_rgb_image())?;
        progress.advance();
    }
    Ok(progress.done())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulating_jobs_deepen_by_one_pass_per_frame() {
        let img = RgbImage::new(2, 2);
        let jobs: Vec<_> = accumulating_jobs(&img, 5).map(Result::unwrap).collect();
        assert_eq!(jobs.len(), 5);
        assert_eq!(jobs[0].iterations, 1);
        for pair in jobs.windows(2) {
            assert_eq!(pair[1].iterations, pair[0].iterations + 1);
            assert_eq!(pair[1].index, pair[0].index.next());
        }
        assert!(jobs.iter().all(|j| matches!(j.source, Cow::Borrowed(_))));
    }

    #[test]
    fn zero_count_yields_no_jobs() {
        let img = RgbImage::new(1, 1);
        assert_eq!(accumulating_jobs(&img, 0).count(), 0);
    }
}
