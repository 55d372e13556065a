use std::collections::BTreeMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

use image::RgbImage;

use crate::encode::sink::{FrameSink, SinkConfig};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{BlarpError, BlarpResult};
use crate::pipeline::progress::Progress;

/// Default size of the writer pool.
pub const DEFAULT_WORKERS: usize = 5;

/// Options for [`FramePipeline`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineOpts {
    /// Threads preparing frames for the sink.
    pub workers: usize,
    /// Frames submitted but not yet written before `submit` blocks.
    ///
    /// Defaults to `workers`.
    pub max_in_flight: usize,
    /// Expected number of frames, used only for progress reporting.
    pub expected_frames: Option<u64>,
}

impl Default for PipelineOpts {
    fn default() -> Self {
        Self::with_workers(DEFAULT_WORKERS)
    }
}

impl PipelineOpts {
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            max_in_flight: workers,
            expected_frames: None,
        }
    }
}

/// Counters collected while the pipeline runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_written: u64,
    /// Highest number of frames submitted but not yet written.
    pub peak_in_flight: usize,
    /// Highest number of prepared frames parked while waiting for an earlier index.
    pub peak_reorder_depth: usize,
}

struct Queue {
    /// Next index to hand to the sink.
    next: u64,
    /// Next index `submit` accepts.
    submitted: u64,
    /// Spawned tasks that have not completed yet.
    running: usize,
    pending: BTreeMap<u64, RgbImage>,
    draining: bool,
    failure: Option<BlarpError>,
    stats: PipelineStats,
    progress: Progress,
}

impl Queue {
    fn outstanding(&self) -> usize {
        (self.submitted - self.next) as usize
    }

    fn fail(&mut self, err: BlarpError) {
        if self.failure.is_none() {
            tracing::debug!(error = %err, "frame pipeline failed");
            self.failure = Some(err);
        }
        self.pending.clear();
    }
}

struct Shared<S> {
    queue: Mutex<Queue>,
    cond: Condvar,
    sink: Mutex<Option<S>>,
}

/// Ordered writer stage for video modes.
///
/// Rendering happens on the caller's thread; each submitted frame is finished on a bounded
/// rayon pool and then handed to the sink strictly in index order, whatever order the
/// workers complete in. `submit` blocks while `max_in_flight` frames are unwritten.
pub struct FramePipeline<S: FrameSink + 'static> {
    pool: rayon::ThreadPool,
    shared: Arc<Shared<S>>,
    max_in_flight: usize,
}

impl<S: FrameSink + 'static> FramePipeline<S> {
    /// Start `sink` with `cfg` and spin up the writer pool.
    pub fn new(mut sink: S, cfg: SinkConfig, opts: PipelineOpts) -> BlarpResult<Self> {
        if opts.workers == 0 {
            return Err(BlarpError::validation("frame pipeline needs at least 1 worker"));
        }
        if opts.max_in_flight == 0 {
            return Err(BlarpError::validation(
                "frame pipeline max_in_flight must be >= 1",
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(opts.workers)
            .thread_name(|i| format!("blarp-writer-{i}"))
            .build()
            .map_err(|e| BlarpError::pipeline(format!("failed to build writer pool: {e}")))?;

        sink.begin(cfg)?;

        Ok(Self {
            pool,
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    next: 0,
                    submitted: 0,
                    running: 0,
                    pending: BTreeMap::new(),
                    draining: false,
                    failure: None,
                    stats: PipelineStats::default(),
                    progress: Progress::new("writing frames", opts.expected_frames),
                }),
                cond: Condvar::new(),
                sink: Mutex::new(Some(sink)),
            }),
            max_in_flight: opts.max_in_flight,
        })
    }

    /// Submit an already prepared frame.
    pub fn submit(&self, idx: FrameIndex, frame: RgbImage) -> BlarpResult<()> {
        self.submit_with(idx, move || Ok(frame))
    }

    /// Submit frame `idx`, produced by `prepare` on a writer thread.
    ///
    /// Indices must start at 0 and increase by one per call. Fails fast once any earlier
    /// frame failed to prepare or write.
    pub fn submit_with<F>(&self, idx: FrameIndex, prepare: F) -> BlarpResult<()>
    where
        F: FnOnce() -> BlarpResult<RgbImage> + Send + 'static,
    {
        let mut q = lock(&self.shared.queue);
        if idx.0 != q.submitted {
            return Err(BlarpError::pipeline(format!(
                "frame {} submitted out of sequence (expected {})",
                idx.0, q.submitted
            )));
        }

        while q.failure.is_none() && q.outstanding() >= self.max_in_flight {
            q = self
                .shared
                .cond
                .wait(q)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        if let Some(err) = q.failure.as_ref() {
            return Err(BlarpError::pipeline(format!(
                "frame pipeline already failed: {err}"
            )));
        }

        q.submitted += 1;
        q.running += 1;
        let outstanding = q.outstanding();
        q.stats.peak_in_flight = q.stats.peak_in_flight.max(outstanding);
        drop(q);

        let shared = Arc::clone(&self.shared);
        self.pool.spawn(move || {
            let result = prepare();
            complete(&shared, idx.0, result);
        });
        Ok(())
    }

    /// Wait for every submitted frame to reach the sink, end the sink and hand it back.
    pub fn finish(self) -> BlarpResult<(S, PipelineStats)> {
        let mut q = lock(&self.shared.queue);
        while q.running > 0 {
            q = self
                .shared
                .cond
                .wait(q)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        if let Some(err) = q.failure.take() {
            return Err(err);
        }
        if q.next != q.submitted {
            return Err(BlarpError::pipeline(format!(
                "frame pipeline stalled: wrote {} of {} frames",
                q.next, q.submitted
            )));
        }
        let stats = q.stats;
        drop(q);

        let mut sink = lock(&self.shared.sink)
            .take()
            .ok_or_else(|| BlarpError::pipeline("frame pipeline sink already taken"))?;
        sink.end()?;
        Ok((sink, stats))
    }
}

impl<S: FrameSink + 'static> Drop for FramePipeline<S> {
    /// Abandons a pipeline that was not finished: parked and late frames are discarded, and
    /// the sink is dropped only after every worker has returned.
    fn drop(&mut self) {
        let mut q = lock(&self.shared.queue);
        if q.running == 0 && q.failure.is_none() && q.next == q.submitted {
            return;
        }
        q.fail(BlarpError::pipeline("frame pipeline dropped before finish"));
        while q.running > 0 {
            q = self
                .shared
                .cond
                .wait(q)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        drop(q);
        drop(lock(&self.shared.sink).take());
    }
}

fn complete<S: FrameSink>(shared: &Shared<S>, idx: u64, result: BlarpResult<RgbImage>) {
    let mut q = lock(&shared.queue);
    match result {
        Ok(frame) if q.failure.is_none() => {
            q.pending.insert(idx, frame);
            q.stats.peak_reorder_depth = q.stats.peak_reorder_depth.max(q.pending.len() - 1);
        }
        Ok(_) => {}
        Err(err) => q.fail(err),
    }

    // Only one worker drains at a time; the others just park their frame.
    if !q.draining {
        q.draining = true;
        loop {
            let next = q.next;
            let Some(frame) = q.pending.remove(&next) else {
                break;
            };
            drop(q);

            let written = match lock(&shared.sink).as_mut() {
                Some(sink) => sink.push_frame(FrameIndex(next), &frame),
                None => Err(BlarpError::pipeline("frame pipeline sink already taken")),
            };

            q = lock(&shared.queue);
            match written {
                Ok(()) => {
                    q.next += 1;
                    q.stats.frames_written += 1;
                    q.progress.advance();
                }
                Err(err) => q.fail(err),
            }
            shared.cond.notify_all();
        }
        q.draining = false;
    }

    q.running -= 1;
    drop(q);
    shared.cond.notify_all();
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
