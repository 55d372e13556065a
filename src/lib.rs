//! Blarp blurs and sharpens images and videos a lot of times for interesting effects.
//!
//! The effect is a fixed ping-pong graph of alternating blur and sharpen passes run on the GPU:
//!
//! - Create one [`GraphicsContext`] per run and borrow it into an [`EffectEngine`]
//! - Call [`BlarpBackend::apply`] for single images
//! - Stream video frames through a [`FramePipeline`], which writes them in order into a
//!   [`FrameSink`]
//!
//! [`CpuEffect`] runs the same pass graph on the CPU for GPU-less runs and parity checks.
#![forbid(unsafe_code)]

mod foundation;

/// Pass graph and the backend seam.
pub mod effect;
/// Encoding sinks.
pub mod encode;
/// GPU context and engine.
pub mod gpu;
/// Image and video file I/O.
pub mod media;
/// Ordered frame production for the video modes.
pub mod pipeline;
/// Mode selection and the three processors.
pub mod process;

pub use crate::foundation::core::{Fps, FrameIndex};
pub use crate::foundation::error::{BlarpError, BlarpResult};

pub use crate::effect::cpu::CpuEffect;
pub use crate::effect::plan::{PassPlan, PassState, PassStep, PassTrace, Slot};
pub use crate::effect::{BackendKind, BlarpBackend, RgbaReadback};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::gpu::context::GraphicsContext;
pub use crate::gpu::engine::EffectEngine;
pub use crate::media::MediaKind;
pub use crate::pipeline::frame_pipeline::{FramePipeline, PipelineOpts, PipelineStats};
pub use crate::process::{Mode, Processor, RunOpts, RunSummary, processor_for};
