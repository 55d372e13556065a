//! Frame production for the video modes.
//!
//! [`jobs`] turns a source into an ordered stream of [`jobs::FrameJob`]s and renders them one at
//! a time; [`frame_pipeline::FramePipeline`] finishes the rendered frames on a worker pool and
//! writes them to a sink in index order.

pub mod frame_pipeline;
pub mod jobs;
pub mod progress;
