//! Encoding sinks.
//!
//! Sinks consume blarped frames in sequence order and append them to an output container.

/// `ffmpeg`-based video container output.
pub mod ffmpeg;
/// Generic frame sink trait and built-in sinks.
pub mod sink;
