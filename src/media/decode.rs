use std::collections::VecDeque;
use std::io::Read as _;
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use image::RgbImage;

use crate::foundation::error::{BlarpError, BlarpResult};
use crate::media::probe::VideoSourceInfo;

/// Sequential supplier of decoded frames, all of one size.
pub trait FrameSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Total frames if known up front.
    fn frame_count_hint(&self) -> Option<u64>;
    /// Next frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> BlarpResult<Option<RgbImage>>;
}

/// Frames held in memory.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    width: u32,
    height: u32,
    frames: VecDeque<RgbImage>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<RgbImage>) -> BlarpResult<Self> {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        if frames.iter().any(|f| f.dimensions() != (width, height)) {
            return Err(BlarpError::validation(
                "all frames of a source must share one size",
            ));
        }
        Ok(Self {
            width,
            height,
            frames: frames.into(),
        })
    }
}

impl FrameSource for VecFrameSource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn frame_count_hint(&self) -> Option<u64> {
        Some(self.frames.len() as u64)
    }

    fn next_frame(&mut self) -> BlarpResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// Streams `rgb24` frames out of a `ffmpeg` child process.
pub struct FfmpegFrameSource {
    info: VideoSourceInfo,
    child: Child,
    stdout: ChildStdout,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
    finished: bool,
}

impl FfmpegFrameSource {
    pub fn open(info: VideoSourceInfo) -> BlarpResult<Self> {
        if info.width == 0 || info.height == 0 {
            return Err(BlarpError::media(format!(
                "video '{}' reports a zero-sized frame",
                info.source_path.display()
            )));
        }

        let mut child = decode_command(&info.source_path)
            .spawn()
            .map_err(|e| BlarpError::media(format!("failed to run ffmpeg for video decode: {e}")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BlarpError::media("failed to open ffmpeg stdout (unexpected)"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| BlarpError::media("failed to open ffmpeg stderr (unexpected)"))?;
        let stderr_drain = std::thread::spawn(move || {
            let mut bytes = Vec::new();
            stderr.read_to_end(&mut bytes)?;
            Ok(bytes)
        });

        Ok(Self {
            info,
            child,
            stdout,
            stderr_drain: Some(stderr_drain),
            finished: false,
        })
    }

    pub fn info(&self) -> &VideoSourceInfo {
        &self.info
    }

    fn frame_len(&self) -> usize {
        self.info.width as usize * self.info.height as usize * 3
    }

    /// Reap the decoder once stdout hit EOF; a failed decode must not look like a short video.
    fn finish(&mut self) -> BlarpResult<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| BlarpError::media(format!("failed to wait for ffmpeg decode: {e}")))?;
        let stderr = match self.stderr_drain.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| BlarpError::media("ffmpeg stderr drain thread panicked"))?
                .unwrap_or_default(),
            None => Vec::new(),
        };
        if !status.success() {
            return Err(BlarpError::media(format!(
                "ffmpeg video decode failed for '{}': {}",
                self.info.source_path.display(),
                String::from_utf8_lossy(&stderr).trim()
            )));
        }
        Ok(())
    }
}

impl FrameSource for FfmpegFrameSource {
    fn width(&self) -> u32 {
        self.info.width
    }

    fn height(&self) -> u32 {
        self.info.height
    }

    fn frame_count_hint(&self) -> Option<u64> {
        self.info.frame_count
    }

    fn next_frame(&mut self) -> BlarpResult<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len()];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .stdout
                .read(&mut buf[filled..])
                .map_err(|e| BlarpError::media(format!("failed to read decoded frame: {e}")))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.finish()?;
            return Ok(None);
        }
        if filled < buf.len() {
            self.finish()?;
            return Err(BlarpError::media(format!(
                "truncated frame from ffmpeg: got {filled} of {} bytes",
                buf.len()
            )));
        }

        RgbImage::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or_else(|| BlarpError::media("decoded frame does not fit the probed size"))
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn decode_command(path: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-v", "error", "-nostdin", "-i"])
        .arg(path)
        .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_source_yields_frames_then_none() {
        let frames = vec![RgbImage::new(2, 2), RgbImage::new(2, 2)];
        let mut src = VecFrameSource::new(frames).unwrap();
        assert_eq!(src.frame_count_hint(), Some(2));
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn vec_source_rejects_mixed_sizes() {
        let frames = vec![RgbImage::new(2, 2), RgbImage::new(3, 2)];
        assert!(VecFrameSource::new(frames).is_err());
    }

    #[test]
    fn decode_command_maps_first_video_stream_to_rgb24() {
        let cmd = decode_command(Path::new("in.mov"));
        let args: Vec<_> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let joined = args.join(" ");
        assert!(joined.contains("-i in.mov"));
        assert!(joined.contains("-map 0:v:0 -f rawvideo -pix_fmt rgb24 pipe:1"));
    }
}
