use std::path::{Path, PathBuf};

use crate::foundation::core::Fps;
use crate::foundation::error::{BlarpError, BlarpResult};

/// Properties of a source video as reported by `ffprobe`.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoSourceInfo {
    pub source_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Stream frame rate; `None` when ffprobe reports an unusable ratio such as `0/0`.
    pub fps: Option<Fps>,
    /// Container-reported frame count; absent for some containers.
    pub frame_count: Option<u64>,
    pub has_audio: bool,
}

#[derive(serde::Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    nb_frames: Option<String>,
}

#[derive(serde::Deserialize)]
struct ProbeOut {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

pub fn probe_video(source_path: &Path) -> BlarpResult<VideoSourceInfo> {
    if !source_path.is_file() {
        return Err(BlarpError::media(format!(
            "input video '{}' does not exist or is not a file",
            source_path.display()
        )));
    }

    let out = std::process::Command::new("ffprobe")
        .args(["-v", "error", "-print_format", "json", "-show_streams"])
        .arg(source_path)
        .output()
        .map_err(|e| BlarpError::media(format!("failed to run ffprobe: {e}")))?;
    if !out.status.success() {
        return Err(BlarpError::media(format!(
            "ffprobe failed for '{}': {}",
            source_path.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        )));
    }

    parse_probe_json(source_path, &out.stdout)
}

fn parse_probe_json(source_path: &Path, json: &[u8]) -> BlarpResult<VideoSourceInfo> {
    let parsed: ProbeOut = serde_json::from_slice(json)
        .map_err(|e| BlarpError::media(format!("ffprobe json parse failed: {e}")))?;
    let video_stream = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| BlarpError::media("no video stream found"))?;
    let width = video_stream
        .width
        .ok_or_else(|| BlarpError::media("missing video width from ffprobe"))?;
    let height = video_stream
        .height
        .ok_or_else(|| BlarpError::media("missing video height from ffprobe"))?;
    let fps = video_stream.r_frame_rate.as_deref().and_then(Fps::parse_ratio);
    let frame_count = video_stream
        .nb_frames
        .as_deref()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&n| n > 0);
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    Ok(VideoSourceInfo {
        source_path: source_path.to_path_buf(),
        width,
        height,
        fps,
        frame_count,
        has_audio,
    })
}
