use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::foundation::error::{BlarpError, BlarpResult};

/// Merges a freshly encoded video-only file with the audio of another file.
pub trait Remuxer {
    /// Write `output` from the video of `video_only` and the audio of `audio_source`.
    fn remux(&self, video_only: &Path, audio_source: &Path, output: &Path) -> BlarpResult<()>;
}

/// Remux through the system `ffmpeg` without re-encoding video.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegRemuxer;

impl FfmpegRemuxer {
    fn command(video_only: &Path, audio_source: &Path, output: &Path) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args(["-loglevel", "error", "-y", "-i"])
            .arg(video_only)
            .arg("-i")
            .arg(audio_source)
            .args([
                "-c:v",
                "copy",
                "-map",
                "0:v:0",
                "-map",
                "1:a:0",
                "-shortest",
            ])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Remuxer for FfmpegRemuxer {
    #[tracing::instrument(skip(self))]
    fn remux(&self, video_only: &Path, audio_source: &Path, output: &Path) -> BlarpResult<()> {
        let out = Self::command(video_only, audio_source, output)
            .output()
            .map_err(|e| BlarpError::media(format!("failed to run ffmpeg for audio remux: {e}")))?;
        if !out.status.success() {
            return Err(BlarpError::media(format!(
                "audio remux exited with status {}: {}",
                out.status,
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        Ok(())
    }
}

/// `<dir>/<stem>.video_only.<ext>` next to `output`.
pub fn intermediate_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!("{stem}.video_only.{}", ext.to_string_lossy()),
        None => format!("{stem}.video_only"),
    };
    output.with_file_name(name)
}

/// Move `from` to `to`, copying when a rename is not possible (e.g. across filesystems).
pub fn move_file(from: &Path, to: &Path) -> BlarpResult<()> {
    use anyhow::Context as _;
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)
        .with_context(|| format!("failed to move '{}' to '{}'", from.display(), to.display()))?;
    let _ = std::fs::remove_file(from);
    Ok(())
}

/// Removes the file it points at when dropped.
pub struct TempFileGuard(Option<PathBuf>);

impl TempFileGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Some(path.into()))
    }

    pub fn path(&self) -> Option<&Path> {
        self.0.as_deref()
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
