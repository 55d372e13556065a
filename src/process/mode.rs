use std::path::Path;

use crate::foundation::error::{BlarpError, BlarpResult};
use crate::media::{MediaKind, display_extension};

/// Which processor handles an input/output pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    ImageToImage,
    ImageToVideo,
    VideoToVideo,
}

impl Mode {
    /// Pick the mode from the two file extensions. Nothing is opened.
    pub fn select(input: &Path, output: &Path) -> BlarpResult<Self> {
        match (MediaKind::of(input), MediaKind::of(output)) {
            (MediaKind::Image, MediaKind::Image) => Ok(Self::ImageToImage),
            (MediaKind::Image, MediaKind::Video) => Ok(Self::ImageToVideo),
            (MediaKind::Video, MediaKind::Video) => Ok(Self::VideoToVideo),
            _ => Err(BlarpError::unsupported(format!(
                "Unsupported input/output combination: {} → {}",
                display_extension(input),
                display_extension(output)
            ))),
        }
    }

    pub fn produces_video(self) -> bool {
        !matches!(self, Self::ImageToImage)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::ImageToImage => "image→image",
            Self::ImageToVideo => "image→video",
            Self::VideoToVideo => "video→video",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_pairs_select_modes() {
        let sel = |i: &str, o: &str| Mode::select(Path::new(i), Path::new(o));
        assert_eq!(sel("a.jpg", "b.png").unwrap(), Mode::ImageToImage);
        assert_eq!(sel("a.BMP", "b.mov").unwrap(), Mode::ImageToVideo);
        assert_eq!(sel("a.mkv", "b.avi").unwrap(), Mode::VideoToVideo);
    }

    #[test]
    fn video_to_image_is_unsupported() {
        let err = Mode::select(Path::new("a.mp4"), Path::new("b.png")).unwrap_err();
        assert!(matches!(err, BlarpError::Unsupported(_)));
    }

    #[test]
    fn text_input_names_both_extensions() {
        let err = Mode::select(Path::new("notes.txt"), Path::new("out.png")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unsupported: Unsupported input/output combination: .txt → .png"
        );
    }
}
