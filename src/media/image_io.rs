use std::path::Path;

use anyhow::Context as _;
use image::RgbImage;

use crate::encode::ffmpeg::ensure_parent_dir;
use crate::foundation::error::{BlarpError, BlarpResult};

/// Load any supported raster image as 3-channel 8-bit.
pub fn load_rgb(path: &Path) -> BlarpResult<RgbImage> {
    if !path.is_file() {
        return Err(BlarpError::media(format!(
            "input image '{}' does not exist or is not a file",
            path.display()
        )));
    }
    let img = image::open(path)
        .with_context(|| format!("failed to decode image '{}'", path.display()))?;
    Ok(img.to_rgb8())
}

/// Save `img`; the format follows the extension of `path`.
pub fn save_rgb(img: &RgbImage, path: &Path) -> BlarpResult<()> {
    ensure_parent_dir(path)?;
    img.save(path)
        .with_context(|| format!("failed to write image '{}'", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_survives_save_and_load() {
        let dir = std::env::temp_dir().join(format!("blarp_image_io_{}", std::process::id()));
        let path = dir.join("nested").join("img.png");
        let img = RgbImage::from_fn(3, 2, |x, y| image::Rgb([x as u8 * 40, y as u8 * 90, 7]));

        save_rgb(&img, &path).unwrap();
        assert_eq!(load_rgb(&path).unwrap(), img);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_input_is_a_media_error() {
        let err = load_rgb(Path::new("definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, BlarpError::Media(_)));
    }
}
