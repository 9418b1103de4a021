//! Turning read-back pixels into PNG files

use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgba};

use crate::{
    backend::{PixelBuffer, PixelOrigin},
    error::RenderError,
    texture::flip_rows,
};

/// Names tried by [`next_free_path`] before it gives up
pub const MAX_FILE_COUNT: u32 = 1000;

/// Reverses row order in place; `pixels` is `width * height * channels` bytes
pub fn flip_vertically(pixels: &mut [u8], width: u32, height: u32, channels: u32) {
    flip_rows(pixels, width, height, channels);
}

/// Makes row 0 the top row
pub fn to_top_left(pixels: &mut PixelBuffer) {
    if pixels.origin == PixelOrigin::BottomLeft {
        flip_vertically(&mut pixels.rgba, pixels.width, pixels.height, 4);
        pixels.origin = PixelOrigin::TopLeft;
    }
}

/// First `dir/{prefix}{n}.{ext}` that doesn't exist yet, `n < max`
///
/// When every name is taken this logs a warning & returns index 0, which will be overwritten
pub fn next_free_path(dir: &Path, prefix: &str, ext: &str, max: u32) -> PathBuf {
    (0..max)
        .map(|index| dir.join(format!("{prefix}{index}.{ext}")))
        .find(|path| !path.exists())
        .unwrap_or_else(|| {
            log::warn!("next_free_path: no free file name left for {prefix}, overwriting index 0");
            dir.join(format!("{prefix}0.{ext}"))
        })
}

/// Writes a PNG; top-left buffers are written as-is, bottom-left ones flipped first
pub fn write_png(path: &Path, pixels: &PixelBuffer) -> Result<(), RenderError> {
    let mut rgba = pixels.rgba.clone();
    if pixels.origin == PixelOrigin::BottomLeft {
        flip_vertically(&mut rgba, pixels.width, pixels.height, 4);
    }
    let (width, height, len) = (pixels.width, pixels.height, pixels.rgba.len());
    let image = ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).ok_or_else(|| {
        RenderError::Readback(format!("{len} bytes don't make a {width}x{height} image"))
    })?;
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flipping_swaps_rows() {
        let mut pixels = vec![1, 2, 3, 4, 5, 6];
        flip_vertically(&mut pixels, 1, 3, 2);
        assert_eq!(pixels, vec![5, 6, 3, 4, 1, 2]);

        // single row untouched
        let mut row = vec![9, 8, 7];
        flip_vertically(&mut row, 3, 1, 1);
        assert_eq!(row, vec![9, 8, 7]);
    }

    #[test]
    fn flipping_twice_restores() {
        let original: Vec<u8> = (0..48).collect();
        let mut pixels = original.clone();
        flip_vertically(&mut pixels, 3, 4, 4);
        assert_ne!(pixels, original);
        flip_vertically(&mut pixels, 3, 4, 4);
        assert_eq!(pixels, original);
    }

    #[test]
    fn free_paths_skip_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(next_free_path(dir.path(), "shot", "png", 3), dir.path().join("shot0.png"));

        std::fs::write(dir.path().join("shot0.png"), b"").unwrap();
        std::fs::write(dir.path().join("shot1.png"), b"").unwrap();
        assert_eq!(next_free_path(dir.path(), "shot", "png", 3), dir.path().join("shot2.png"));

        std::fs::write(dir.path().join("shot2.png"), b"").unwrap();
        assert_eq!(next_free_path(dir.path(), "shot", "png", 3), dir.path().join("shot0.png"));
    }

    #[test]
    fn bottom_left_buffers_are_written_upright() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let pixels = PixelBuffer {
            width: 1,
            height: 2,
            origin: PixelOrigin::BottomLeft,
            rgba: vec![255, 0, 0, 255, 0, 0, 255, 255],
        };
        write_png(&path, &pixels).unwrap();

        let image = image::open(&path).unwrap().to_rgba8();
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(image.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pixels = PixelBuffer {
            width: 2,
            height: 2,
            origin: PixelOrigin::TopLeft,
            rgba: vec![0; 4],
        };
        assert!(matches!(
            write_png(&dir.path().join("bad.png"), &pixels),
            Err(RenderError::Readback(_))
        ));
    }
}
