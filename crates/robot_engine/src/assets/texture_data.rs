//! Image decoding into the fixed RGBA8 layout the uploader expects

use std::path::Path;

use crate::assets::AssetError;

/// Decoded image: tightly packed RGBA8 rows, top-left origin.
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes of RGBA data.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Decode an image file (png/jpeg/bmp) into RGBA8.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let image = image::open(&path)?.to_rgba8();
        let (width, height) = image.dimensions();

        log::debug!(
            "loaded texture {}: {}x{}",
            path.as_ref().display(),
            width,
            height
        );

        Ok(Self {
            width,
            height,
            pixels: image.into_raw(),
        })
    }

    /// Wrap already-decoded RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_png_to_rgba() {
        // 2x1 image: one red pixel, one semi-transparent green pixel.
        let mut buf = image::RgbaImage::new(2, 1);
        buf.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        buf.put_pixel(1, 0, image::Rgba([0, 255, 0, 128]));
        let path = std::env::temp_dir().join("robot_engine_texture_test.png");
        buf.save(&path).unwrap();

        let data = TextureData::load(&path).unwrap();
        assert_eq!((data.width, data.height), (2, 1));
        assert_eq!(data.pixels, vec![255, 0, 0, 255, 0, 255, 0, 128]);
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(TextureData::load("/definitely/not/here.png").is_err());
    }
}
