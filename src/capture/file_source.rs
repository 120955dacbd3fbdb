use super::ImageSource;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Reads a single image file in any format the `image` crate decodes
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ImageSource for FileSource {
    fn load(&mut self) -> Result<RgbImage> {
        tracing::info!("Loading image from {}", self.path.display());

        let decoded = image::open(&self.path)
            .with_context(|| format!("Failed to decode image at {}", self.path.display()))?;

        // grayscale expands to three channels, alpha is dropped
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            bail!("Image at {} is empty", self.path.display());
        }

        tracing::info!("Loaded {}x{} image", width, height);
        Ok(rgb)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    #[test]
    fn loads_grayscale_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        GrayImage::from_pixel(4, 3, Luma([90])).save(&path).unwrap();

        let image = FileSource::new(&path).load().unwrap();
        assert_eq!(image.dimensions(), (4, 3));
        assert_eq!(image.get_pixel(2, 1).0, [90, 90, 90]);
    }

    #[test]
    fn drops_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgba.png");
        RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0])).save(&path).unwrap();

        let image = FileSource::new(&path).load().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut source = FileSource::new("/definitely/not/here.png");
        assert!(source.load().is_err());
        assert!(source.describe().ends_with("here.png"));
    }
}
