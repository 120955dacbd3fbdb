mod file_source;

pub use file_source::FileSource;

use anyhow::Result;
use image::RgbImage;

/// Trait for image sources
pub trait ImageSource {
    /// Load the image to segment as 8-bit RGB
    fn load(&mut self) -> Result<RgbImage>;

    /// Human-readable description of where images come from
    fn describe(&self) -> String;
}
