use crate::error::Result;
use image::{GrayImage, RgbImage, RgbaImage};
use ndarray::Array2;
use std::fmt;

/// Binary mask: 0 = background, 255 = foreground, same size as the processed image
pub type Mask = GrayImage;

/// Per-pixel cluster labels in {0, 1}, shape (height, width)
///
/// Produced once per run and only read afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGrid {
    labels: Array2<u8>,
}

impl LabelGrid {
    /// Reshape raster-ordered labels into a `width` x `height` grid
    pub fn from_raster(labels: &[usize], width: u32, height: u32) -> Self {
        let grid = Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
            labels[y * width as usize + x] as u8
        });
        Self { labels: grid }
    }

    pub fn from_array(labels: Array2<u8>) -> Self {
        Self { labels }
    }

    pub fn width(&self) -> u32 {
        self.labels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.labels.nrows() as u32
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.labels[[y as usize, x as usize]]
    }

    pub fn as_array(&self) -> &Array2<u8> {
        &self.labels
    }

    /// Membership map of `cluster`
    pub fn membership(&self, cluster: u8) -> Array2<bool> {
        self.labels.mapv(|l| l == cluster)
    }

    /// Mask with 255 wherever the label equals `cluster`
    pub fn to_mask(&self, cluster: u8) -> Mask {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            image::Luma([if self.get(x, y) == cluster { 255 } else { 0 }])
        })
    }

    /// Distinct labels present in the grid, ascending
    pub fn distinct(&self) -> Vec<u8> {
        let mut seen = [false; 256];
        self.labels.iter().for_each(|&l| seen[l as usize] = true);
        (0..=255u8).filter(|&l| seen[l as usize]).collect()
    }
}

/// Short numeric summary of how separable the image was
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Analysis {
    /// Euclidean distance between the two clusters' mean L*a*b* colors
    pub cluster_delta_lab: f32,
    /// Fraction of final foreground pixels lying on detected edges
    pub foreground_edge_density: f32,
    /// Fraction of final foreground pixels on the 1-pixel image frame
    pub foreground_border_touch: f32,
}

impl fmt::Display for Analysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ΔLab between clusters ≈ {:.1} (higher separates easier) • FG edge density ≈ {:.3} • FG border touch ≈ {:.2}",
            self.cluster_delta_lab, self.foreground_edge_density, self.foreground_border_touch
        )
    }
}

/// Everything a segmentation run hands back to its caller
#[derive(Debug, Clone)]
pub struct SegmentationOutput {
    /// Input after downscaling
    pub original: RgbImage,
    pub mask: Mask,
    /// Foreground over pure white, when requested
    pub white: Option<RgbImage>,
    /// Foreground with the mask as alpha, when requested
    pub transparent: Option<RgbaImage>,
    pub analysis: Analysis,
}

/// Trait for segmentation backends
/// Allows swapping the clustering pipeline for other foreground extractors
pub trait Segmenter {
    /// Separate foreground from background in `image`
    ///
    /// # Returns
    /// * The processed image, its mask, the requested composites and an analysis summary
    fn segment(&self, image: &RgbImage) -> Result<SegmentationOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reshapes_raster_labels() {
        let grid = LabelGrid::from_raster(&[0, 1, 1, 0, 0, 1], 3, 2);
        assert_eq!((grid.width(), grid.height()), (3, 2));
        assert_eq!(grid.get(1, 0), 1);
        assert_eq!(grid.get(0, 1), 0);
        assert_eq!(grid.get(2, 1), 1);
        assert_eq!(grid.distinct(), vec![0, 1]);

        let mask = grid.to_mask(1);
        assert_eq!(mask.get_pixel(2, 1)[0], 255);
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
    }

    #[test]
    fn analysis_formats_to_one_line() {
        let analysis = Analysis {
            cluster_delta_lab: 42.26,
            foreground_edge_density: 0.0512,
            foreground_border_touch: 0.0,
        };
        let text = analysis.to_string();
        assert!(text.contains("42.3"));
        assert!(text.contains("0.051"));
        assert!(text.contains("0.00"));
        assert!(!text.contains('\n'));
    }
}
