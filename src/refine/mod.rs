mod gmm;
mod grabcut;
mod maxflow;

pub use grabcut::GrabCut;

use crate::config::SizeLimits;
use crate::error::Result;
use crate::postprocess::{postprocess, MASK_THRESHOLD};
use crate::segmentation::Mask;
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use ndarray::Array2;

/// Four-way pixel labeling used to seed graph-cut refinement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimapLabel {
    Background,
    ProbableBackground,
    ProbableForeground,
    Foreground,
}

impl TrimapLabel {
    pub fn is_foreground(self) -> bool {
        matches!(self, Self::Foreground | Self::ProbableForeground)
    }

    pub fn is_probable(self) -> bool {
        matches!(self, Self::ProbableBackground | Self::ProbableForeground)
    }
}

/// Per-pixel trimap, shape (height, width)
#[derive(Debug, Clone, PartialEq)]
pub struct Trimap {
    labels: Array2<TrimapLabel>,
}

impl Trimap {
    /// Seed a trimap from a binary mask
    ///
    /// Mask pixels become probable foreground, the rest probable background. The mask and
    /// its complement are eroded by a 3x3 square twice; what survives is definite.
    pub fn from_mask(mask: &Mask) -> Self {
        let fg = crate::postprocess::binarize(mask);
        let mut bg = fg.clone();
        image::imageops::invert(&mut bg);

        let sure_fg = morphology::erode(&fg, Norm::LInf, 2);
        let sure_bg = morphology::erode(&bg, Norm::LInf, 2);

        let labels = Array2::from_shape_fn((mask.height() as usize, mask.width() as usize), |(y, x)| {
            let (x, y) = (x as u32, y as u32);
            if sure_bg.get_pixel(x, y)[0] > 0 {
                TrimapLabel::Background
            } else if sure_fg.get_pixel(x, y)[0] > 0 {
                TrimapLabel::Foreground
            } else if fg.get_pixel(x, y)[0] > 0 {
                TrimapLabel::ProbableForeground
            } else {
                TrimapLabel::ProbableBackground
            }
        });
        Self { labels }
    }

    pub fn from_array(labels: Array2<TrimapLabel>) -> Self {
        Self { labels }
    }

    pub fn width(&self) -> u32 {
        self.labels.ncols() as u32
    }

    pub fn height(&self) -> u32 {
        self.labels.nrows() as u32
    }

    pub fn get(&self, x: u32, y: u32) -> TrimapLabel {
        self.labels[[y as usize, x as usize]]
    }

    pub fn as_array(&self) -> &Array2<TrimapLabel> {
        &self.labels
    }

    /// Definite or probable foreground as 255, everything else 0
    pub fn to_mask(&self) -> Mask {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([if self.get(x, y).is_foreground() { 255 } else { 0 }])
        })
    }
}

/// Trait for mask refinement backends
/// Lets graph-cut refinement be swapped for another energy minimizer or stubbed in tests
pub trait MaskRefiner {
    /// Refine `trimap` against the colors of `image`
    ///
    /// # Returns
    /// * Binary mask: 255 where the pixel ends up foreground
    fn refine(&self, image: &RgbImage, trimap: &Trimap, iterations: u32) -> Result<Mask>;
}

/// Seed a trimap from `mask`, refine it, and clean the result with the same thresholds
pub fn refine_mask<R: MaskRefiner + ?Sized>(
    refiner: &R,
    image: &RgbImage,
    mask: &Mask,
    iterations: u32,
    limits: SizeLimits,
) -> Result<Mask> {
    let _span = tracing::debug_span!("refine", iterations).entered();

    let trimap = Trimap::from_mask(mask);
    let refined = refiner.refine(image, &trimap, iterations)?;

    let before = mask.pixels().filter(|p| p[0] > MASK_THRESHOLD).count();
    let after = refined.pixels().filter(|p| p[0] > MASK_THRESHOLD).count();
    tracing::debug!("Refinement changed foreground from {} to {} px", before, after);

    Ok(postprocess(&refined, limits))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Passthrough;

    impl MaskRefiner for Passthrough {
        fn refine(&self, _image: &RgbImage, trimap: &Trimap, _iterations: u32) -> Result<Mask> {
            Ok(trimap.to_mask())
        }
    }

    fn square_mask(size: u32, lo: u32, hi: u32) -> Mask {
        GrayImage::from_fn(size, size, |x, y| {
            Luma([if (lo..hi).contains(&x) && (lo..hi).contains(&y) { 255 } else { 0 }])
        })
    }

    #[test]
    fn trimap_has_definite_cores_and_probable_bands() {
        let trimap = Trimap::from_mask(&square_mask(30, 10, 20));

        assert_eq!(trimap.get(15, 15), TrimapLabel::Foreground);
        assert_eq!(trimap.get(10, 10), TrimapLabel::ProbableForeground);
        assert_eq!(trimap.get(11, 15), TrimapLabel::ProbableForeground);
        assert_eq!(trimap.get(12, 15), TrimapLabel::Foreground);
        assert_eq!(trimap.get(9, 15), TrimapLabel::ProbableBackground);
        assert_eq!(trimap.get(8, 15), TrimapLabel::ProbableBackground);
        assert_eq!(trimap.get(7, 15), TrimapLabel::Background);
        assert_eq!(trimap.get(0, 0), TrimapLabel::Background);
    }

    #[test]
    fn trimap_collapses_back_to_the_mask() {
        let mask = square_mask(30, 10, 20);
        assert_eq!(Trimap::from_mask(&mask).to_mask(), mask);
    }

    #[test]
    fn refine_mask_postprocesses_the_refiner_output() {
        let image = RgbImage::new(30, 30);
        let mut mask = square_mask(30, 5, 25);
        mask.put_pixel(0, 29, Luma([255]));
        let limits = SizeLimits {
            min_hole: 32,
            min_object: 128,
        };
        let out = refine_mask(&Passthrough, &image, &mask, 3, limits).unwrap();
        assert_eq!(out.get_pixel(0, 29)[0], 0);
        assert_eq!(out.get_pixel(15, 15)[0], 255);
    }
}
