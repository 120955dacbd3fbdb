use super::preprocess::{blur_rgb, rgb_to_lab};
use image::RgbImage;
use ndarray::Array2;

/// How pixels are turned into clustering features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureOptions {
    /// Append normalized (x, y) coordinates
    pub add_xy: bool,
    /// Multiplier for the coordinate columns
    pub xy_weight: f32,
    /// Gaussian sigma applied to the RGB image first, <= 0 disables it
    pub blur_sigma: f32,
}

impl FeatureOptions {
    pub fn dimensions(&self) -> usize {
        if self.add_xy {
            5
        } else {
            3
        }
    }
}

/// Build the (h * w, 3 | 5) feature matrix of `image` in raster order
///
/// Columns are L*, a*, b* and, when enabled, `x / (w - 1)` and `y / (h - 1)` scaled by the weight.
pub fn build_features(image: &RgbImage, options: &FeatureOptions) -> Array2<f32> {
    let _span = tracing::debug_span!("features").entered();

    let (width, height) = image.dimensions();
    let lab = rgb_to_lab(&blur_rgb(image, options.blur_sigma));

    let n = width as usize * height as usize;
    let mut features = Array2::<f32>::zeros((n, options.dimensions()));
    let x_den = width.saturating_sub(1).max(1) as f32;
    let y_den = height.saturating_sub(1).max(1) as f32;

    for y in 0..height as usize {
        for x in 0..width as usize {
            let row = y * width as usize + x;
            for c in 0..3 {
                features[[row, c]] = lab[[y, x, c]];
            }
            if options.add_xy {
                features[[row, 3]] = x as f32 / x_den * options.xy_weight;
                features[[row, 4]] = y as f32 / y_den * options.xy_weight;
            }
        }
    }

    tracing::debug!("Built {} feature vectors of dimension {}", n, options.dimensions());
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Rgb;

    fn opts(add_xy: bool) -> FeatureOptions {
        FeatureOptions {
            add_xy,
            xy_weight: 0.5,
            blur_sigma: 0.0,
        }
    }

    #[test]
    fn color_only_features() {
        let image = RgbImage::from_pixel(4, 3, Rgb([10, 200, 30]));
        let features = build_features(&image, &opts(false));
        assert_eq!(features.dim(), (12, 3));
        assert_relative_eq!(features[[0, 0]], features[[11, 0]]);
    }

    #[test]
    fn spatial_features_are_normalized_and_weighted() {
        let image = RgbImage::new(5, 3);
        let features = build_features(&image, &opts(true));
        assert_eq!(features.dim(), (15, 5));
        // last pixel is (4, 2)
        assert_relative_eq!(features[[14, 3]], 0.5);
        assert_relative_eq!(features[[14, 4]], 0.5);
        // pixel (2, 1) is row 1 * 5 + 2
        assert_relative_eq!(features[[7, 3]], 0.25);
        assert_relative_eq!(features[[7, 4]], 0.25);
    }

    #[test]
    fn raster_order_is_preserved() {
        let mut image = RgbImage::from_pixel(3, 2, Rgb([0, 0, 0]));
        image.put_pixel(2, 1, Rgb([255, 255, 255]));
        let features = build_features(&image, &opts(false));
        assert!(features[[5, 0]] > 99.0);
        assert!(features[[0, 0]] < 1.0);
    }

    #[test]
    fn single_pixel_image_has_zero_coordinates() {
        let image = RgbImage::new(1, 1);
        let features = build_features(&image, &opts(true));
        assert_eq!(features[[0, 3]], 0.0);
        assert_eq!(features[[0, 4]], 0.0);
    }
}
