use image::{imageops, ImageBuffer, Rgb, RgbImage};
use ndarray::{Array3, Axis};
use palette::{FromColor, Lab, LinSrgb, Srgb};

/// Preprocessor that bounds image size and converts pixels into float color planes
pub struct Preprocessor {
    max_side: u32,
}

impl Preprocessor {
    pub fn new(max_side: u32) -> Self {
        Self { max_side }
    }

    /// Shrink `image` so its longer side is at most `max_side`, keeping the aspect ratio
    ///
    /// Images already within bounds are returned as-is.
    pub fn downscale(&self, image: &RgbImage) -> RgbImage {
        let _span = tracing::debug_span!("downscale").entered();

        let (width, height) = image.dimensions();
        let longest = width.max(height);
        if longest <= self.max_side {
            return image.clone();
        }

        let scale = self.max_side as f64 / longest as f64;
        let new_width = ((width as f64 * scale).round() as u32).clamp(1, self.max_side);
        let new_height = ((height as f64 * scale).round() as u32).clamp(1, self.max_side);
        tracing::debug!(
            "Downscaling {}x{} -> {}x{} (scale {:.3})",
            width,
            height,
            new_width,
            new_height,
            scale
        );

        imageops::resize(image, new_width, new_height, imageops::FilterType::Triangle)
    }
}

/// Convert an RGB image to an (h, w, 3) array with channels in [0, 1]
pub fn rgb_to_array(image: &RgbImage) -> Array3<f32> {
    let (width, height) = image.dimensions();
    let mut out = Array3::<f32>::zeros((height as usize, width as usize, 3));
    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            out[[y as usize, x as usize, c]] = pixel[c] as f32 / 255.0;
        }
    }
    out
}

/// Convert an (h, w, 3) sRGB array in [0, 1] to CIE L*a*b* (D65)
pub fn rgb_array_to_lab(rgb: &Array3<f32>) -> Array3<f32> {
    let mut lab = Array3::<f32>::zeros(rgb.raw_dim());
    for (src, mut dst) in rgb.lanes(Axis(2)).into_iter().zip(lab.lanes_mut(Axis(2))) {
        let srgb: Srgb<f32> = Srgb::new(src[0], src[1], src[2]);
        let lin: LinSrgb<f32> = srgb.into_linear();
        let color: Lab = Lab::from_color(lin);
        dst[0] = color.l;
        dst[1] = color.a;
        dst[2] = color.b;
    }
    lab
}

/// L*a*b* planes of an 8-bit RGB image
pub fn rgb_to_lab(image: &RgbImage) -> Array3<f32> {
    rgb_array_to_lab(&rgb_to_array(image))
}

/// Gaussian blur of an 8-bit RGB image; a non-positive sigma returns a copy
pub fn blur_rgb(image: &RgbImage, sigma: f32) -> RgbImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    let _span = tracing::debug_span!("blur_rgb", sigma).entered();
    imageproc::filter::gaussian_blur_f32(image, sigma)
}

/// Gaussian blur over the three float planes of an (h, w, 3) array
///
/// A non-positive sigma returns a copy.
pub fn blur_planes(src: &Array3<f32>, sigma: f32) -> Array3<f32> {
    if sigma <= 0.0 {
        return src.clone();
    }
    let _span = tracing::debug_span!("blur_planes", sigma).entered();

    let (height, width, _) = src.dim();
    let planes: ImageBuffer<Rgb<f32>, Vec<f32>> =
        ImageBuffer::from_fn(width as u32, height as u32, |x, y| {
            let (x, y) = (x as usize, y as usize);
            Rgb([src[[y, x, 0]], src[[y, x, 1]], src[[y, x, 2]]])
        });
    let blurred = imageproc::filter::gaussian_blur_f32(&planes, sigma);

    Array3::from_shape_fn(src.raw_dim(), |(y, x, c)| {
        blurred.get_pixel(x as u32, y as u32)[c]
    })
}
