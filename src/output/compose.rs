use crate::config::BackgroundMode;
use crate::postprocess::MASK_THRESHOLD;
use crate::segmentation::Mask;
use image::{Rgb, RgbImage, Rgba, RgbaImage};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Keep foreground pixels, paint everything else pure white
pub fn compose_on_white(image: &RgbImage, mask: &Mask) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        if mask.get_pixel(x, y)[0] > MASK_THRESHOLD {
            *image.get_pixel(x, y)
        } else {
            WHITE
        }
    })
}

/// Attach `mask` to `image` as its alpha channel
pub fn compose_transparent(image: &RgbImage, mask: &Mask) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b] = image.get_pixel(x, y).0;
        Rgba([r, g, b, mask.get_pixel(x, y)[0]])
    })
}

/// Render the composites requested by `mode`
pub fn render(
    image: &RgbImage,
    mask: &Mask,
    mode: BackgroundMode,
) -> (Option<RgbImage>, Option<RgbaImage>) {
    let _span = tracing::debug_span!("compose").entered();

    let white = mode.wants_white().then(|| compose_on_white(image, mask));
    let transparent = mode
        .wants_transparent()
        .then(|| compose_transparent(image, mask));
    (white, transparent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn gradient() -> RgbImage {
        RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, 77]))
    }

    fn ramp_mask() -> Mask {
        GrayImage::from_fn(16, 16, |x, y| Luma([((x + y) * 8) as u8]))
    }

    #[test]
    fn white_composite_keeps_foreground_exactly() {
        let image = gradient();
        let mask = ramp_mask();
        let white = compose_on_white(&image, &mask);
        for (x, y, m) in mask.enumerate_pixels() {
            if m[0] > 127 {
                assert_eq!(white.get_pixel(x, y), image.get_pixel(x, y));
            } else {
                assert_eq!(*white.get_pixel(x, y), WHITE);
            }
        }
    }

    #[test]
    fn transparent_composite_uses_mask_as_alpha() {
        let image = gradient();
        let mask = ramp_mask();
        let rgba = compose_transparent(&image, &mask);
        let p = rgba.get_pixel(3, 5);
        assert_eq!(p.0, [48, 80, 77, 64]);
    }

    #[test]
    fn mode_selects_outputs() {
        let image = gradient();
        let mask = ramp_mask();
        let (white, transparent) = render(&image, &mask, BackgroundMode::White);
        assert!(white.is_some() && transparent.is_none());
        let (white, transparent) = render(&image, &mask, BackgroundMode::Transparent);
        assert!(white.is_none() && transparent.is_some());
        let (white, transparent) = render(&image, &mask, BackgroundMode::Both);
        assert!(white.is_some() && transparent.is_some());
    }
}
