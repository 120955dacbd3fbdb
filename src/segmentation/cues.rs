//! Per-pixel maps and per-region statistics used to tell the object from the background.

use super::preprocess::blur_planes;
use image::{imageops, GrayImage, RgbImage};
use ndarray::{Array2, Array3, Axis, Zip};

/// Canny hysteresis thresholds
pub const CANNY_LOW: f32 = 80.0;
pub const CANNY_HIGH: f32 = 160.0;

/// Spread of the center prior relative to the longer image side
pub const CENTER_SIGMA_RATIO: f32 = 0.35;

/// Sigma of the blur applied to L*a*b* before measuring saliency
pub const SALIENCY_BLUR_SIGMA: f32 = 1.0;

const RANGE_EPS: f32 = 1e-6;

/// Edge pixels of the grayscale version of `image`
///
/// `imageproc`'s Canny smooths with a sigma 1.4 Gaussian before thresholding, so fine
/// texture yields fewer edge pixels than an unsmoothed detector at the same thresholds.
pub fn edge_map(image: &RgbImage) -> Array2<bool> {
    let gray: GrayImage = imageops::grayscale(image);
    let edges = imageproc::edges::canny(&gray, CANNY_LOW, CANNY_HIGH);
    let (width, height) = edges.dimensions();
    Array2::from_shape_fn((height as usize, width as usize), |(y, x)| {
        edges.get_pixel(x as u32, y as u32)[0] > 0
    })
}

/// Number of `true` pixels in a membership map
pub fn area(member: &Array2<bool>) -> usize {
    member.iter().filter(|&&m| m).count()
}

/// Share of the whole frame covered by `member`
pub fn area_fraction(member: &Array2<bool>) -> f32 {
    if member.is_empty() {
        return 0.0;
    }
    area(member) as f32 / member.len() as f32
}

/// Fraction of member pixels that are edge pixels
pub fn edge_density(edges: &Array2<bool>, member: &Array2<bool>) -> f32 {
    let hits = Zip::from(edges)
        .and(member)
        .fold(0usize, |acc, &e, &m| acc + usize::from(e && m));
    hits as f32 / area(member).max(1) as f32
}

/// Fraction of member pixels lying on the outer 1-pixel frame
pub fn border_touch_ratio(member: &Array2<bool>) -> f32 {
    let (height, width) = member.dim();
    let touching = member
        .indexed_iter()
        .filter(|&((y, x), &m)| m && (y == 0 || x == 0 || y + 1 == height || x + 1 == width))
        .count();
    touching as f32 / area(member).max(1) as f32
}

/// Mean of `map` over member pixels; 0.0 when there are none
pub fn masked_mean(map: &Array2<f32>, member: &Array2<bool>) -> f32 {
    let (sum, count) = Zip::from(map)
        .and(member)
        .fold((0.0f64, 0usize), |(sum, count), &v, &m| {
            if m {
                (sum + v as f64, count + 1)
            } else {
                (sum, count)
            }
        });
    if count == 0 {
        0.0
    } else {
        (sum / count as f64) as f32
    }
}

/// Frequency-tuned saliency: distance of each blurred L*a*b* pixel from the mean color
///
/// Normalized to [0, 1]; a flat image gives all zeros.
pub fn saliency_map(lab: &Array3<f32>) -> Array2<f32> {
    let blurred = blur_planes(lab, SALIENCY_BLUR_SIGMA);
    let (height, width, _) = blurred.dim();
    if height == 0 || width == 0 {
        return Array2::zeros((height, width));
    }

    let mean = blurred
        .lanes(Axis(2))
        .into_iter()
        .fold([0.0f64; 3], |mut acc, px| {
            for c in 0..3 {
                acc[c] += px[c] as f64;
            }
            acc
        })
        .map(|s| (s / (height * width) as f64) as f32);

    let distance = Array2::from_shape_fn((height, width), |(y, x)| {
        (0..3)
            .map(|c| {
                let d = blurred[[y, x, c]] - mean[c];
                d * d
            })
            .sum::<f32>()
            .sqrt()
    });

    normalize_min_max(distance)
}

/// Gaussian center prior peaking at ((w - 1) / 2, (h - 1) / 2), normalized to [0, 1]
pub fn center_prior(height: usize, width: usize, sigma_ratio: f32) -> Array2<f32> {
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;
    let sigma = sigma_ratio * height.max(width) as f32;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let prior = Array2::from_shape_fn((height, width), |(y, x)| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        (-(dx * dx + dy * dy) / two_sigma_sq).exp()
    });

    let (min, max) = min_max(&prior);
    prior.mapv(|v| (v - min) / (max - min + RANGE_EPS))
}

fn min_max(map: &Array2<f32>) -> (f32, f32) {
    map.iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn normalize_min_max(map: Array2<f32>) -> Array2<f32> {
    let (min, max) = min_max(&map);
    let range = max - min;
    if range.is_nan() || range < RANGE_EPS {
        return Array2::zeros(map.raw_dim());
    }
    map.mapv(|v| (v - min) / (range + RANGE_EPS))
}
