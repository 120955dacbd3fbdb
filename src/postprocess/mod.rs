//! Cleanup of raw cluster masks into a single solid object.

use crate::config::SizeLimits;
use crate::segmentation::Mask;
use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use imageproc::region_labelling::{connected_components, Connectivity};

/// Threshold separating foreground from background in 8-bit masks
pub const MASK_THRESHOLD: u8 = 127;

/// Force every pixel to 0 or 255
pub fn binarize(mask: &Mask) -> Mask {
    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        Luma([if mask.get_pixel(x, y)[0] > MASK_THRESHOLD { 255 } else { 0 }])
    })
}

/// 3x3 opening once to drop speckles, then 3x3 closing twice to seal small gaps
pub fn open_close(mask: &Mask) -> Mask {
    // a 3x3 square is the L-infinity ball of radius 1; two iterations are radius 2
    let opened = morphology::open(&binarize(mask), Norm::LInf, 1);
    morphology::close(&opened, Norm::LInf, 2)
}

/// Area in pixels of each connected region, indexed by label (index 0 unused)
fn region_areas(labels: &image::ImageBuffer<Luma<u32>, Vec<u32>>) -> Vec<u64> {
    let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    let mut areas = vec![0u64; count + 1];
    for p in labels.pixels() {
        areas[p[0] as usize] += 1;
    }
    areas
}

/// Turn background regions smaller than `min_hole` pixels into foreground
///
/// Background regions are 4-connected, matching the complement of 8-connected objects.
pub fn fill_small_holes(mask: &Mask, min_hole: u32) -> Mask {
    let mask = binarize(mask);
    if min_hole == 0 {
        return mask;
    }

    let mut inverted = mask.clone();
    image::imageops::invert(&mut inverted);
    let holes = connected_components(&inverted, Connectivity::Four, Luma([0u8]));
    let areas = region_areas(&holes);

    let mut filled = 0usize;
    let out = GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let label = holes.get_pixel(x, y)[0] as usize;
        if label != 0 && areas[label] < min_hole as u64 {
            filled += 1;
            Luma([255])
        } else {
            *mask.get_pixel(x, y)
        }
    });
    tracing::debug!("Filled {} hole pixels below {} px", filled, min_hole);
    out
}

/// Keep only the largest 8-connected object among those of at least `min_object` pixels
///
/// When no object reaches the threshold the mask is returned unchanged rather than emptied.
pub fn keep_largest_component(mask: &Mask, min_object: u32) -> Mask {
    let mask = binarize(mask);
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));
    let areas = region_areas(&labels);
    let min_area = min_object.max(1) as u64;

    let best = areas
        .iter()
        .enumerate()
        .skip(1)
        .filter(|(_, &area)| area >= min_area)
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
        .map(|(label, _)| label as u32);

    match best {
        Some(label) => {
            tracing::debug!(
                "Keeping component {} of {} ({} px)",
                label,
                areas.len() - 1,
                areas[label as usize]
            );
            GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
                Luma([if labels.get_pixel(x, y)[0] == label { 255 } else { 0 }])
            })
        }
        None => {
            if areas.len() > 1 {
                tracing::warn!(
                    "No component reaches {} px, keeping the unfiltered mask",
                    min_area
                );
            }
            mask
        }
    }
}

/// Full cleanup: opening, closing, hole filling and largest-component extraction
pub fn postprocess(mask: &Mask, limits: SizeLimits) -> Mask {
    let _span = tracing::debug_span!("postprocess").entered();
    tracing::debug!(
        "Post-processing with min_hole={} min_object={}",
        limits.min_hole,
        limits.min_object
    );

    let mask = open_close(mask);
    let mask = fill_small_holes(&mask, limits.min_hole);
    keep_largest_component(&mask, limits.min_object)
}
