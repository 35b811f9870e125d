use image::{GrayImage, Luma};
use imageproc::contrast::otsu_level;
use imageproc::edges::canny;
use imageproc::region_labelling::{connected_components, Connectivity};
use log::debug;

use super::morphology::{close, fill_holes, Mask};

/// Canny hysteresis thresholds, 0.1 and 0.2 of the 8-bit range
pub const CANNY_LOW_THRESHOLD: f32 = 25.5;
pub const CANNY_HIGH_THRESHOLD: f32 = 51.0;

/// Below this many filled pixels the edge contours are considered open
pub const MIN_FILLED_AREA: usize = 10;

/// Radius of the disk used for the closing step
pub const CLOSING_RADIUS: u8 = 2;

/// Segment the main particle of a grayscale image.
///
/// 1. Canny edges, enclosed regions filled.
/// 2. Global Otsu threshold when fewer than [`MIN_FILLED_AREA`] pixels result.
/// 3. Closing with a disk of radius [`CLOSING_RADIUS`].
/// 4. 8-connected labelling; the largest component is the particle.
///
/// Returns `None` when nothing is left after step 3.
pub fn segment_particle(image: &GrayImage) -> Option<Mask> {
    if image.width() == 0 || image.height() == 0 {
        return None;
    }

    let edges = canny(image, CANNY_LOW_THRESHOLD, CANNY_HIGH_THRESHOLD);
    let mut filled = fill_holes(&Mask::from_image(&edges, |v| v > 0));

    if filled.count() < MIN_FILLED_AREA {
        let (min, max) = image
            .pixels()
            .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
        if min == max {
            debug!("Uniform image, nothing to threshold");
            return None;
        }
        let level = otsu_level(image);
        debug!(
            "Edge fill covered {} px, falling back to Otsu threshold {}",
            filled.count(),
            level
        );
        filled = Mask::from_image(image, |v| v > level);
    }

    let cleaned = close(&filled, CLOSING_RADIUS);
    largest_component(&cleaned)
}

/// Keep the 8-connected component with the most pixels.
///
/// Labels are numbered in raster order, so on equal areas the component
/// reached first by a row-major scan wins.
pub fn largest_component(mask: &Mask) -> Option<Mask> {
    let labels = connected_components(&mask.to_image(), Connectivity::Eight, Luma([0u8]));

    let count = labels.pixels().map(|p| p[0]).max().unwrap_or(0) as usize;
    if count == 0 {
        return None;
    }

    let mut areas = vec![0usize; count + 1];
    for pixel in labels.pixels() {
        areas[pixel[0] as usize] += 1;
    }

    let mut best = 1;
    for label in 2..=count {
        if areas[label] > areas[best] {
            best = label;
        }
    }
    debug!("{} component(s), keeping label {} ({} px)", count, best, areas[best]);

    let best = best as u32;
    Some(Mask::from_fn(mask.width(), mask.height(), |x, y| {
        labels.get_pixel(x, y)[0] == best
    }))
}
