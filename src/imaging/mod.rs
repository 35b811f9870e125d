//! # Particle Imaging
//!
//! Segmentation and measurement of single-particle images.
//!
//! Each image is reduced to one binary mask (the particle) by
//! [`segment_particle`]:
//!
//! ```text
//! grayscale ──canny──▶ edges ──fill──▶ regions ──(< 10 px? otsu)──▶
//!           ──closing(disk 2)──▶ 8-connected labels ──▶ largest component
//! ```
//!
//! and the mask is measured by [`measure_region`] into the 13 properties of
//! [`FEATURE_NAMES`], reported as `object_<name>` columns by
//! [`feature_row`].

mod error;
mod features;
mod morphology;
mod segment;

#[cfg(test)]
mod tests;

pub use error::ImagingError;
pub use features::{measure_region, RegionProperties, FEATURE_NAMES};
pub use morphology::{close, fill_holes, Mask};
pub use segment::{largest_component, segment_particle, MIN_FILLED_AREA};

use std::path::Path;

use image::GrayImage;

use crate::table::FeatureRow;

/// Segment and measure one image.
pub fn extract_features(image: &GrayImage) -> Result<RegionProperties, ImagingError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ImagingError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }
    let mask = segment_particle(image).ok_or(ImagingError::NoParticle)?;
    measure_region(&mask, image).ok_or(ImagingError::NoParticle)
}

/// Decode an image file to 8-bit grayscale
pub fn load_grayscale(path: &Path) -> Result<GrayImage, ImagingError> {
    Ok(image::open(path)?.to_luma8())
}

/// Feature row for one particle: `sample_id`, `object_id`, then `object_<feature>`
pub fn feature_row(sample_id: &str, particle_id: &str, properties: &RegionProperties) -> FeatureRow {
    let mut row = FeatureRow::keyed("sample_id", sample_id);
    row.set("object_id", format!("{}_{}", sample_id, particle_id));
    for (name, value) in FEATURE_NAMES.iter().zip(properties.values()) {
        row.set(&format!("object_{}", name), value);
    }
    row
}

/// Load, segment and measure one particle image file.
///
/// The particle id is the file stem.
pub fn process_image_file(path: &Path, sample_id: &str) -> Result<FeatureRow, ImagingError> {
    let particle_id = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let image = load_grayscale(path)?;
    let properties = extract_features(&image)?;
    Ok(feature_row(sample_id, &particle_id, &properties))
}
