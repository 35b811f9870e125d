use std::fs::File;
use std::io;
use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use log::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::tsv::write_tsv_file;
use super::ExportError;
use crate::table::{write_atomically, FeatureTable};

/// Height of the white strip appended below each image
pub const SCALE_STRIP_HEIGHT: u32 = 31;

const BAR_THICKNESS: u32 = 5;
const BAR_MARGIN: u32 = 5;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Scale bar length in pixels, at least one
pub fn scale_bar_length(pixel_size_um: f64, scale_bar_um: f64) -> u32 {
    (scale_bar_um / pixel_size_um).round().max(1.0) as u32
}

/// Copy of `image` with a white strip at the bottom holding a black scale bar.
///
/// The bar is clipped to the image width.
pub fn annotate_with_scale_bar(image: &DynamicImage, pixel_size_um: f64, scale_bar_um: f64) -> RgbImage {
    let source = image.to_rgb8();
    let (width, height) = source.dimensions();

    let mut annotated = RgbImage::from_pixel(width, height + SCALE_STRIP_HEIGHT, WHITE);
    image::imageops::replace(&mut annotated, &source, 0, 0);

    let x = if width > 2 * BAR_MARGIN { BAR_MARGIN } else { 0 };
    let length = scale_bar_length(pixel_size_um, scale_bar_um).min((width - x).max(1));
    let y = height + (SCALE_STRIP_HEIGHT - BAR_THICKNESS) / 2;
    draw_filled_rect_mut(
        &mut annotated,
        Rect::at(x as i32, y as i32).of_size(length, BAR_THICKNESS),
        BLACK,
    );

    annotated
}

/// Write `ecotaxa_<sample>.zip`: the table plus every image it references,
/// annotated with a scale bar.
///
/// Annotated copies are staged in a temporary directory next to the archive
/// and removed once it is written. Returns the number of images archived.
pub fn write_bundle(
    table: &FeatureTable,
    sample: &str,
    image_dir: &Path,
    pixel_size_um: f64,
    scale_bar_um: f64,
    zip_path: &Path,
) -> Result<usize, ExportError> {
    let dir = zip_path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let staging = tempfile::Builder::new().prefix(".bundle-").tempdir_in(dir)?;

    let tsv_name = format!("ecotaxa_{}.tsv", sample);
    write_tsv_file(table, &staging.path().join(&tsv_name))?;
    let mut entries = vec![tsv_name];

    let names: Vec<String> = match table.column("img_file_name") {
        Some(cells) => cells.filter_map(|c| c.as_str().map(str::to_string)).collect(),
        None => Vec::new(),
    };
    for name in names {
        let source = image_dir.join(&name);
        let image = image::open(&source).map_err(|e| ExportError::UnreadableImage {
            path: source.clone(),
            source: e,
        })?;
        annotate_with_scale_bar(&image, pixel_size_um, scale_bar_um).save(staging.path().join(&name))?;
        entries.push(name);
    }

    write_atomically(zip_path, |file| -> Result<(), ExportError> {
        let mut zip_writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644);
        for name in &entries {
            zip_writer.start_file(name.as_str(), options)?;
            let mut staged = File::open(staging.path().join(name))?;
            io::copy(&mut staged, &mut zip_writer)?;
        }
        zip_writer.finish()?;
        Ok(())
    })?;

    let images = entries.len() - 1;
    debug!("Archived {} image(s) for sample '{}'", images, sample);
    staging.close()?;
    Ok(images)
}
