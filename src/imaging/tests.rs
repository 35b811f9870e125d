use super::*;
use image::{GrayImage, Luma};
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

fn disk_image(size: u32, radius: i32) -> GrayImage {
    let mut image = GrayImage::from_pixel(size, size, Luma([10u8]));
    let centre = (size as i32 / 2, size as i32 / 2);
    draw_filled_circle_mut(&mut image, centre, radius, Luma([220u8]));
    image
}

fn square_image() -> GrayImage {
    let mut image = GrayImage::from_pixel(40, 40, Luma([0u8]));
    draw_filled_rect_mut(&mut image, Rect::at(10, 10).of_size(20, 20), Luma([200u8]));
    image
}

#[test]
fn test_disk_segmentation() {
    let image = disk_image(120, 30);
    let true_area = Mask::from_image(&image, |v| v > 100).count() as f64;

    let properties = extract_features(&image).unwrap();
    let area = properties.area as f64;
    assert!(
        (area - true_area).abs() / true_area < 0.15,
        "area {} vs true {}",
        area,
        true_area
    );
    assert!(properties.eccentricity < 0.1, "eccentricity {}", properties.eccentricity);
    assert!((properties.axis_major_length - properties.axis_minor_length).abs() < 2.0);
    assert!(properties.solidity > 0.9 && properties.solidity <= 1.0);
    assert_eq!(properties.area_filled, properties.area);
}

#[test]
fn test_blank_image_has_no_particle() {
    let image = GrayImage::from_pixel(32, 32, Luma([50u8]));
    assert!(segment_particle(&image).is_none());
    assert!(matches!(extract_features(&image), Err(ImagingError::NoParticle)));

    let empty = GrayImage::new(0, 0);
    assert!(matches!(extract_features(&empty), Err(ImagingError::EmptyImage { .. })));
}

#[test]
fn test_square_intensity_statistics() {
    let image = square_image();
    let properties = extract_features(&image).unwrap();

    assert!(properties.area >= 400);
    assert!((properties.intensity_max - 200.0 / 255.0).abs() < 1e-9);
    assert!(properties.intensity_min <= properties.intensity_median);
    assert!(properties.intensity_median <= properties.intensity_max);
    assert!(properties.intensity_std >= 0.0);
}

#[test]
fn test_measure_exact_square() {
    let mask = Mask::from_fn(10, 10, |x, y| (2..6).contains(&x) && (3..7).contains(&y));
    let intensity = GrayImage::from_fn(10, 10, |x, _| Luma([(x * 25) as u8]));

    let p = measure_region(&mask, &intensity).unwrap();
    assert_eq!(p.area, 16);
    assert_eq!(p.area_filled, 16);
    assert!((p.solidity - 1.0).abs() < 1e-12);
    assert!(p.eccentricity.abs() < 1e-12);
    // Four consecutive coordinates have variance 1.25 on each axis
    assert!((p.axis_major_length - 4.0 * 1.25f64.sqrt()).abs() < 1e-9);
    // Diagonal of the 4x4 pixel square
    assert!((p.feret_diameter_max - 32f64.sqrt()).abs() < 1e-9);
    // Columns 2..6 scaled by 25/255
    assert!((p.intensity_min - 50.0 / 255.0).abs() < 1e-12);
    assert!((p.intensity_max - 125.0 / 255.0).abs() < 1e-12);
    assert!((p.intensity_median - 87.5 / 255.0).abs() < 1e-12);
    // Twelve border pixels, each in a straight-run configuration
    assert!((p.perimeter - 12.0).abs() < 1e-9, "perimeter {}", p.perimeter);
}

#[test]
fn test_ring_has_filled_area() {
    let mask = Mask::from_fn(9, 9, |x, y| {
        ((x == 2 || x == 6) && (2..=6).contains(&y)) || ((y == 2 || y == 6) && (2..=6).contains(&x))
    });
    let intensity = GrayImage::from_pixel(9, 9, Luma([255u8]));
    let p = measure_region(&mask, &intensity).unwrap();
    assert_eq!(p.area, 16);
    assert_eq!(p.area_filled, 25);
    assert!(p.solidity < 1.0);
}

#[test]
fn test_fill_holes_ignores_open_shapes() {
    let open = Mask::from_fn(7, 7, |x, y| {
        ((x == 1 || x == 5) && (1..=5).contains(&y)) || (y == 5 && (1..=5).contains(&x))
    });
    assert_eq!(fill_holes(&open).count(), open.count());
}

#[test]
fn test_largest_component_tie_breaks_on_raster_order() {
    // Two 3x3 squares of equal area; the upper-left one is reached first
    let mask = Mask::from_fn(12, 12, |x, y| {
        ((1..4).contains(&x) && (1..4).contains(&y)) || ((7..10).contains(&x) && (7..10).contains(&y))
    });
    let largest = largest_component(&mask).unwrap();
    assert_eq!(largest.count(), 9);
    assert!(largest.get(1, 1));
    assert!(!largest.get(8, 8));
}

#[test]
fn test_largest_component_prefers_area() {
    let mask = Mask::from_fn(12, 12, |x, y| {
        ((0..2).contains(&x) && (0..2).contains(&y)) || ((5..10).contains(&x) && (5..10).contains(&y))
    });
    let largest = largest_component(&mask).unwrap();
    assert_eq!(largest.count(), 25);
    assert!(largest_component(&Mask::new(4, 4)).is_none());
}

#[test]
fn test_closing_bridges_small_gaps() {
    // Two bars separated by a one-pixel gap merge after closing
    let mask = Mask::from_fn(20, 9, |x, y| (3..6).contains(&y) && ((2..9).contains(&x) || (10..17).contains(&x)));
    let closed = close(&mask, 2);
    assert!(closed.get(9, 4));
    assert_eq!(largest_component(&closed).unwrap().count(), closed.count());
}

#[test]
fn test_closing_keeps_isolated_pixels_and_region() {
    let mut dot = Mask::new(9, 9);
    dot.set(4, 4, true);
    assert_eq!(close(&dot, 2), dot);

    let disk = Mask::from_fn(11, 11, |x, y| {
        let (dx, dy) = (x as i64 - 5, y as i64 - 5);
        dx * dx + dy * dy <= 4
    });
    let closed = close(&disk, 2);
    assert!(disk.pixels().all(|(x, y)| closed.get(x, y)));
    assert!(!closed.get(0, 0));
}

#[test]
fn test_feature_row_naming() {
    let image = square_image();
    let properties = extract_features(&image).unwrap();
    let row = feature_row("sample_a", "17", &properties);

    let names: Vec<&str> = row.iter().map(|(name, _)| name).collect();
    assert_eq!(names[0], "sample_id");
    assert_eq!(names[1], "object_id");
    assert_eq!(names[2], "object_area");
    assert_eq!(names.len(), 2 + FEATURE_NAMES.len());
    assert_eq!(
        row.get("object_id").and_then(|c| c.as_str()),
        Some("sample_a_17")
    );
}

#[test]
fn test_process_image_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("42.png");
    square_image().save(&path).unwrap();

    let row = process_image_file(&path, "s").unwrap();
    assert_eq!(row.get("object_id").and_then(|c| c.as_str()), Some("s_42"));

    let broken = dir.path().join("43.png");
    std::fs::write(&broken, b"not a png").unwrap();
    assert!(matches!(
        process_image_file(&broken, "s"),
        Err(ImagingError::ImageError(_))
    ));
}
