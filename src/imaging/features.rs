use image::GrayImage;
use imageproc::geometry;
use imageproc::point::Point;

use super::morphology::{fill_holes, Mask};

/// Names of the measured properties, in output order
pub const FEATURE_NAMES: [&str; 13] = [
    "area",
    "area_filled",
    "axis_major_length",
    "axis_minor_length",
    "eccentricity",
    "feret_diameter_max",
    "intensity_max",
    "intensity_mean",
    "intensity_median",
    "intensity_min",
    "intensity_std",
    "perimeter",
    "solidity",
];

/// Morphological and intensity properties of one particle mask
#[derive(Debug, Clone, PartialEq)]
pub struct RegionProperties {
    pub area: usize,
    pub area_filled: usize,
    pub axis_major_length: f64,
    pub axis_minor_length: f64,
    pub eccentricity: f64,
    pub feret_diameter_max: f64,
    pub intensity_max: f64,
    pub intensity_mean: f64,
    pub intensity_median: f64,
    pub intensity_min: f64,
    pub intensity_std: f64,
    pub perimeter: f64,
    pub solidity: f64,
}

impl RegionProperties {
    /// Values paired with [`FEATURE_NAMES`]
    pub fn values(&self) -> [f64; 13] {
        [
            self.area as f64,
            self.area_filled as f64,
            self.axis_major_length,
            self.axis_minor_length,
            self.eccentricity,
            self.feret_diameter_max,
            self.intensity_max,
            self.intensity_mean,
            self.intensity_median,
            self.intensity_min,
            self.intensity_std,
            self.perimeter,
            self.solidity,
        ]
    }
}

/// Measure a mask against its intensity image.
///
/// Intensities are reported as fractions of full scale. Returns `None` for an
/// empty mask.
pub fn measure_region(mask: &Mask, intensity: &GrayImage) -> Option<RegionProperties> {
    let pixels: Vec<(u32, u32)> = mask.pixels().collect();
    if pixels.is_empty() {
        return None;
    }
    let area = pixels.len();

    let (major, minor, eccentricity) = inertia_axes(&pixels);
    let hull = convex_hull(&corner_points(mask));
    let hull_area = pixels_inside_hull(mask, &hull);
    let stats = intensity_stats(&pixels, intensity);

    Some(RegionProperties {
        area,
        area_filled: fill_holes(mask).count(),
        axis_major_length: major,
        axis_minor_length: minor,
        eccentricity,
        feret_diameter_max: feret_diameter(&hull),
        intensity_max: stats.max,
        intensity_mean: stats.mean,
        intensity_median: stats.median,
        intensity_min: stats.min,
        intensity_std: stats.std,
        perimeter: perimeter(mask),
        solidity: area as f64 / hull_area.max(area) as f64,
    })
}

/// Axis lengths and eccentricity of the ellipse with the same normalized
/// second central moments as the region.
fn inertia_axes(pixels: &[(u32, u32)]) -> (f64, f64, f64) {
    let n = pixels.len() as f64;
    let (sum_x, sum_y) = pixels
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    let (mean_x, mean_y) = (sum_x / n, sum_y / n);

    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for &(x, y) in pixels {
        let dx = x as f64 - mean_x;
        let dy = y as f64 - mean_y;
        sxx += dx * dx;
        syy += dy * dy;
        sxy += dx * dy;
    }
    let (sxx, syy, sxy) = (sxx / n, syy / n, sxy / n);

    let half_trace = (sxx + syy) / 2.0;
    let spread = (((sxx - syy) / 2.0).powi(2) + sxy * sxy).sqrt();
    let l1 = half_trace + spread;
    let l2 = (half_trace - spread).max(0.0);

    let eccentricity = if l1 > 0.0 { (1.0 - l2 / l1).sqrt() } else { 0.0 };
    (4.0 * l1.sqrt(), 4.0 * l2.sqrt(), eccentricity)
}

/// Corners of the pixel squares on the left and right ends of every row,
/// in doubled coordinates so that they stay integral.
fn corner_points(mask: &Mask) -> Vec<(i64, i64)> {
    let mut points = Vec::new();
    for y in 0..mask.height() {
        let mut row = (0..mask.width()).filter(|&x| mask.get(x, y));
        let Some(first) = row.next() else {
            continue;
        };
        let last = row.last().unwrap_or(first);
        for x in [first, last] {
            let (cx, cy) = (2 * x as i64, 2 * y as i64);
            points.extend([
                (cx - 1, cy - 1),
                (cx + 1, cy - 1),
                (cx - 1, cy + 1),
                (cx + 1, cy + 1),
            ]);
        }
    }
    points
}

fn cross(o: (i64, i64), a: (i64, i64), b: (i64, i64)) -> i64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Hull vertices of the corner points
fn convex_hull(points: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let mut points: Vec<Point<i64>> = points.iter().map(|&(x, y)| Point::new(x, y)).collect();
    points.sort_unstable_by_key(|p| (p.x, p.y));
    points.dedup();
    if points.len() < 3 {
        return points.into_iter().map(|p| (p.x, p.y)).collect();
    }
    geometry::convex_hull(&points[..])
        .into_iter()
        .map(|p| (p.x, p.y))
        .collect()
}

/// Maximum caliper diameter, in pixels
fn feret_diameter(hull: &[(i64, i64)]) -> f64 {
    let mut best = 0i64;
    for (i, a) in hull.iter().enumerate() {
        for b in &hull[i + 1..] {
            let (dx, dy) = (a.0 - b.0, a.1 - b.1);
            best = best.max(dx * dx + dy * dy);
        }
    }
    (best as f64).sqrt() / 2.0
}

/// Number of pixels whose centre lies inside or on the hull
fn pixels_inside_hull(mask: &Mask, hull: &[(i64, i64)]) -> usize {
    if hull.len() < 3 {
        return 0;
    }
    let (min_x, max_x) = hull.iter().fold((i64::MAX, i64::MIN), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
    let (min_y, max_y) = hull.iter().fold((i64::MAX, i64::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));

    let mut count = 0;
    for y in 0..mask.height() as i64 {
        let cy = 2 * y;
        if cy < min_y || cy > max_y {
            continue;
        }
        for x in 0..mask.width() as i64 {
            let cx = 2 * x;
            if cx < min_x || cx > max_x {
                continue;
            }
            let sides = (0..hull.len()).map(|i| cross(hull[i], hull[(i + 1) % hull.len()], (cx, cy)));
            let (mut left, mut right) = (false, false);
            for side in sides {
                left |= side > 0;
                right |= side < 0;
            }
            let inside = !(left && right);
            if inside {
                count += 1;
            }
        }
    }
    count
}

/// Perimeter from the 4-connected inner border, each border pixel weighted by
/// the configuration of its bordering neighbours.
fn perimeter(mask: &Mask) -> f64 {
    let is_set = |x: i64, y: i64| mask.get_signed(x, y) == Some(true);
    let is_border = |x: i64, y: i64| {
        is_set(x, y) && [(-1, 0), (1, 0), (0, -1), (0, 1)].iter().any(|&(dx, dy)| !is_set(x + dx, y + dy))
    };

    let mut total = 0.0;
    for y in 0..mask.height() as i64 {
        for x in 0..mask.width() as i64 {
            if !is_border(x, y) {
                continue;
            }
            let mut code = 1;
            for (dx, dy) in [(-1, 0), (1, 0), (0, -1), (0, 1)] {
                if is_border(x + dx, y + dy) {
                    code += 2;
                }
            }
            for (dx, dy) in [(-1, -1), (1, -1), (-1, 1), (1, 1)] {
                if is_border(x + dx, y + dy) {
                    code += 10;
                }
            }
            total += match code {
                5 | 7 | 15 | 17 | 25 | 27 => 1.0,
                21 | 33 => std::f64::consts::SQRT_2,
                13 | 23 => (1.0 + std::f64::consts::SQRT_2) / 2.0,
                _ => 0.0,
            };
        }
    }
    total
}

struct IntensityStats {
    max: f64,
    mean: f64,
    median: f64,
    min: f64,
    std: f64,
}

fn intensity_stats(pixels: &[(u32, u32)], intensity: &GrayImage) -> IntensityStats {
    let mut values: Vec<f64> = pixels
        .iter()
        .map(|&(x, y)| intensity.get_pixel(x, y)[0] as f64 / 255.0)
        .collect();
    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    let mean = values.iter().sum::<f64>() / n as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
    let median = if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    };

    IntensityStats {
        max: values[n - 1],
        mean,
        median,
        min: values[0],
        std: variance.sqrt(),
    }
}
