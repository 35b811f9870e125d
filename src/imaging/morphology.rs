use std::collections::VecDeque;

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::morphology;

/// A binary raster, row-major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl Mask {
    /// All-false mask
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![false; width as usize * height as usize],
        }
    }

    /// Foreground wherever `predicate` holds for the pixel value
    pub fn from_image<F: Fn(u8) -> bool>(image: &GrayImage, predicate: F) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.pixels().map(|p| predicate(p[0])).collect(),
        }
    }

    /// Foreground wherever `f(x, y)` holds
    pub fn from_fn<F: Fn(u32, u32) -> bool>(width: u32, height: u32, f: F) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Value at `(x, y)`
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[self.index(x, y)]
    }

    /// Value at signed coordinates; out of bounds is `None`
    #[inline]
    pub fn get_signed(&self, x: i64, y: i64) -> Option<bool> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            None
        } else {
            Some(self.get(x as u32, y as u32))
        }
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let index = self.index(x, y);
        self.data[index] = value;
    }

    /// Number of foreground pixels
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// Coordinates of foreground pixels in raster order
    pub fn pixels(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let width = self.width as usize;
        self.data
            .iter()
            .enumerate()
            .filter(|(_, &v)| v)
            .map(move |(i, _)| ((i % width) as u32, (i / width) as u32))
    }

    /// Render as an 8-bit image, foreground 255
    pub fn to_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width, self.height, |x, y| {
            Luma([if self.get(x, y) { 255 } else { 0 }])
        })
    }
}

/// Binary closing with a disk of `radius` (Euclidean distance).
///
/// Pixels outside the image never erode the mask.
pub fn close(mask: &Mask, radius: u8) -> Mask {
    let closed = morphology::close(&mask.to_image(), Norm::L2, radius);
    Mask::from_image(&closed, |v| v > 0)
}

/// Fill every background pixel that is not 4-connected to the image border
/// through background pixels.
pub fn fill_holes(mask: &Mask) -> Mask {
    let (width, height) = (mask.width, mask.height);
    if width == 0 || height == 0 {
        return mask.clone();
    }
    let mut outside = Mask::new(width, height);
    let mut queue = VecDeque::new();

    let seed = |x: u32, y: u32, outside: &mut Mask, queue: &mut VecDeque<(u32, u32)>| {
        if !mask.get(x, y) && !outside.get(x, y) {
            outside.set(x, y, true);
            queue.push_back((x, y));
        }
    };

    for x in 0..width {
        seed(x, 0, &mut outside, &mut queue);
        if height > 1 {
            seed(x, height - 1, &mut outside, &mut queue);
        }
    }
    for y in 0..height {
        seed(0, y, &mut outside, &mut queue);
        if width > 1 {
            seed(width - 1, y, &mut outside, &mut queue);
        }
    }

    while let Some((x, y)) = queue.pop_front() {
        let neighbours = [
            (x as i64 - 1, y as i64),
            (x as i64 + 1, y as i64),
            (x as i64, y as i64 - 1),
            (x as i64, y as i64 + 1),
        ];
        for (nx, ny) in neighbours {
            if mask.get_signed(nx, ny) == Some(false) && !outside.get(nx as u32, ny as u32) {
                seed(nx as u32, ny as u32, &mut outside, &mut queue);
            }
        }
    }

    Mask {
        width,
        height,
        data: outside.data.iter().map(|&o| !o).collect(),
    }
}
