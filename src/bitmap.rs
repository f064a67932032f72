//! Byte-per-pixel 2D grids: luminance bitmaps, binary (0/1) bitmaps, and
//! the RGBA input record they are built from.

use crate::error::Result;
use crate::geometry::IntPoint;
use rgb::RGBA8;

/// Decoded RGBA image handed to the tracer.
#[derive(Debug, Clone)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<RGBA8>,
}

impl ImageData {
    pub fn new(width: u32, height: u32, pixels: Vec<RGBA8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height) as usize);
        ImageData {
            width,
            height,
            pixels,
        }
    }

    /// Build from a flat RGBA byte buffer of length `width * height * 4`.
    pub fn from_raw_rgba(width: u32, height: u32, data: &[u8]) -> Self {
        let pixels = data
            .chunks_exact(4)
            .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
            .collect();
        ImageData::new(width, height, pixels)
    }
}

/// Decode an image file into RGBA pixels.
///
/// This is the only place the library touches the filesystem; the core
/// pipeline consumes `ImageData` or `Bitmap` values directly.
pub fn load_image(path: &std::path::Path) -> Result<ImageData> {
    let decoded = image::open(path)?.into_rgba8();
    let (width, height) = (decoded.width(), decoded.height());
    Ok(ImageData::from_raw_rgba(width, height, decoded.as_raw()))
}

/// 2D grid of bytes; holds luminance levels (0-255) or binary 0/1 values
/// depending on the pipeline stage.
#[derive(Debug, Clone)]
pub struct Bitmap {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Bitmap {
    /// All-zero bitmap of the given dimensions.
    pub fn new(width: u32, height: u32) -> Self {
        Bitmap {
            width,
            height,
            data: vec![0; (width * height) as usize],
        }
    }

    /// Luminance bitmap from RGBA pixels. Pixels are composited over a
    /// white background before the rec. 709 luma weighting, so fully
    /// transparent regions read as white.
    pub fn from_rgba(image: &ImageData) -> Self {
        let data = image
            .pixels
            .iter()
            .map(|p| {
                let opacity = p.a as f64 / 255.0;
                let r = 255.0 + (p.r as f64 - 255.0) * opacity;
                let g = 255.0 + (p.g as f64 - 255.0) * opacity;
                let b = 255.0 + (p.b as f64 - 255.0) * opacity;
                luminance(r, g, b)
            })
            .collect();

        Bitmap {
            width: image.width,
            height: image.height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn index_to_point(&self, index: usize) -> IntPoint {
        let w = self.width as usize;
        IntPoint::new((index % w) as i32, (index / w) as i32)
    }

    /// Read the value at `(x, y)`. Out-of-range reads yield 0; the contour
    /// decomposer relies on everything beyond the edges being background.
    pub fn get(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[self.index(x as u32, y as u32)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let index = self.index(x, y);
        self.data[index] = value;
    }

    /// Copy of the bitmap with every byte passed through `map`; used to
    /// binarize a luminance bitmap against a threshold.
    pub fn copy_map(&self, map: impl Fn(u8) -> u8) -> Bitmap {
        Bitmap {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| map(v)).collect(),
        }
    }
}

fn luminance(r: f64, g: f64, b: f64) -> u8 {
    (0.2126 * r + 0.7153 * g + 0.0721 * b).round().min(255.0) as u8
}
