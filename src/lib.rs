//! vectrace - a potrace-style bitmap tracer
//!
//! This library turns raster images into compact SVGs whose paths follow
//! the image's silhouettes as smooth Bézier curves.
//!
//! ## Features
//!
//! - **Automatic binarization** via multilevel Otsu thresholding
//! - **Edge-following contour decomposition** with configurable turn policies
//! - **Optimal polygon fitting** by dynamic programming, with least-squares
//!   vertex adjustment, corner detection and Bézier curve optimization
//! - **Posterization**: several tonal layers composited with calculated
//!   opacities to approximate continuous tone
//!
//! ## Example
//!
//! ```rust
//! use vectrace::{ImageData, TraceParams, Tracer};
//!
//! // A 2x2 opaque black image.
//! let image = ImageData::from_raw_rgba(2, 2, &[0, 0, 0, 255].repeat(4));
//!
//! let mut tracer = Tracer::with_params(TraceParams::default()).unwrap();
//! tracer.load_image(&image);
//! let svg = tracer.get_svg().unwrap();
//! assert!(svg.contains("<path"));
//! ```

pub mod bitmap;
pub mod curve;
pub mod decompose;
pub mod error;
pub mod geometry;
pub mod histogram;
pub mod polygon;
pub mod posterizer;
pub mod svg;
pub mod tracer;

pub use bitmap::{Bitmap, ImageData, load_image};
pub use decompose::TurnPolicy;
pub use error::{Error, Result};
pub use histogram::Histogram;
pub use posterizer::{
    FillStrategy, PosterizeParams, Posterizer, RangeDistribution, Steps,
};
pub use tracer::{Fill, Threshold, TraceParams, Tracer};

/// Trace an image into a full SVG document in one call.
pub fn trace(image: &ImageData, params: &TraceParams) -> Result<String> {
    let mut tracer = Tracer::with_params(params.clone())?;
    tracer.load_image(image);
    tracer.get_svg()
}

/// Posterize an image into a layered SVG document in one call.
pub fn posterize(image: &ImageData, params: &PosterizeParams) -> Result<String> {
    let mut posterizer = Posterizer::with_params(params.clone())?;
    posterizer.load_image(image);
    posterizer.get_svg()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_convenience() {
        let image = ImageData::from_raw_rgba(2, 2, &[0, 0, 0, 255].repeat(4));
        let svg = trace(&image, &TraceParams::default()).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<path"));
    }

    #[test]
    fn test_posterize_convenience() {
        let image = ImageData::from_raw_rgba(2, 2, &[0, 0, 0, 255].repeat(4));
        let svg = posterize(&image, &PosterizeParams::default()).unwrap();
        assert!(svg.starts_with("<svg"));
    }

    #[test]
    fn test_trace_rejects_invalid_params() {
        let image = ImageData::from_raw_rgba(2, 2, &[0, 0, 0, 255].repeat(4));
        let params = TraceParams {
            alpha_max: 9.0,
            ..TraceParams::default()
        };
        assert!(trace(&image, &params).is_err());
    }
}
