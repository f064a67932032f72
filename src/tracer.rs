//! The tracing façade: parameters, the Unloaded → Loaded → Processed
//! state machine, and SVG output for a single threshold.

use crate::bitmap::{Bitmap, ImageData};
use crate::curve::{self, Curve};
use crate::decompose::{Contour, Decomposer, Sign, TurnPolicy};
use crate::error::{Error, Result};
use crate::histogram::Histogram;
use crate::polygon;
use crate::svg;
use serde::{Deserialize, Serialize};

/// Fallback binarization cutoff when the histogram offers no threshold
/// (single-color images).
const DEFAULT_THRESHOLD: f64 = 128.0;

/// Binarization cutoff: a fixed luminance level or automatic selection
/// from the histogram. Serialized as a number, with -1 meaning auto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub enum Threshold {
    Auto,
    Value(f64),
}

impl From<f64> for Threshold {
    fn from(value: f64) -> Self {
        if value == -1.0 {
            Threshold::Auto
        } else {
            Threshold::Value(value)
        }
    }
}

impl From<Threshold> for f64 {
    fn from(threshold: Threshold) -> Self {
        match threshold {
            Threshold::Auto => -1.0,
            Threshold::Value(value) => value,
        }
    }
}

/// Fill specification for path and background colors. Serialized as a
/// CSS string, with `"auto"` and `"transparent"` as sentinels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Fill {
    Auto,
    Transparent,
    Color(String),
}

impl From<String> for Fill {
    fn from(value: String) -> Self {
        match value.as_str() {
            "auto" => Fill::Auto,
            "transparent" => Fill::Transparent,
            _ => Fill::Color(value),
        }
    }
}

impl From<&str> for Fill {
    fn from(value: &str) -> Self {
        Fill::from(value.to_string())
    }
}

impl From<Fill> for String {
    fn from(fill: Fill) -> Self {
        match fill {
            Fill::Auto => "auto".to_string(),
            Fill::Transparent => "transparent".to_string(),
            Fill::Color(color) => color,
        }
    }
}

/// Tracing parameters. Validated on every `set_parameters` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceParams {
    /// Resolves ambiguous contour turns.
    pub turn_policy: TurnPolicy,
    /// Contours enclosing no more than this many pixels are dropped.
    pub turd_size: u32,
    /// Corner threshold in the smoothing stage, 0 to 4/3.
    pub alpha_max: f64,
    /// Enables the curve optimization pass.
    pub opt_curve: bool,
    /// Allowed fitting error during curve optimization.
    pub opt_tolerance: f64,
    /// Binarization cutoff.
    pub threshold: Threshold,
    /// Trace dark pixels (true) or light pixels (false).
    pub black_on_white: bool,
    /// Path fill in document output.
    pub color: Fill,
    /// Background rect fill; `transparent` omits the rect.
    pub background: Fill,
    /// Output width; `None` keeps the source width.
    pub width: Option<u32>,
    /// Output height; `None` keeps the source height.
    pub height: Option<u32>,
}

impl Default for TraceParams {
    fn default() -> Self {
        TraceParams {
            turn_policy: TurnPolicy::Minority,
            turd_size: 2,
            alpha_max: 1.0,
            opt_curve: true,
            opt_tolerance: 0.2,
            threshold: Threshold::Auto,
            black_on_white: true,
            color: Fill::Auto,
            background: Fill::Transparent,
            width: None,
            height: None,
        }
    }
}

impl TraceParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.3334).contains(&self.alpha_max) || !self.alpha_max.is_finite() {
            return Err(Error::invalid_parameter(
                "alpha_max",
                format!("{} is outside 0..=1.3334", self.alpha_max),
            ));
        }
        if !(self.opt_tolerance > 0.0) || !self.opt_tolerance.is_finite() {
            return Err(Error::invalid_parameter(
                "opt_tolerance",
                format!("{} is not a positive number", self.opt_tolerance),
            ));
        }
        if let Threshold::Value(value) = self.threshold {
            if !(0.0..=255.0).contains(&value) || !value.is_finite() {
                return Err(Error::invalid_parameter(
                    "threshold",
                    format!("{value} is outside 0..=255"),
                ));
            }
        }
        Ok(())
    }

    /// True when `other` differs in a parameter that changes geometry and
    /// therefore invalidates processed contours.
    fn geometry_differs(&self, other: &TraceParams) -> bool {
        self.turn_policy != other.turn_policy
            || self.turd_size != other.turd_size
            || self.alpha_max != other.alpha_max
            || self.opt_curve != other.opt_curve
            || self.opt_tolerance != other.opt_tolerance
            || self.threshold != other.threshold
            || self.black_on_white != other.black_on_white
    }
}

/// Resolve the effective path fill for document output.
pub(crate) fn resolve_fill(params: &TraceParams) -> String {
    match &params.color {
        Fill::Auto => {
            if params.black_on_white {
                "black".to_string()
            } else {
                "white".to_string()
            }
        }
        Fill::Transparent => "transparent".to_string(),
        Fill::Color(color) => color.clone(),
    }
}

/// Token handed out by [`Tracer::begin_load`]; completing a load with a
/// stale token fails with [`Error::Superseded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadToken(u64);

/// Single-threshold tracer.
///
/// Processing is lazy: the first output request after a load or a
/// geometry parameter change runs the pipeline and caches the curves.
#[derive(Debug, Clone)]
pub struct Tracer {
    params: TraceParams,
    luminance: Option<Bitmap>,
    histogram: Option<Histogram>,
    curves: Vec<Curve>,
    processed: bool,
    generation: u64,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracer {
    pub fn new() -> Self {
        Tracer {
            params: TraceParams::default(),
            luminance: None,
            histogram: None,
            curves: Vec::new(),
            processed: false,
            generation: 0,
        }
    }

    pub fn with_params(params: TraceParams) -> Result<Self> {
        params.validate()?;
        Ok(Tracer {
            params,
            ..Self::new()
        })
    }

    pub fn params(&self) -> &TraceParams {
        &self.params
    }

    /// Replace the parameters. Geometry-affecting changes drop cached
    /// curves; setting identical parameters is a no-op.
    pub fn set_parameters(&mut self, params: TraceParams) -> Result<()> {
        params.validate()?;
        if self.params.geometry_differs(&params) {
            self.curves.clear();
            self.processed = false;
        }
        self.params = params;
        Ok(())
    }

    /// Load a decoded RGBA image, discarding any processed data.
    pub fn load_image(&mut self, image: &ImageData) {
        self.load_bitmap(Bitmap::from_rgba(image));
    }

    /// Load an already-built luminance bitmap.
    pub fn load_bitmap(&mut self, bitmap: Bitmap) {
        self.generation += 1;
        self.install(bitmap);
    }

    /// Start an out-of-band load (e.g. an asynchronous decode). The
    /// returned token must be presented to [`Tracer::complete_load`]; any
    /// load started afterwards invalidates it.
    pub fn begin_load(&mut self) -> LoadToken {
        self.generation += 1;
        LoadToken(self.generation)
    }

    /// Finish a load begun with [`Tracer::begin_load`]. Fails with
    /// `Superseded` when a newer load has started since.
    pub fn complete_load(&mut self, token: LoadToken, image: &ImageData) -> Result<()> {
        if token.0 != self.generation {
            return Err(Error::Superseded);
        }
        self.install(Bitmap::from_rgba(image));
        Ok(())
    }

    fn install(&mut self, bitmap: Bitmap) {
        self.luminance = Some(bitmap);
        self.histogram = None;
        self.curves.clear();
        self.processed = false;
    }

    pub fn is_loaded(&self) -> bool {
        self.luminance.is_some()
    }

    /// Luminance histogram of the loaded image, built on first access.
    pub fn histogram(&mut self) -> Result<&Histogram> {
        if self.luminance.is_none() {
            return Err(Error::NotLoaded);
        }
        if self.histogram.is_none() {
            let histogram = Histogram::from_bitmap(self.luminance.as_ref().unwrap());
            self.histogram = Some(histogram);
        }
        Ok(self.histogram.as_ref().unwrap())
    }

    /// The binarization cutoff in effect: the fixed parameter, or the
    /// histogram's automatic threshold with a mid-range fallback.
    pub fn effective_threshold(&mut self) -> Result<f64> {
        match self.params.threshold {
            Threshold::Value(value) => Ok(value),
            Threshold::Auto => Ok(self
                .histogram()?
                .auto_threshold(0, 255)
                .map(f64::from)
                .unwrap_or(DEFAULT_THRESHOLD)),
        }
    }

    /// Run binarize → decompose → analyze, caching the resulting curves.
    fn process(&mut self) -> Result<()> {
        if self.processed {
            return Ok(());
        }

        let threshold = self.effective_threshold()?;
        let params = self.params.clone();
        let luminance = self.luminance.as_ref().ok_or(Error::NotLoaded)?;

        let binary = luminance.copy_map(|level| {
            let past = if params.black_on_white {
                level as f64 > threshold
            } else {
                (level as f64) < threshold
            };
            if past { 0 } else { 1 }
        });

        let contours = Decomposer::new(binary, params.turn_policy, params.turd_size).decompose();
        self.curves = contours
            .iter()
            .map(|contour| trace_contour(contour, &params))
            .collect();
        self.processed = true;
        Ok(())
    }

    /// Whether the analyzer has run for the current image and parameters.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub(crate) fn source_dimensions(&self) -> Result<(u32, u32)> {
        let luminance = self.luminance.as_ref().ok_or(Error::NotLoaded)?;
        Ok((luminance.width(), luminance.height()))
    }

    pub(crate) fn output_dimensions(&self) -> Result<(u32, u32, (f64, f64))> {
        let (source_width, source_height) = self.source_dimensions()?;
        let width = self.params.width.unwrap_or(source_width);
        let height = self.params.height.unwrap_or(source_height);
        let scale = (
            width as f64 / source_width as f64,
            height as f64 / source_height as f64,
        );
        Ok((width, height, scale))
    }

    pub(crate) fn path_tag_scaled(
        &mut self,
        fill: Option<&str>,
        scale: (f64, f64),
    ) -> Result<String> {
        self.process()?;
        Ok(svg::path_tag(&self.curves, scale, fill))
    }

    /// `<path>` element at source scale. `fill_override` replaces the
    /// configured color.
    pub fn get_path_tag(&mut self, fill_override: Option<&str>) -> Result<String> {
        let fill = match fill_override {
            Some(fill) => fill.to_string(),
            None => resolve_fill(&self.params),
        };
        self.path_tag_scaled(Some(&fill), (1.0, 1.0))
    }

    /// Full SVG document for the traced image. An all-background trace
    /// yields the document shell without any `<path>` element.
    pub fn get_svg(&mut self) -> Result<String> {
        let (width, height, scale) = self.output_dimensions()?;
        let fill = resolve_fill(&self.params);
        let tag = self.path_tag_scaled(Some(&fill), scale)?;

        let elements = if self.curves.is_empty() {
            Vec::new()
        } else {
            vec![tag]
        };

        let background = match &self.params.background {
            Fill::Auto | Fill::Transparent => None,
            Fill::Color(color) => Some(color.clone()),
        };

        Ok(svg::document(
            width,
            height,
            background.as_deref(),
            &elements,
        ))
    }

    /// `<symbol>` element with the given id, at source scale, without
    /// fill or background.
    pub fn get_symbol(&mut self, id: &str) -> Result<String> {
        let (width, height) = self.source_dimensions()?;
        let tag = self.path_tag_scaled(None, (1.0, 1.0))?;
        Ok(svg::symbol(id, width, height, &tag))
    }
}

/// Per-contour analysis pipeline: prefix sums, straight-subpath table,
/// optimal polygon, vertex adjustment, smoothing and optional curve
/// optimization.
fn trace_contour(contour: &Contour, params: &TraceParams) -> Curve {
    let points = &contour.points;
    let sums = polygon::prefix_sums(points);
    let lon = polygon::longest_straight(points);
    let poly = polygon::best_polygon(points, &sums, &lon);
    let mut vertices = polygon::adjust_vertices(points, &sums, &poly);

    // Holes run the other way so the even-odd fill rule cuts them out.
    if contour.sign == Sign::Minus {
        vertices.reverse();
    }

    let curve = curve::smooth(&vertices, params.alpha_max);
    if params.opt_curve {
        curve::optimize_curve(&curve, params.opt_tolerance)
    } else {
        curve
    }
}
