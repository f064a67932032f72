//! Multi-layer posterization: N tracer passes at thresholds derived from
//! the histogram, composited with one-pass layer opacities so stacked
//! translucent layers approximate continuous tone.

use crate::bitmap::{Bitmap, ImageData};
use crate::error::{Error, Result};
use crate::svg;
use crate::tracer::{Fill, Threshold, TraceParams, Tracer, resolve_fill};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Fallback cutoff mirroring the tracer's, used when the histogram offers
/// no automatic threshold.
const DEFAULT_THRESHOLD: f64 = 128.0;

/// Number of tonal layers: automatic, a count, or explicit thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Steps {
    #[default]
    Auto,
    Count(u32),
    Thresholds(Vec<u8>),
}

/// Rule selecting the representative color of a tonal range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStrategy {
    Spread,
    #[default]
    Dominant,
    Mean,
    Median,
}

/// How thresholds are distributed over the usable luminance range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeDistribution {
    #[default]
    Auto,
    Equal,
}

/// Posterization parameters: the embedded tracing parameters plus the
/// layering controls.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PosterizeParams {
    #[serde(flatten)]
    pub trace: TraceParams,
    pub steps: Steps,
    pub fill_strategy: FillStrategy,
    pub range_distribution: RangeDistribution,
}

/// One tonal range: the threshold that closes it and the normalized
/// intensity of its representative color (0 = invisible, 1 = fully
/// saturated toward the target color).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub value: f64,
    pub intensity: f64,
}

/// Multi-pass posterizing façade over a [`Tracer`].
#[derive(Debug, Clone)]
pub struct Posterizer {
    tracer: Tracer,
    steps: Steps,
    fill_strategy: FillStrategy,
    range_distribution: RangeDistribution,
    calculated_threshold: Option<f64>,
}

impl Default for Posterizer {
    fn default() -> Self {
        Self::new()
    }
}

fn level_of(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

impl Posterizer {
    pub fn new() -> Self {
        Posterizer {
            tracer: Tracer::new(),
            steps: Steps::Auto,
            fill_strategy: FillStrategy::Dominant,
            range_distribution: RangeDistribution::Auto,
            calculated_threshold: None,
        }
    }

    pub fn with_params(params: PosterizeParams) -> Result<Self> {
        let mut posterizer = Self::new();
        posterizer.set_parameters(params)?;
        Ok(posterizer)
    }

    pub fn params(&self) -> PosterizeParams {
        PosterizeParams {
            trace: self.tracer.params().clone(),
            steps: self.steps.clone(),
            fill_strategy: self.fill_strategy,
            range_distribution: self.range_distribution,
        }
    }

    pub fn set_parameters(&mut self, params: PosterizeParams) -> Result<()> {
        if let Steps::Count(count) = params.steps {
            if !(1..=255).contains(&count) {
                return Err(Error::invalid_parameter(
                    "steps",
                    format!("{count} is outside 1..=255"),
                ));
            }
        }
        self.tracer.set_parameters(params.trace)?;
        self.steps = params.steps;
        self.fill_strategy = params.fill_strategy;
        self.range_distribution = params.range_distribution;
        self.calculated_threshold = None;
        Ok(())
    }

    pub fn load_image(&mut self, image: &ImageData) {
        self.tracer.load_image(image);
        self.calculated_threshold = None;
    }

    pub fn load_bitmap(&mut self, bitmap: Bitmap) {
        self.tracer.load_bitmap(bitmap);
        self.calculated_threshold = None;
    }

    pub fn is_loaded(&self) -> bool {
        self.tracer.is_loaded()
    }

    /// The threshold bounding the most saturated layer. For an automatic
    /// threshold this splits the histogram three ways and keeps the cut
    /// nearest the traced extreme.
    fn effective_threshold(&mut self) -> Result<f64> {
        if let Some(threshold) = self.calculated_threshold {
            return Ok(threshold);
        }

        let threshold = match self.tracer.params().threshold {
            Threshold::Value(value) => value,
            Threshold::Auto => {
                let black_on_white = self.tracer.params().black_on_white;
                let pair = self.tracer.histogram()?.multilevel_thresholds(2, 0, 255);
                let pick = if black_on_white { pair.get(1) } else { pair.get(0) };
                pick.copied().map(f64::from).unwrap_or(DEFAULT_THRESHOLD)
            }
        };

        self.calculated_threshold = Some(threshold);
        Ok(threshold)
    }

    /// Width of the luminance range available for layering.
    fn usable_range(&mut self) -> Result<f64> {
        let threshold = self.effective_threshold()?;
        Ok(if self.tracer.params().black_on_white {
            threshold
        } else {
            255.0 - threshold
        })
    }

    fn steps_count(&mut self) -> Result<usize> {
        match &self.steps {
            Steps::Thresholds(values) => Ok(values.len()),
            Steps::Auto => {
                if self.tracer.params().threshold == Threshold::Auto {
                    Ok(4)
                } else if self.usable_range()? > 200.0 {
                    Ok(4)
                } else {
                    Ok(3)
                }
            }
            Steps::Count(count) => {
                // Clamp to [2, min(steps, usable_range)]: never fewer than
                // two layers, even when the usable range collapses.
                let count = *count;
                let usable = self.usable_range()?;
                Ok(usable.min(count as f64).max(2.0) as usize)
            }
        }
    }

    /// The resolved tonal ranges for the current image and parameters,
    /// ordered least-saturated first.
    pub fn color_stops(&mut self) -> Result<Vec<ColorStop>> {
        match self.steps.clone() {
            Steps::Thresholds(values) => self.ranges_from_list(&values),
            _ => match self.range_distribution {
                RangeDistribution::Auto => self.ranges_auto(),
                RangeDistribution::Equal => self.ranges_equal(),
            },
        }
    }

    /// Explicit threshold list: deduplicate, order toward the saturated
    /// end, and make sure the global threshold bounds the sequence.
    fn ranges_from_list(&mut self, values: &[u8]) -> Result<Vec<ColorStop>> {
        let threshold = self.effective_threshold()?;
        let black_on_white = self.tracer.params().black_on_white;

        let mut stops: Vec<f64> = Vec::new();
        for &value in values {
            let value = value as f64;
            if !stops.contains(&value) {
                stops.push(value);
            }
        }
        if stops.is_empty() {
            stops.push(threshold);
        }

        if black_on_white {
            stops.sort_by(|a, b| b.partial_cmp(a).unwrap());
            if stops[0] < threshold {
                stops.insert(0, threshold);
            }
        } else {
            stops.sort_by(|a, b| a.partial_cmp(b).unwrap());
            if *stops.last().unwrap() < threshold {
                stops.push(threshold);
            }
        }

        self.intensities(&stops)
    }

    fn ranges_auto(&mut self) -> Result<Vec<ColorStop>> {
        let count = self.steps_count()?;
        let black_on_white = self.tracer.params().black_on_white;

        let mut stops: Vec<f64> = if self.tracer.params().threshold == Threshold::Auto {
            self.tracer
                .histogram()?
                .multilevel_thresholds(count as u32, 0, 255)
                .into_iter()
                .map(f64::from)
                .collect()
        } else {
            let threshold = self.effective_threshold()?;
            let level = level_of(threshold);
            let histogram = self.tracer.histogram()?;
            let inner = if black_on_white {
                histogram.multilevel_thresholds(count.saturating_sub(1) as u32, 0, level)
            } else {
                histogram.multilevel_thresholds(count.saturating_sub(1) as u32, level, 255)
            };
            let mut stops: Vec<f64> = inner.into_iter().map(f64::from).collect();
            if black_on_white {
                stops.push(threshold);
            } else {
                stops.insert(0, threshold);
            }
            stops
        };

        if black_on_white {
            stops.reverse();
        }

        self.intensities(&stops)
    }

    fn ranges_equal(&mut self) -> Result<Vec<ColorStop>> {
        let threshold = self.effective_threshold()?;
        let black_on_white = self.tracer.params().black_on_white;
        let usable = if black_on_white { threshold } else { 255.0 - threshold };
        let count = self.steps_count()?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let step_size = usable / count as f64;
        let mut stops = Vec::with_capacity(count);
        for i in (0..count).rev() {
            let cut = ((i + 1) as f64 * step_size).min(usable);
            stops.push(if black_on_white { cut } else { 255.0 - cut });
        }

        self.intensities(&stops)
    }

    /// Pick a representative color per range and normalize it to an
    /// intensity. Ranges without pixels get intensity zero.
    fn intensities(&mut self, stops: &[f64]) -> Result<Vec<ColorStop>> {
        if stops.is_empty() {
            return Ok(Vec::new());
        }
        let black_on_white = self.tracer.params().black_on_white;
        let strategy = self.fill_strategy;
        let full_range = (self.effective_threshold()? - if black_on_white { 0.0 } else { 255.0 }).abs();

        let mut result = Vec::with_capacity(stops.len());

        for (index, &threshold) in stops.iter().enumerate() {
            let next = if index + 1 == stops.len() {
                if black_on_white { -1.0 } else { 256.0 }
            } else {
                stops[index + 1]
            };
            let range_start = (if black_on_white { next + 1.0 } else { threshold }).round();
            let range_end = (if black_on_white { threshold } else { next - 1.0 }).round();
            let factor = if stops.len() > 1 {
                index as f64 / (stops.len() - 1) as f64
            } else {
                0.0
            };
            let interval_size = range_end - range_start;

            let start_level = level_of(range_start);
            let end_level = level_of(range_end);

            let stats = if strategy == FillStrategy::Spread {
                None
            } else {
                Some(self.tracer.histogram()?.stats(start_level, end_level)?)
            };

            if let Some(stats) = stats {
                if stats.pixels == 0 {
                    result.push(ColorStop {
                        value: threshold,
                        intensity: 0.0,
                    });
                    continue;
                }
            }

            let mut color = match strategy {
                FillStrategy::Spread => {
                    (if black_on_white { range_start } else { range_end })
                        + (if black_on_white { 1.0 } else { -1.0 })
                            * (interval_size * 0.5f64.max(full_range / 255.0) * factor).round()
                }
                FillStrategy::Dominant => {
                    let tolerance = interval_size.clamp(1.0, 5.0) as u32;
                    self.tracer
                        .histogram()?
                        .dominant_color(start_level, end_level, tolerance)?
                        .map(f64::from)
                        .unwrap_or(-1.0)
                }
                FillStrategy::Mean => stats.unwrap().levels.mean,
                FillStrategy::Median => stats.unwrap().levels.median,
            };

            // Keep layer colors at least 10% of the interval away from
            // the less saturated boundary.
            if index != 0 {
                let margin = (interval_size * 0.1).round();
                color = if black_on_white {
                    color.clamp(range_start, range_end - margin)
                } else {
                    color.clamp(range_start + margin, range_end)
                };
            }

            let intensity = if color == -1.0 {
                0.0
            } else if black_on_white {
                (255.0 - color) / 255.0
            } else {
                color / 255.0
            };

            result.push(ColorStop {
                value: threshold,
                intensity,
            });
        }

        Ok(result)
    }

    /// Deep posterizations can leave the most saturated range too wide;
    /// append a near-extreme stop to recover darkest/lightest details.
    fn add_extra_color_stop(&mut self, ranges: &mut Vec<ColorStop>) -> Result<()> {
        let black_on_white = self.tracer.params().black_on_white;
        let last = *ranges.last().expect("extra stop requires existing ranges");
        let (from, to) = if black_on_white {
            (0.0, last.value)
        } else {
            (last.value, 255.0)
        };

        if to - from > 25.0 && last.intensity != 1.0 {
            let histogram = self.tracer.histogram()?;
            let levels = histogram.stats(level_of(from), level_of(to))?.levels;

            let new_stop = if levels.mean + levels.std_dev <= 25.0 {
                levels.mean + levels.std_dev
            } else if levels.mean - levels.std_dev <= 25.0 {
                levels.mean - levels.std_dev
            } else {
                25.0
            };

            let color = if black_on_white {
                histogram.stats(0, level_of(new_stop))?.levels.mean
            } else {
                histogram.stats(level_of(new_stop), 255)?.levels.mean
            };

            let intensity = if color.is_nan() {
                0.0
            } else if black_on_white {
                (255.0 - color) / 255.0
            } else {
                color / 255.0
            };

            ranges.push(ColorStop {
                value: ((if black_on_white { 0.0 } else { 255.0 }) - new_stop).abs(),
                intensity,
            });
        }

        Ok(())
    }

    /// Trace every visible range and composite layer opacities in order.
    /// Tracing fans out over independent tracer clones; assembly order is
    /// fixed, so the output is deterministic.
    fn path_tags(&mut self, no_fill: bool, scale: (f64, f64)) -> Result<Vec<String>> {
        let mut ranges = self.color_stops()?;
        if ranges.len() >= 10 {
            self.add_extra_color_stop(&mut ranges)?;
        }
        if ranges.is_empty() {
            return Ok(Vec::new());
        }

        let fill = if no_fill {
            None
        } else {
            Some(resolve_fill(self.tracer.params()))
        };

        // Each visible layer traces on its own tracer clone; the
        // histogram caches are not shareable across threads.
        let workers: Vec<Option<Tracer>> = ranges
            .iter()
            .map(|stop| (stop.intensity != 0.0).then(|| self.tracer.clone()))
            .collect();

        let rendered: Vec<Option<String>> = ranges
            .par_iter()
            .zip(workers.into_par_iter())
            .map(|(stop, tracer)| -> Result<Option<String>> {
                let Some(mut tracer) = tracer else {
                    return Ok(None);
                };
                let mut params = tracer.params().clone();
                params.threshold = Threshold::Value(stop.value);
                tracer.set_parameters(params)?;
                Ok(Some(tracer.path_tag_scaled(fill.as_deref(), scale)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut actual_prev = 0.0f64;
        let mut tags = Vec::new();

        for (stop, tag) in ranges.iter().zip(rendered) {
            let Some(tag) = tag else { continue };

            let opacity = if actual_prev == 0.0 || stop.intensity == 1.0 {
                stop.intensity
            } else {
                (actual_prev - stop.intensity) / (actual_prev - 1.0)
            };
            let opacity = ((opacity * 1000.0).round() / 1000.0).clamp(0.0, 1.0);
            actual_prev += (1.0 - actual_prev) * opacity;

            if opacity == 0.0 || tag.contains(r#" d="""#) {
                continue;
            }
            tags.push(svg::set_attribute(
                &tag,
                "fill-opacity",
                &format!("{opacity:.3}"),
            ));
        }

        Ok(tags)
    }

    /// Full SVG document with one `<path>` per visible layer.
    pub fn get_svg(&mut self) -> Result<String> {
        let (width, height, scale) = self.tracer.output_dimensions()?;
        let tags = self.path_tags(false, scale)?;

        let background = match &self.tracer.params().background {
            Fill::Auto | Fill::Transparent => None,
            Fill::Color(color) => Some(color.clone()),
        };

        Ok(svg::document(width, height, background.as_deref(), &tags))
    }

    /// `<symbol>` element with all layers, without fill colors.
    pub fn get_symbol(&mut self, id: &str) -> Result<String> {
        let (width, height) = self.tracer.source_dimensions()?;
        let tags = self.path_tags(true, (1.0, 1.0))?;
        Ok(svg::symbol(id, width, height, &tags.concat()))
    }
}
