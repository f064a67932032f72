//! 256-bin luminance histogram with multilevel Otsu thresholding, range
//! statistics and dominant-color lookup.
//!
//! The between-class significance table and per-range statistics are
//! computed lazily and cached for the lifetime of the histogram; the
//! backing bitmap is never mutated after binarization, so the caches are
//! only ever invalidated by building a new histogram.

use crate::bitmap::Bitmap;
use crate::error::{Error, Result};
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;

const LEVELS: usize = 256;

/// Statistics over the luminance levels of a histogram range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelStats {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub unique: u32,
}

/// Statistics over the per-level pixel counts of a histogram range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelsPerLevel {
    pub mean: f64,
    pub median: f64,
    pub peak: u32,
}

/// Aggregate statistics for a `[min, max]` level range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeStats {
    pub pixels: u32,
    pub levels: LevelStats,
    pub pixels_per_level: PixelsPerLevel,
}

/// Luminance distribution of a bitmap.
pub struct Histogram {
    counts: [u32; LEVELS],
    pixels: u32,
    significance: OnceCell<Vec<f64>>,
    stats_cache: RefCell<HashMap<(u8, u8), RangeStats>>,
}

impl Clone for Histogram {
    fn clone(&self) -> Self {
        // Caches are cheap to rebuild; start the clone cold.
        Histogram {
            counts: self.counts,
            pixels: self.pixels,
            significance: OnceCell::new(),
            stats_cache: RefCell::new(HashMap::new()),
        }
    }
}

impl std::fmt::Debug for Histogram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Histogram")
            .field("pixels", &self.pixels)
            .finish_non_exhaustive()
    }
}

impl Histogram {
    /// Count luminance levels of a bitmap.
    pub fn from_bitmap(bitmap: &Bitmap) -> Self {
        let mut counts = [0u32; LEVELS];
        for &level in bitmap.data() {
            counts[level as usize] += 1;
        }
        Histogram {
            counts,
            pixels: bitmap.size() as u32,
            significance: OnceCell::new(),
            stats_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn pixels(&self) -> u32 {
        self.pixels
    }

    pub fn count(&self, level: u8) -> u32 {
        self.counts[level as usize]
    }

    /// Statistics for levels in `[min, max]`.
    pub fn stats(&self, min: u8, max: u8) -> Result<RangeStats> {
        if min > max {
            return Err(Error::InvalidRange { min, max });
        }
        if let Some(cached) = self.stats_cache.borrow().get(&(min, max)) {
            return Ok(*cached);
        }

        let lo = min as usize;
        let hi = max as usize;

        let mut pixels: u64 = 0;
        let mut level_sum: u64 = 0;
        let mut unique: u32 = 0;
        let mut peak: u32 = 0;

        for level in lo..=hi {
            let count = self.counts[level];
            pixels += count as u64;
            level_sum += count as u64 * level as u64;
            if count > 0 {
                unique += 1;
            }
            peak = peak.max(count);
        }

        let mean = level_sum as f64 / pixels as f64;

        let mut deviation_sum = 0.0;
        let mut cumulative: u64 = 0;
        let mut median = f64::NAN;
        for level in lo..=hi {
            let count = self.counts[level];
            deviation_sum += (level as f64 - mean) * (level as f64 - mean) * count as f64;
            cumulative += count as u64;
            if median.is_nan() && pixels > 0 && cumulative * 2 >= pixels {
                median = level as f64;
            }
        }

        let stats = RangeStats {
            pixels: pixels as u32,
            levels: LevelStats {
                mean,
                median,
                std_dev: (deviation_sum / pixels as f64).sqrt(),
                unique,
            },
            pixels_per_level: PixelsPerLevel {
                mean: pixels as f64 / (max as f64 - min as f64),
                median: pixels as f64 / unique as f64,
                peak,
            },
        };

        self.stats_cache.borrow_mut().insert((min, max), stats);
        Ok(stats)
    }

    /// Level in `[min, max]` whose `tolerance`-bin window holds the most
    /// pixels. Ties prefer the larger own-bin count, then the lower level.
    /// `None` when the range contains no pixels.
    pub fn dominant_color(&self, min: u8, max: u8, tolerance: u32) -> Result<Option<u8>> {
        if min > max {
            return Err(Error::InvalidRange { min, max });
        }

        let range_pixels: u64 = (min as usize..=max as usize)
            .map(|l| self.counts[l] as u64)
            .sum();
        if range_pixels == 0 {
            return Ok(None);
        }
        if min == max {
            return Ok(Some(min));
        }

        let tolerance = tolerance.max(1) as i64;
        let window_start = -(tolerance / 2);

        let mut dominant: Option<u8> = None;
        let mut dominant_sum: u64 = 0;

        for level in min as i64..=max as i64 {
            let mut sum: u64 = 0;
            for offset in window_start..window_start + tolerance {
                let bin = level + offset;
                if (0..LEVELS as i64).contains(&bin) {
                    sum += self.counts[bin as usize] as u64;
                }
            }

            let own = self.counts[level as usize];
            let better = sum > dominant_sum
                || (sum == dominant_sum
                    && dominant.is_some_and(|d| own > self.counts[d as usize]));
            if better {
                dominant = Some(level as u8);
                dominant_sum = sum;
            }
        }

        Ok(if dominant_sum == 0 { None } else { dominant })
    }

    /// Otsu's method extended to `amount` thresholds over `[min, max]`.
    ///
    /// Maximizes the summed between-class significance `S²/P` over all
    /// ordered threshold tuples; on ties the lexicographically smallest
    /// tuple wins. Returns an empty vector when the range cannot hold the
    /// requested thresholds, when the histogram is empty, or when the
    /// range holds a single color. The search is exponential in `amount`
    /// and is intended for five thresholds or fewer.
    pub fn multilevel_thresholds(&self, amount: u32, min: u8, max: u8) -> Vec<u8> {
        let amount = (amount as i64).min(max as i64 - min as i64 - 2);
        if amount < 1 || self.pixels == 0 {
            return Vec::new();
        }
        let amount = amount as usize;

        // A range with fewer than two occupied levels has no cut that
        // improves on the undivided baseline; skip the enumeration.
        let occupied = (min as usize..=max as usize)
            .filter(|&level| self.counts[level] > 0)
            .count();
        if occupied < 2 {
            return Vec::new();
        }

        let table = self.significance_table();
        let min = min as usize;
        let max = max as usize;

        let mut best: Option<Vec<usize>> = None;
        // The undivided range is the baseline: a tuple only counts if it
        // strictly improves on it, so a single-color range yields nothing.
        let mut best_sig = table[sig_index(min, max)];
        let mut current = vec![0usize; amount];

        self.search_thresholds(
            table,
            min,
            max,
            amount,
            1,
            min,
            0.0,
            &mut current,
            &mut best_sig,
            &mut best,
        );

        best.map(|tuple| tuple.into_iter().map(|t| t as u8).collect())
            .unwrap_or_default()
    }

    /// Single automatic threshold for `[min, max]`, if one exists.
    pub fn auto_threshold(&self, min: u8, max: u8) -> Option<u8> {
        self.multilevel_thresholds(1, min, max).first().copied()
    }

    #[allow(clippy::too_many_arguments)]
    fn search_thresholds(
        &self,
        table: &[f64],
        min: usize,
        max: usize,
        amount: usize,
        depth: usize,
        segment_start: usize,
        sig_so_far: f64,
        current: &mut Vec<usize>,
        best_sig: &mut f64,
        best: &mut Option<Vec<usize>>,
    ) {
        // Threshold `depth` must leave room for the remaining ones below max.
        let first = if depth == 1 { min + 1 } else { current[depth - 2] + 1 };
        let last = max - 1 - (amount - depth);

        for threshold in first..=last {
            let sig = sig_so_far + table[sig_index(segment_start, threshold)];
            current[depth - 1] = threshold;

            if depth == amount {
                let total = sig + table[sig_index(threshold + 1, max)];
                if total > *best_sig {
                    *best_sig = total;
                    *best = Some(current.clone());
                }
            } else {
                self.search_thresholds(
                    table,
                    min,
                    max,
                    amount,
                    depth + 1,
                    threshold + 1,
                    sig,
                    current,
                    best_sig,
                    best,
                );
            }
        }
    }

    /// Between-class significance `H[i,j] = S[i,j]² / P[i,j]` for every
    /// level range, from the classical P/S prefix tables. Built once.
    fn significance_table(&self) -> &[f64] {
        self.significance.get_or_init(|| {
            let total = self.pixels as f64;
            let mut cum_p = [0.0f64; LEVELS + 1];
            let mut cum_s = [0.0f64; LEVELS + 1];
            for level in 0..LEVELS {
                let p = self.counts[level] as f64 / total;
                cum_p[level + 1] = cum_p[level] + p;
                cum_s[level + 1] = cum_s[level] + level as f64 * p;
            }

            let mut table = vec![0.0f64; LEVELS * LEVELS];
            for i in 0..LEVELS {
                for j in i..LEVELS {
                    let p = cum_p[j + 1] - cum_p[i];
                    let s = cum_s[j + 1] - cum_s[i];
                    if p != 0.0 {
                        table[sig_index(i, j)] = s * s / p;
                    }
                }
            }
            table
        })
    }
}

fn sig_index(i: usize, j: usize) -> usize {
    i * LEVELS + j
}

#[cfg(test)]
mod tests {
    include!("histogram_tests.rs");
}
