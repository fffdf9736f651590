use argminmax::ArgMinMax;
use std::cmp::{max, min};

/// A price range split into `n_chunks` equal-width bins.
#[derive(serde::Deserialize, serde::Serialize, Default, Debug, Clone, PartialEq)]
pub struct RangeF64 {
    pub start_range: f64,
    pub end_range: f64,
    pub n_chunks: usize,
}

impl RangeF64 {
    pub fn new(start_range: f64, end_range: f64, n_chunks: usize) -> Self {
        Self {
            start_range,
            end_range,
            n_chunks: n_chunks.max(1),
        }
    }

    #[inline]
    pub fn n_chunks(&self) -> usize {
        self.n_chunks
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.start_range && value <= self.end_range
    }

    pub fn count_intersecting_chunks(&self, mut x_low: f64, mut x_high: f64) -> usize {
        // Swap the values over if necessary
        if x_high < x_low {
            (x_low, x_high) = (x_high, x_low);
        }
        let first_chunk_index = max(
            0,
            ((x_low - self.start_range) / self.chunk_size()).floor() as isize,
        );
        let last_chunk_index = min(
            (self.n_chunks - 1) as isize,
            ((x_high - self.start_range) / self.chunk_size()).floor() as isize,
        );

        if last_chunk_index < first_chunk_index {
            return 0;
        }
        // Inclusive of both ends.
        (last_chunk_index - first_chunk_index + 1) as usize
    }

    pub fn range_length(&self) -> f64 {
        self.end_range - self.start_range
    }

    pub fn chunk_size(&self) -> f64 {
        self.range_length() / (self.n_chunks as f64)
    }

    pub fn chunk_index(&self, value: f64) -> usize {
        let index = ((value - self.start_range) / self.chunk_size()).max(0.0);
        // Clamping handles floating-point inaccuracies at the boundary.
        (index as usize).min(self.n_chunks - 1)
    }

    pub fn chunk_bounds(&self, chunk_index: usize) -> (f64, f64) {
        debug_assert!(chunk_index < self.n_chunks);
        let lower_bound = self.start_range + chunk_index as f64 * self.chunk_size();
        let upper_bound = self.start_range + (chunk_index + 1) as f64 * self.chunk_size();
        (lower_bound, upper_bound)
    }

    pub fn chunk_mid(&self, chunk_index: usize) -> f64 {
        let (lower, upper) = self.chunk_bounds(chunk_index);
        (lower + upper) / 2.0
    }
}

/// Largest value, `None` for an empty slice
pub fn get_max(vec: &[f64]) -> Option<f64> {
    if vec.is_empty() {
        return None;
    }
    let max_index: usize = vec.argmax();
    Some(vec[max_index])
}

/// Smallest value, `None` for an empty slice
pub fn get_min(vec: &[f64]) -> Option<f64> {
    if vec.is_empty() {
        return None;
    }
    let min_index: usize = vec.argmin();
    Some(vec[min_index])
}

/// Linear-interpolated percentile of an ascending-sorted slice (`percentile` in 0..=1).
pub fn percentile(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    if sorted.len() == 1 {
        return sorted[0];
    }

    let clamped = percentile.clamp(0.0, 1.0);
    let max_index = (sorted.len() - 1) as f64;
    let position = clamped * max_index;
    let lower_index = position.floor() as usize;
    let upper_index = position.ceil() as usize;

    if lower_index == upper_index {
        sorted[lower_index]
    } else {
        let weight = position - lower_index as f64;
        sorted[lower_index] + (sorted[upper_index] - sorted[lower_index]) * weight
    }
}

/// Percentage (0..=100) of `values` that are less than or equal to `value`.
pub fn percentile_rank(values: &[f64], value: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let at_or_below = values.iter().filter(|&&v| v <= value).count();
    at_or_below as f64 / values.len() as f64 * 100.0
}

/// Relative distance `|a - b| / a`; infinite when `a` is not positive.
#[inline]
pub fn relative_distance(a: f64, b: f64) -> f64 {
    if a <= 0.0 {
        return f64::INFINITY;
    }
    (a - b).abs() / a
}

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
