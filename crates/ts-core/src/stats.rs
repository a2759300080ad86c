//! Summary statistics over small `f64` samples.
//!
//! Thin wrappers over `statrs` that pin down the conventions used across the
//! workspace (sample vs population standard deviation, empty-input behavior).

use statrs::statistics::{Data, Median, Statistics};

/// Arithmetic mean. `NaN` for empty input.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Sample standard deviation (`n - 1` denominator). `0.0` when fewer than 2 values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    values.iter().std_dev()
}

/// Population standard deviation (`n` denominator). `NaN` for empty input.
pub fn population_std(values: &[f64]) -> f64 {
    values.iter().population_std_dev()
}

/// Standard error of the mean, `std / sqrt(n)`. `NaN` for empty input.
pub fn standard_error(std: f64, n: usize) -> f64 {
    if n == 0 {
        return f64::NAN;
    }
    std / (n as f64).sqrt()
}

/// Median. `NaN` for empty input.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    Data::new(values.to_vec()).median()
}

/// Most frequent value after rounding to `decimals` places.
///
/// Ties resolve to the smallest value. `None` for empty input.
pub fn mode_rounded(values: &[f64], decimals: i32) -> Option<f64> {
    let scale = 10f64.powi(decimals);
    let mut rounded: Vec<f64> = values.iter().map(|v| (v * scale).round() / scale).collect();
    rounded.sort_by(f64::total_cmp);

    let mut best: Option<(f64, usize)> = None;
    let mut i = 0;
    while i < rounded.len() {
        let mut j = i + 1;
        while j < rounded.len() && rounded[j] == rounded[i] {
            j += 1;
        }
        let count = j - i;
        if best.is_none_or(|(_, c)| count > c) {
            best = Some((rounded[i], count));
        }
        i = j;
    }
    best.map(|(v, _)| v)
}
