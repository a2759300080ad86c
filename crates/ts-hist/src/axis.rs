//! Binned axes.

use serde::{Deserialize, Serialize};

use ts_core::{Error, Result};

/// Edge spacing of an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisScale {
    /// Uniform edges.
    Linear,
    /// Edges uniform in `log10`.
    Log,
}

/// Sorted bin edges with half-open `[lo, hi)` bins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    edges: Vec<f64>,
    scale: AxisScale,
}

impl Axis {
    /// `n` uniform bins over `[lo, hi)`.
    pub fn linear(n: usize, lo: f64, hi: f64) -> Result<Self> {
        check_range(n, lo, hi)?;
        let step = (hi - lo) / n as f64;
        let mut edges: Vec<f64> = (0..n).map(|i| lo + step * i as f64).collect();
        edges.push(hi);
        Ok(Self { edges, scale: AxisScale::Linear })
    }

    /// `n` bins with log-spaced edges over `[lo, hi)`. Requires `lo > 0`.
    pub fn log(n: usize, lo: f64, hi: f64) -> Result<Self> {
        check_range(n, lo, hi)?;
        if lo <= 0.0 {
            return Err(Error::Validation(format!("log axis needs lo > 0, got {lo}")));
        }
        let (a, b) = (lo.log10(), hi.log10());
        let step = (b - a) / n as f64;
        let mut edges: Vec<f64> = (0..n).map(|i| 10f64.powf(a + step * i as f64)).collect();
        edges[0] = lo;
        edges.push(hi);
        Ok(Self { edges, scale: AxisScale::Log })
    }

    /// Axis over explicit edges (at least two, strictly increasing).
    pub fn from_edges(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Validation("axis needs at least 2 edges".into()));
        }
        if edges.iter().any(|e| !e.is_finite()) || edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(Error::Validation("axis edges must be finite and strictly increasing".into()));
        }
        Ok(Self { edges, scale: AxisScale::Linear })
    }

    /// Number of bins.
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// Bin edges (`n_bins + 1` values).
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Edge spacing.
    pub fn scale(&self) -> AxisScale {
        self.scale
    }

    /// Lower edge of the first bin.
    pub fn lo(&self) -> f64 {
        self.edges[0]
    }

    /// Upper edge of the last bin.
    pub fn hi(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    /// Bin centers; geometric for log axes.
    pub fn centers(&self) -> Vec<f64> {
        self.edges
            .windows(2)
            .map(|w| match self.scale {
                AxisScale::Linear => 0.5 * (w[0] + w[1]),
                AxisScale::Log => (w[0] * w[1]).sqrt(),
            })
            .collect()
    }

    /// Index of the bin containing `v`, `None` outside `[lo, hi)` or for NaN.
    pub fn find_bin(&self, v: f64) -> Option<usize> {
        if !(v >= self.lo() && v < self.hi()) {
            return None;
        }
        // First edge strictly above v, minus one.
        let i = self.edges.partition_point(|&e| e <= v);
        Some(i - 1)
    }
}

fn check_range(n: usize, lo: f64, hi: f64) -> Result<()> {
    if n == 0 {
        return Err(Error::Validation("axis needs at least 1 bin".into()));
    }
    if !(lo.is_finite() && hi.is_finite() && lo < hi) {
        return Err(Error::Validation(format!("invalid axis range [{lo}, {hi})")));
    }
    Ok(())
}
