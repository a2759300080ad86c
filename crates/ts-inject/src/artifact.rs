//! Asymmetry injection artifact.
//!
//! One point per bin along a chosen kinematic variable: the bin center and
//! edges, the mean extracted asymmetry with its standard error, and the
//! injected value. When bins carry at least two distinct injected values a
//! straight-line fit of mean vs injected is attached as a linearity check.

use serde::Serialize;

use ts_core::{ArtifactMeta, Error, Result, Variable};

use crate::aggregate::BinSummary;

/// Schema version of [`AsymmetryArtifact`].
pub const ASYMMETRY_SCHEMA_V1: &str = "tmdstat_asymmetry_v1";

/// One bin projected on the plotted variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AsymmetryPoint {
    /// Row of the binning table.
    pub bin_index: usize,
    /// Bin center along the variable.
    pub center: f64,
    /// Lower edge.
    pub lo: f64,
    /// Upper edge.
    pub hi: f64,
    /// Mean extracted asymmetry.
    pub mean: f64,
    /// Standard error of the mean.
    pub stderr: f64,
    /// Spread of the trials.
    pub std: f64,
    /// Number of trials.
    pub n: usize,
    /// Events in the bin.
    pub events: Option<f64>,
    /// Injected asymmetry.
    pub injected: Option<f64>,
}

/// Least-squares line `mean = slope * injected + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearityFit {
    /// Slope (1 for an unbiased extraction).
    pub slope: f64,
    /// Intercept (0 for an unbiased extraction).
    pub intercept: f64,
    /// Points used.
    pub n_points: usize,
}

/// Plot-friendly summary of an injection study.
#[derive(Debug, Clone, Serialize)]
pub struct AsymmetryArtifact {
    /// Always [`ASYMMETRY_SCHEMA_V1`].
    pub schema_version: String,
    /// Provenance.
    pub meta: ArtifactMeta,
    /// Variable the bins are projected on.
    pub variable: Variable,
    /// Points sorted by `bin_index`.
    pub points: Vec<AsymmetryPoint>,
    /// Present with at least two distinct injected values.
    pub linearity: Option<LinearityFit>,
}

impl AsymmetryArtifact {
    /// Build from aggregated bins. Bins without bounds on `variable` are skipped.
    pub fn from_summaries(summaries: &[BinSummary], variable: Variable) -> Result<Self> {
        let points: Vec<AsymmetryPoint> = summaries
            .iter()
            .filter_map(|s| {
                let Some(b) = s.bounds.get(&variable) else {
                    log::warn!("bin {} has no {variable} bounds; not plotted", s.bin_index);
                    return None;
                };
                Some(AsymmetryPoint {
                    bin_index: s.bin_index,
                    center: b.center(),
                    lo: b.min,
                    hi: b.max,
                    mean: s.mean,
                    stderr: s.stderr,
                    std: s.std,
                    n: s.n,
                    events: s.events,
                    injected: s.injected,
                })
            })
            .collect();
        if points.is_empty() {
            return Err(Error::Validation(format!("no bins with {variable} bounds to plot")));
        }

        let (x, y): (Vec<f64>, Vec<f64>) =
            points.iter().filter_map(|p| p.injected.map(|inj| (inj, p.mean))).unzip();
        let distinct = x.iter().any(|&v| v != x[0]);
        let linearity = distinct.then(|| {
            let (slope, intercept) = linear_fit(&x, &y);
            LinearityFit { slope, intercept, n_points: x.len() }
        });

        Ok(Self {
            schema_version: ASYMMETRY_SCHEMA_V1.to_string(),
            meta: ArtifactMeta::now()?,
            variable,
            points,
            linearity,
        })
    }
}

/// Unweighted least-squares line through `(x, y)`.
fn linear_fit(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let sum_x: f64 = x.iter().sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = x.iter().zip(y).map(|(&xi, &yi)| xi * yi).sum();
    let sum_xx: f64 = x.iter().map(|&xi| xi * xi).sum();
    let denom = n * sum_xx - sum_x * sum_x;
    if n < 2.0 || denom.abs() < 1e-30 {
        return (1.0, 0.0);
    }
    let slope = (n * sum_xy - sum_x * sum_y) / denom;
    (slope, (sum_y - slope * sum_x) / n)
}
