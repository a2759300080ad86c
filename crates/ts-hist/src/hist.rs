//! Weighted histogram filling.

use serde::Serialize;

use ts_core::Result;
use ts_events::EventSample;

use crate::axis::Axis;
use crate::expr::VariableExpr;

/// Weighted 1D histogram with explicit under/overflow.
#[derive(Debug, Clone, Serialize)]
pub struct Hist1D {
    /// Binning.
    pub axis: Axis,
    /// Sum of weights per bin.
    pub sumw: Vec<f64>,
    /// Sum of squared weights per bin.
    pub sumw2: Vec<f64>,
    /// Weight below the first edge.
    pub underflow: f64,
    /// Weight at or above the last edge.
    pub overflow: f64,
    /// Finite values filled (including under/overflow).
    pub entries: u64,
    /// Non-finite values ignored.
    pub skipped: u64,
}

impl Hist1D {
    /// Empty histogram over `axis`.
    pub fn new(axis: Axis) -> Self {
        let n = axis.n_bins();
        Self {
            axis,
            sumw: vec![0.0; n],
            sumw2: vec![0.0; n],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            skipped: 0,
        }
    }

    /// Fill one value with weight `w`.
    pub fn fill(&mut self, v: f64, w: f64) {
        if !v.is_finite() {
            self.skipped += 1;
            return;
        }
        self.entries += 1;
        match self.axis.find_bin(v) {
            Some(i) => {
                self.sumw[i] += w;
                self.sumw2[i] += w * w;
            }
            None if v < self.axis.lo() => self.underflow += w,
            None => self.overflow += w,
        }
    }

    /// Fill `expr` for every event of `sample`.
    pub fn fill_sample(&mut self, sample: &EventSample, expr: &VariableExpr) -> Result<()> {
        let col = sample.require_column(expr.branch_name())?;
        for (&v, &w) in col.iter().zip(sample.weights()) {
            self.fill(expr.eval(v), w);
        }
        Ok(())
    }

    /// Per-bin statistical errors, `sqrt(sumw2)`.
    pub fn errors(&self) -> Vec<f64> {
        self.sumw2.iter().map(|s| s.sqrt()).collect()
    }

    /// Sum of in-range weights.
    pub fn integral(&self) -> f64 {
        self.sumw.iter().sum()
    }
}

/// Weighted 2D histogram. Contents are row-major: `sumw[ix][iy]`.
#[derive(Debug, Clone, Serialize)]
pub struct Hist2D {
    /// X binning.
    pub x_axis: Axis,
    /// Y binning.
    pub y_axis: Axis,
    /// Sum of weights per cell.
    pub sumw: Vec<Vec<f64>>,
    /// Sum of squared weights per cell.
    pub sumw2: Vec<Vec<f64>>,
    /// Weight of finite points outside the grid.
    pub outside: f64,
    /// Finite points filled (including outside).
    pub entries: u64,
    /// Points with a non-finite coordinate.
    pub skipped: u64,
}

impl Hist2D {
    /// Empty histogram over the two axes.
    pub fn new(x_axis: Axis, y_axis: Axis) -> Self {
        let (nx, ny) = (x_axis.n_bins(), y_axis.n_bins());
        Self {
            x_axis,
            y_axis,
            sumw: vec![vec![0.0; ny]; nx],
            sumw2: vec![vec![0.0; ny]; nx],
            outside: 0.0,
            entries: 0,
            skipped: 0,
        }
    }

    /// Fill one point with weight `w`.
    pub fn fill(&mut self, x: f64, y: f64, w: f64) {
        if !(x.is_finite() && y.is_finite()) {
            self.skipped += 1;
            return;
        }
        self.entries += 1;
        match (self.x_axis.find_bin(x), self.y_axis.find_bin(y)) {
            (Some(ix), Some(iy)) => {
                self.sumw[ix][iy] += w;
                self.sumw2[ix][iy] += w * w;
            }
            _ => self.outside += w,
        }
    }

    /// Fill `(x_expr, y_expr)` for every event of `sample`.
    pub fn fill_sample(
        &mut self,
        sample: &EventSample,
        x_expr: &VariableExpr,
        y_expr: &VariableExpr,
    ) -> Result<()> {
        let xs = sample.require_column(x_expr.branch_name())?;
        let ys = sample.require_column(y_expr.branch_name())?;
        for ((&x, &y), &w) in xs.iter().zip(ys).zip(sample.weights()) {
            self.fill(x_expr.eval(x), y_expr.eval(y), w);
        }
        Ok(())
    }

    /// Sum of in-range weights.
    pub fn integral(&self) -> f64 {
        self.sumw.iter().flatten().sum()
    }
}
