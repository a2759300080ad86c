//! Hierarchical adaptive binning.
//!
//! Dimensions are refined in order: edges for the first dimension come from
//! the whole sample, and each later dimension is binned independently inside
//! every non-empty bin of the one before it. Bins are half-open `[lo, hi)`,
//! so events sitting exactly on the upper edge of a dimension are dropped.

use serde::{Deserialize, Serialize};

use ts_core::types::EdgeTransform;
use ts_core::{Error, Result, Variable};
use ts_events::EventSample;

use crate::quantile::weighted_equal_bins_indexed;
use crate::table::{BinRow, BinTable, TableDefaults};

/// One binning dimension: a table variable computed from an event branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionSpec {
    /// Table variable the edges are stored under.
    pub variable: Variable,
    /// Event branch the edges are computed on.
    pub branch: String,
    /// Number of bins in this dimension.
    pub n_bins: usize,
    /// Map from branch-space edges to table bounds.
    pub transform: EdgeTransform,
}

impl DimensionSpec {
    /// Dimension binned on the branch called `name`.
    ///
    /// `Q2` is binned on the `Q2` branch and stored as `Q`.
    pub fn new(name: &str, n_bins: usize) -> Result<Self> {
        let resolved = Variable::from_name(name)?;
        Ok(Self {
            variable: resolved.variable,
            branch: name.to_string(),
            n_bins,
            transform: resolved.transform,
        })
    }
}

/// Configuration of a hierarchical binning run.
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchicalBinning {
    /// Dimensions, coarsest first.
    pub dims: Vec<DimensionSpec>,
    /// Emit finest-level bins even when they hold no events.
    pub keep_empty_leaves: bool,
}

impl Default for HierarchicalBinning {
    fn default() -> Self {
        let dims = Variable::DEFAULT_TABLE
            .into_iter()
            .map(|v| DimensionSpec {
                variable: v,
                branch: v.default_branch().to_string(),
                n_bins: 10,
                transform: v.default_transform(),
            })
            .collect();
        Self { dims, keep_empty_leaves: false }
    }
}

/// Output of [`HierarchicalBinning::build`].
#[derive(Debug, Clone)]
pub struct HierarchicalResult {
    /// Generated bins.
    pub table: BinTable,
    /// Total event weight in each bin, aligned with `table.rows()`.
    pub weights: Vec<f64>,
    /// Events read.
    pub n_events: usize,
    /// Events with finite values in every binning branch.
    pub n_used: usize,
}

impl HierarchicalBinning {
    /// Branches the sample must provide.
    pub fn branches(&self) -> Vec<String> {
        self.dims.iter().map(|d| d.branch.clone()).collect()
    }

    fn validate(&self) -> Result<()> {
        if self.dims.is_empty() {
            return Err(Error::Validation("binning needs at least one dimension".into()));
        }
        for (i, d) in self.dims.iter().enumerate() {
            if d.n_bins == 0 {
                return Err(Error::Validation(format!("dimension '{}' has 0 bins", d.branch)));
            }
            if self.dims[..i].iter().any(|o| o.variable == d.variable) {
                return Err(Error::Validation(format!(
                    "variable {} is binned more than once",
                    d.variable
                )));
            }
        }
        Ok(())
    }

    /// Build the binning table over `sample`.
    pub fn build(&self, sample: &EventSample, defaults: &TableDefaults) -> Result<HierarchicalResult> {
        self.validate()?;

        let branches: Vec<&str> = self.dims.iter().map(|d| d.branch.as_str()).collect();
        let indices = sample.finite_indices(&branches)?;
        let dropped = sample.n_events() - indices.len();
        if dropped > 0 {
            log::warn!("dropping {dropped} events with non-finite binning variables");
        }

        let mut builder = TreeBuilder {
            dims: &self.dims,
            sample,
            defaults,
            keep_empty_leaves: self.keep_empty_leaves,
            chain: Vec::with_capacity(self.dims.len()),
            table: BinTable::default(),
            weights: Vec::new(),
        };
        builder.refine(0, &indices)?;

        log::info!(
            "built {} bins over {} dimensions from {} events",
            builder.table.len(),
            self.dims.len(),
            indices.len()
        );
        Ok(HierarchicalResult {
            table: builder.table,
            weights: builder.weights,
            n_events: sample.n_events(),
            n_used: indices.len(),
        })
    }
}

struct TreeBuilder<'a> {
    dims: &'a [DimensionSpec],
    sample: &'a EventSample,
    defaults: &'a TableDefaults,
    keep_empty_leaves: bool,
    chain: Vec<(Variable, f64, f64)>,
    table: BinTable,
    weights: Vec<f64>,
}

impl TreeBuilder<'_> {
    fn refine(&mut self, depth: usize, indices: &[usize]) -> Result<()> {
        let (dims, sample) = (self.dims, self.sample);
        let dim = &dims[depth];
        let column = sample.require_column(&dim.branch)?;
        let Some(edges) = weighted_equal_bins_indexed(column, sample.weights(), indices, dim.n_bins)?
        else {
            return Ok(());
        };

        let is_leaf = depth + 1 == dims.len();
        for pair in edges.windows(2) {
            let (lo, hi) = (pair[0], pair[1]);
            let subset = sample.select_range(&dim.branch, indices, lo, hi)?;
            if subset.is_empty() && !(is_leaf && self.keep_empty_leaves) {
                continue;
            }

            self.chain.push((dim.variable, dim.transform.apply(lo), dim.transform.apply(hi)));
            if is_leaf {
                let row = self
                    .chain
                    .iter()
                    .fold(BinRow::new(self.defaults), |row, &(v, lo, hi)| row.with_bounds(v, lo, hi));
                self.table.push(row);
                self.weights.push(sample.total_weight(&subset));
            } else {
                self.refine(depth + 1, &subset)?;
            }
            self.chain.pop();
        }
        Ok(())
    }
}
