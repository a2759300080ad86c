//! # ts-binning
//!
//! Binning tables for tmdstat.
//!
//! - [`quantile`]: weighted equal-population edges for one variable
//! - [`hierarchy`]: nested adaptive binning (X, then Q², then Z, then Mh)
//! - [`grid`]: fixed-edge cartesian grids
//! - [`table`]: the [`BinTable`] type and its CSV layout
//! - [`summary`]: distribution of per-bin weights

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod grid;
pub mod hierarchy;
pub mod quantile;
pub mod summary;
pub mod table;

pub use grid::{GridDimension, LOG_X_EDGES, generate_grid_table, log_x_edges};
pub use hierarchy::{DimensionSpec, HierarchicalBinning, HierarchicalResult};
pub use quantile::{weighted_equal_bins, weighted_equal_bins_indexed};
pub use summary::BinWeightSummary;
pub use table::{BinBounds, BinKey, BinRow, BinTable, TableDefaults, validate_grid};
