//! # ts-hist
//!
//! Weighted histograms of event-level kinematics for tmdstat.
//!
//! This crate fills data only: it produces plot-friendly JSON structures
//! (edges plus contents arrays) and leaves rendering to external tools.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod artifact;
pub mod axis;
pub mod expr;
pub mod hist;
pub mod plots;

pub use artifact::{
    KINEMATICS_SCHEMA_V1, KinematicsArtifact, Layout, PanelArtifact, build_kinematics,
    required_branches,
};
pub use axis::{Axis, AxisScale};
pub use expr::{ExprFunc, VariableExpr};
pub use hist::{Hist1D, Hist2D};
pub use plots::{Panel2D, PanelSpec, PlotCatalog, PlotConfig, PlotConfigPatch, ResolvedPanel};
