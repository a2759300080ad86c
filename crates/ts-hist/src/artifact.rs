//! Kinematics artifact: a grid of filled histogram panels as plot-friendly JSON.

use serde::Serialize;

use ts_core::{ArtifactMeta, Error, Result};
use ts_events::EventSample;

use crate::axis::AxisScale;
use crate::hist::{Hist1D, Hist2D};
use crate::plots::{PanelSpec, PlotCatalog, ResolvedPanel};

/// Schema version of [`KinematicsArtifact`].
pub const KINEMATICS_SCHEMA_V1: &str = "tmdstat_kinematics_v1";

/// Filled kinematics panels laid out on a grid.
#[derive(Debug, Clone, Serialize)]
pub struct KinematicsArtifact {
    /// Always [`KINEMATICS_SCHEMA_V1`].
    pub schema_version: String,
    /// Provenance.
    pub meta: ArtifactMeta,
    /// Where the events came from.
    pub source: SourceInfo,
    /// Figure title.
    pub title: Option<String>,
    /// Panels per row.
    pub ncols: usize,
    /// Number of rows, `ceil(panels / ncols)`.
    pub nrows: usize,
    /// Panels in row-major order.
    pub panels: Vec<PanelArtifact>,
}

/// Event source summary.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    /// Source description.
    pub description: String,
    /// Events read.
    pub n_events: usize,
    /// Sum of event weights.
    pub sum_weights: f64,
}

/// One filled panel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PanelArtifact {
    /// 1D histogram.
    Hist1d(Hist1DPanel),
    /// 2D histogram.
    Hist2d(Hist2DPanel),
}

/// 1D panel contents.
#[derive(Debug, Clone, Serialize)]
pub struct Hist1DPanel {
    /// Panel name.
    pub name: String,
    /// Filled expression.
    pub expr: String,
    /// Axis title.
    pub x_label: String,
    /// Log-spaced bins.
    pub log_x: bool,
    /// Log scale for contents.
    pub log_y: bool,
    /// Bin edges.
    pub edges: Vec<f64>,
    /// Bin centers.
    pub centers: Vec<f64>,
    /// Sum of weights per bin.
    pub sumw: Vec<f64>,
    /// `sqrt(sumw2)` per bin.
    pub errors: Vec<f64>,
    /// Weight below range.
    pub underflow: f64,
    /// Weight above range.
    pub overflow: f64,
    /// Finite entries.
    pub entries: u64,
    /// Non-finite entries.
    pub skipped: u64,
}

/// 2D panel contents. `sumw[ix][iy]`.
#[derive(Debug, Clone, Serialize)]
pub struct Hist2DPanel {
    /// Panel name.
    pub name: String,
    /// Horizontal expression.
    pub x_expr: String,
    /// Vertical expression.
    pub y_expr: String,
    /// Horizontal axis title.
    pub x_label: String,
    /// Vertical axis title.
    pub y_label: String,
    /// Log-spaced horizontal bins.
    pub log_x: bool,
    /// Log-spaced vertical bins.
    pub log_y: bool,
    /// Log scale for contents.
    pub log_z: bool,
    /// Horizontal edges.
    pub x_edges: Vec<f64>,
    /// Vertical edges.
    pub y_edges: Vec<f64>,
    /// Sum of weights per cell.
    pub sumw: Vec<Vec<f64>>,
    /// Weight outside the grid.
    pub outside: f64,
    /// Finite entries.
    pub entries: u64,
    /// Non-finite entries.
    pub skipped: u64,
}

/// Title and grid layout of a kinematics figure.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    /// Figure title.
    pub title: Option<String>,
    /// Panels per row.
    pub ncols: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self { title: None, ncols: 3 }
    }
}

/// Branches needed to fill `panels`, deduplicated in first-use order.
pub fn required_branches(catalog: &PlotCatalog, panels: &[PanelSpec]) -> Result<Vec<String>> {
    let mut out: Vec<String> = Vec::new();
    for spec in panels {
        for b in catalog.resolve(spec)?.branches() {
            if !out.iter().any(|o| o == b) {
                out.push(b.to_string());
            }
        }
    }
    Ok(out)
}

fn fill_panel(sample: &EventSample, resolved: ResolvedPanel) -> Result<PanelArtifact> {
    match resolved {
        ResolvedPanel::One { name, config } => {
            let mut h = Hist1D::new(config.axis()?);
            h.fill_sample(sample, &config.expr)?;
            log::debug!("{name}: {} entries, {} skipped", h.entries, h.skipped);
            Ok(PanelArtifact::Hist1d(Hist1DPanel {
                name,
                expr: config.expr.to_string(),
                x_label: config.label,
                log_x: h.axis.scale() == AxisScale::Log,
                log_y: config.log_y,
                edges: h.axis.edges().to_vec(),
                centers: h.axis.centers(),
                errors: h.errors(),
                sumw: h.sumw,
                underflow: h.underflow,
                overflow: h.overflow,
                entries: h.entries,
                skipped: h.skipped,
            }))
        }
        ResolvedPanel::Two { name, panel } => {
            let mut h = Hist2D::new(panel.x.axis()?, panel.y.axis()?);
            h.fill_sample(sample, &panel.x.expr, &panel.y.expr)?;
            log::debug!("{name}: {} entries, {} skipped", h.entries, h.skipped);
            Ok(PanelArtifact::Hist2d(Hist2DPanel {
                name,
                x_expr: panel.x.expr.to_string(),
                y_expr: panel.y.expr.to_string(),
                x_label: panel.x.label,
                y_label: panel.y.label,
                log_x: panel.x.log_x,
                log_y: panel.y.log_x,
                log_z: panel.log_z,
                x_edges: h.x_axis.edges().to_vec(),
                y_edges: h.y_axis.edges().to_vec(),
                sumw: h.sumw,
                outside: h.outside,
                entries: h.entries,
                skipped: h.skipped,
            }))
        }
    }
}

/// Fill every requested panel from `sample`.
pub fn build_kinematics(
    sample: &EventSample,
    catalog: &PlotCatalog,
    panels: &[PanelSpec],
    layout: &Layout,
    source: &str,
) -> Result<KinematicsArtifact> {
    if layout.ncols == 0 {
        return Err(Error::Validation("ncols must be >= 1".into()));
    }
    if panels.is_empty() {
        return Err(Error::Validation("no panels requested".into()));
    }

    let filled = panels
        .iter()
        .map(|spec| fill_panel(sample, catalog.resolve(spec)?))
        .collect::<Result<Vec<_>>>()?;

    Ok(KinematicsArtifact {
        schema_version: KINEMATICS_SCHEMA_V1.to_string(),
        meta: ArtifactMeta::now()?,
        source: SourceInfo {
            description: source.to_string(),
            n_events: sample.n_events(),
            sum_weights: sample.weights().iter().sum(),
        },
        title: layout.title.clone(),
        ncols: layout.ncols,
        nrows: filled.len().div_ceil(layout.ncols),
        panels: filled,
    })
}
