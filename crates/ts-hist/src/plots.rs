//! Per-variable plot presets.
//!
//! The catalog holds one [`PlotConfig`] per kinematic variable and the two
//! classic 2D panels, `xQ` (x vs Q, log-log) and `zpT` (z vs transverse
//! momentum). Panels are requested by name (`"Z"`, `"xQ"`) or as a pair of
//! 1D names (`["X", "Q2"]`), which plots the two configs against each other.

use std::f64::consts::PI;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ts_core::{Error, Result};

use crate::axis::Axis;
use crate::expr::{ExprFunc, VariableExpr};

/// Axis and labelling of one plotted variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotConfig {
    /// What to fill.
    pub expr: VariableExpr,
    /// Axis title.
    pub label: String,
    /// Number of bins.
    pub bins: usize,
    /// Axis range `[lo, hi)`.
    pub x_range: [f64; 2],
    /// Log-spaced bins.
    pub log_x: bool,
    /// Log scale for the contents axis.
    pub log_y: bool,
}

impl PlotConfig {
    fn new(expr: VariableExpr, label: &str, bins: usize, lo: f64, hi: f64) -> Self {
        Self { expr, label: label.to_string(), bins, x_range: [lo, hi], log_x: false, log_y: false }
    }

    fn log_x(mut self) -> Self {
        self.log_x = true;
        self
    }

    /// Build the binned axis.
    pub fn axis(&self) -> Result<Axis> {
        let [lo, hi] = self.x_range;
        if self.log_x { Axis::log(self.bins, lo, hi) } else { Axis::linear(self.bins, lo, hi) }
    }

    /// Apply the fields set in `patch`.
    pub fn apply(&mut self, patch: &PlotConfigPatch) {
        if let Some(e) = &patch.expr {
            self.expr = e.clone();
        }
        if let Some(l) = &patch.label {
            self.label = l.clone();
        }
        if let Some(b) = patch.bins {
            self.bins = b;
        }
        if let Some(r) = patch.x_range {
            self.x_range = r;
        }
        if let Some(v) = patch.log_x {
            self.log_x = v;
        }
        if let Some(v) = patch.log_y {
            self.log_y = v;
        }
    }
}

/// Partial override of a [`PlotConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlotConfigPatch {
    /// New expression.
    pub expr: Option<VariableExpr>,
    /// New axis title.
    pub label: Option<String>,
    /// New bin count.
    pub bins: Option<usize>,
    /// New range.
    pub x_range: Option<[f64; 2]>,
    /// New log-binning flag.
    pub log_x: Option<bool>,
    /// New log-contents flag.
    pub log_y: Option<bool>,
}

/// A 2D panel: two axes plus a log flag for the contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel2D {
    /// Horizontal axis.
    pub x: PlotConfig,
    /// Vertical axis.
    pub y: PlotConfig,
    /// Log scale for the contents.
    pub log_z: bool,
}

/// How a panel is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PanelSpec {
    /// A 1D variable or a named 2D preset.
    Named(String),
    /// Two 1D variables plotted against each other.
    Pair(String, String),
}

/// A panel with its configuration resolved from the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedPanel {
    /// 1D histogram.
    One {
        /// Panel name.
        name: String,
        /// Axis configuration.
        config: PlotConfig,
    },
    /// 2D histogram.
    Two {
        /// Panel name.
        name: String,
        /// Axis configurations.
        panel: Panel2D,
    },
}

impl ResolvedPanel {
    /// Branches the panel reads.
    pub fn branches(&self) -> Vec<&str> {
        match self {
            ResolvedPanel::One { config, .. } => vec![config.expr.branch_name()],
            ResolvedPanel::Two { panel, .. } => {
                vec![panel.x.expr.branch_name(), panel.y.expr.branch_name()]
            }
        }
    }
}

/// Default plot configurations, keyed by variable name.
#[derive(Debug, Clone, PartialEq)]
pub struct PlotCatalog {
    plots: IndexMap<String, PlotConfig>,
    panels: IndexMap<String, Panel2D>,
}

impl Default for PlotCatalog {
    fn default() -> Self {
        let b = VariableExpr::branch;
        let mut plots = IndexMap::new();
        let mut add = |name: &str, cfg: PlotConfig| {
            plots.insert(name.to_string(), cfg);
        };
        add("X", PlotConfig::new(b("X"), "x", 50, 1e-4, 1.0).log_x());
        add("Q2", PlotConfig::new(b("Q2"), "Q^{2} [GeV^{2}]", 50, 1.0, 1e4).log_x());
        add(
            "Q",
            PlotConfig::new(VariableExpr::with_func("Q2", ExprFunc::Sqrt), "Q [GeV]", 50, 1.0, 100.0)
                .log_x(),
        );
        add("Y", PlotConfig::new(b("Y"), "y", 50, 0.0, 1.0));
        add("W", PlotConfig::new(b("W"), "W [GeV]", 50, 0.0, 150.0));
        add("Z", PlotConfig::new(b("Z"), "z", 50, 0.0, 1.0));
        add("PhPerp", PlotConfig::new(b("PhPerp"), "P_{h#perp} [GeV]", 50, 0.0, 3.0));
        add("Mh", PlotConfig::new(b("Mh"), "M_{h} [GeV]", 50, 0.0, 3.0));
        add("xF", PlotConfig::new(b("xF"), "x_{F}", 50, -1.0, 1.0));
        add("XF", PlotConfig::new(b("XF"), "x_{F}", 50, -1.0, 1.0));
        add("XF1", PlotConfig::new(b("XF1"), "x_{F,1}", 50, -1.0, 1.0));
        add("XF2", PlotConfig::new(b("XF2"), "x_{F,2}", 50, -1.0, 1.0));
        add("PhiH", PlotConfig::new(b("PhiH"), "#phi_{h}", 50, -PI, PI));
        add("PhiRperp", PlotConfig::new(b("PhiRperp"), "#phi_{R#perp}", 50, -PI, PI));
        add("ThetaCOM", PlotConfig::new(b("ThetaCOM"), "#theta_{COM}", 50, 0.0, PI));
        add("MX", PlotConfig::new(b("MX"), "M_{X} [GeV]", 50, 0.0, 50.0));
        add("Depol_SIDIS", PlotConfig::new(b("Depol_SIDIS"), "depolarization", 50, 0.0, 2.0));

        let mut panels = IndexMap::new();
        panels.insert(
            "xQ".to_string(),
            Panel2D { x: plots["X"].clone(), y: plots["Q"].clone(), log_z: true },
        );
        panels.insert(
            "zpT".to_string(),
            Panel2D {
                x: PlotConfig::new(b("Z"), "z", 50, 0.0, 28.0),
                y: PlotConfig::new(b("PhPerp"), "p_{T} [GeV]", 50, 0.0, 100.0),
                log_z: true,
            },
        );

        Self { plots, panels }
    }
}

impl PlotCatalog {
    /// Names of the 1D presets, in catalog order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plots.keys().map(String::as_str)
    }

    /// Names of the 2D presets.
    pub fn panel_names(&self) -> impl Iterator<Item = &str> {
        self.panels.keys().map(String::as_str)
    }

    /// 1D configuration for `name`.
    pub fn get(&self, name: &str) -> Result<&PlotConfig> {
        self.plots.get(name).ok_or_else(|| {
            Error::Validation(format!(
                "no plot config for '{name}' (known: {})",
                self.names().collect::<Vec<_>>().join(", ")
            ))
        })
    }

    /// Override fields of the 1D configuration `name`.
    pub fn update(&mut self, name: &str, patch: &PlotConfigPatch) -> Result<()> {
        self.get(name)?;
        if let Some(cfg) = self.plots.get_mut(name) {
            cfg.apply(patch);
        }
        Ok(())
    }

    /// Resolve a requested panel. Names are looked up among 2D presets first.
    pub fn resolve(&self, spec: &PanelSpec) -> Result<ResolvedPanel> {
        match spec {
            PanelSpec::Named(name) => match self.panels.get(name) {
                Some(panel) => Ok(ResolvedPanel::Two { name: name.clone(), panel: panel.clone() }),
                None => Ok(ResolvedPanel::One { name: name.clone(), config: self.get(name)?.clone() }),
            },
            PanelSpec::Pair(x, y) => {
                let panel = Panel2D { x: self.get(x)?.clone(), y: self.get(y)?.clone(), log_z: true };
                Ok(ResolvedPanel::Two { name: format!("{x}_vs_{y}"), panel })
            }
        }
    }
}
