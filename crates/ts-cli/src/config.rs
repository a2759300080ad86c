//! YAML configuration files for the `tmdstat` subcommands.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use ts_binning::{DimensionSpec, GridDimension, HierarchicalBinning, TableDefaults, log_x_edges};
use ts_events::DEFAULT_WEIGHT_BRANCH;
use ts_hist::{Layout, PanelSpec, PlotCatalog, PlotConfigPatch};

/// Read and parse a YAML file.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    serde_yaml_ng::from_str(&text)
        .with_context(|| format!("failed to parse config {}", path.display()))
}

fn default_weight() -> Option<String> {
    Some(DEFAULT_WEIGHT_BRANCH.to_string())
}

/// One binned dimension: a branch name and its bin count.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DimConfig {
    pub name: String,
    pub bins: usize,
}

/// `bin-table` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinningConfig {
    pub dims: Vec<DimConfig>,
    pub weight: Option<String>,
    pub max_entries: Option<usize>,
    pub keep_empty_leaves: bool,
    pub defaults: TableDefaults,
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            dims: ["X", "Q2", "Z", "Mh"]
                .into_iter()
                .map(|n| DimConfig { name: n.to_string(), bins: 10 })
                .collect(),
            weight: default_weight(),
            max_entries: None,
            keep_empty_leaves: false,
            defaults: TableDefaults::default(),
        }
    }
}

impl BinningConfig {
    /// Replace the dimension list from `X:10,Q2:5` style text.
    pub fn set_dims_from_arg(&mut self, arg: &str) -> Result<()> {
        let mut dims = Vec::new();
        for part in arg.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, bins) = part
                .split_once(':')
                .with_context(|| format!("invalid dimension '{part}': expected 'name:bins'"))?;
            let bins: usize =
                bins.parse().with_context(|| format!("bad bin count in '{part}'"))?;
            dims.push(DimConfig { name: name.to_string(), bins });
        }
        self.dims = dims;
        Ok(())
    }

    pub fn binning(&self) -> Result<HierarchicalBinning> {
        let dims = self
            .dims
            .iter()
            .map(|d| DimensionSpec::new(&d.name, d.bins))
            .collect::<ts_core::Result<Vec<_>>>()?;
        Ok(HierarchicalBinning { dims, keep_empty_leaves: self.keep_empty_leaves })
    }
}

/// A grid dimension given by explicit edges or a named preset.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridDimConfig {
    pub name: String,
    #[serde(default)]
    pub edges: Option<Vec<f64>>,
    #[serde(default)]
    pub preset: Option<String>,
}

/// `grid-table` configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    pub dims: Vec<GridDimConfig>,
    pub defaults: TableDefaults,
}

impl GridConfig {
    pub fn dimensions(&self) -> Result<Vec<GridDimension>> {
        self.dims
            .iter()
            .map(|d| {
                let edges = match (&d.edges, d.preset.as_deref()) {
                    (Some(e), None) => e.clone(),
                    (None, Some("log_x")) => log_x_edges(),
                    (None, Some(other)) => {
                        anyhow::bail!("unknown edge preset '{other}' for '{}' (known: log_x)", d.name)
                    }
                    (Some(_), Some(_)) => {
                        anyhow::bail!("dimension '{}' sets both edges and preset", d.name)
                    }
                    (None, None) => anyhow::bail!("dimension '{}' needs edges or a preset", d.name),
                };
                Ok(GridDimension::new(d.name.clone(), edges))
            })
            .collect()
    }
}

fn default_ncols() -> usize {
    3
}

fn default_panels() -> Vec<PanelSpec> {
    ["xQ", "zpT", "X", "Q2", "Z", "PhPerp"].into_iter().map(|n| PanelSpec::Named(n.into())).collect()
}

/// `kinematics` configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KinematicsConfig {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_ncols")]
    pub ncols: usize,
    #[serde(default = "default_panels")]
    pub panels: Vec<PanelSpec>,
    /// Per-variable overrides of the default plot presets.
    #[serde(default)]
    pub overrides: BTreeMap<String, PlotConfigPatch>,
    #[serde(default = "default_weight")]
    pub weight: Option<String>,
    #[serde(default)]
    pub max_entries: Option<usize>,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            title: None,
            ncols: default_ncols(),
            panels: default_panels(),
            overrides: BTreeMap::new(),
            weight: default_weight(),
            max_entries: None,
        }
    }
}

impl KinematicsConfig {
    pub fn catalog(&self) -> Result<PlotCatalog> {
        let mut catalog = PlotCatalog::default();
        for (name, patch) in &self.overrides {
            catalog.update(name, patch)?;
        }
        Ok(catalog)
    }

    pub fn layout(&self) -> Layout {
        Layout { title: self.title.clone(), ncols: self.ncols }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_core::Variable;

    #[test]
    fn test_binning_defaults_and_dims_arg() {
        let mut cfg: BinningConfig = serde_yaml_ng::from_str("keep_empty_leaves: true\n").unwrap();
        assert_eq!(cfg.dims.len(), 4);
        assert_eq!(cfg.weight.as_deref(), Some("Weight"));
        cfg.set_dims_from_arg("X:4, Q2:3").unwrap();
        let b = cfg.binning().unwrap();
        assert_eq!(b.dims[1].variable, Variable::Q);
        assert_eq!(b.dims[1].n_bins, 3);
        assert!(b.keep_empty_leaves);
        assert!(cfg.set_dims_from_arg("X").is_err());
        cfg.set_dims_from_arg("Y:3").unwrap();
        assert!(cfg.binning().is_err());
    }

    #[test]
    fn test_grid_config() {
        let cfg: GridConfig = serde_yaml_ng::from_str(
            "dims:\n  - name: X\n    preset: log_x\n  - name: Q2\n    edges: [1, 10, 100]\ndefaults:\n  AUT: 0.2\n",
        )
        .unwrap();
        let dims = cfg.dimensions().unwrap();
        assert_eq!(dims[0].edges.len(), 21);
        assert_eq!(dims[1].edges, vec![1.0, 10.0, 100.0]);
        assert_eq!(cfg.defaults.aut, 0.2);
        assert_eq!(cfg.defaults.itar, 1);

        let bad: GridConfig = serde_yaml_ng::from_str("dims:\n  - name: X\n").unwrap();
        assert!(bad.dimensions().is_err());
    }

    #[test]
    fn test_kinematics_config() {
        let cfg: KinematicsConfig = serde_yaml_ng::from_str(
            "title: ep 10x100\nncols: 2\npanels: [xQ, [X, Q2]]\noverrides:\n  Q2:\n    x_range: [1, 1000]\n",
        )
        .unwrap();
        assert_eq!(cfg.panels.len(), 2);
        assert_eq!(cfg.catalog().unwrap().get("Q2").unwrap().x_range, [1.0, 1000.0]);
        assert_eq!(cfg.layout().ncols, 2);

        let default = KinematicsConfig::default();
        assert_eq!(default.panels.len(), 6);
        let bad: KinematicsConfig =
            serde_yaml_ng::from_str("overrides:\n  Nope:\n    bins: 3\n").unwrap();
        assert!(bad.catalog().is_err());
    }
}
