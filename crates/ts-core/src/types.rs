//! Kinematic variable catalogue shared by binning tables and injection results.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lower bound written for a variable a bin does not constrain.
pub const SENTINEL_MIN: f64 = 0.0;
/// Upper bound written for a variable a bin does not constrain.
pub const SENTINEL_MAX: f64 = 9999.0;

/// A variable that can appear as a `<name>_min` / `<name>_max` column pair in a bin table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    /// Bjorken x.
    X,
    /// Photon virtuality Q (the table stores Q, not Q²).
    Q,
    /// Hadron (pair) energy fraction z.
    Z,
    /// Dihadron invariant mass.
    Mh,
    /// Hadron transverse momentum.
    PhPerp,
}

/// How bin edges computed on a branch map onto table bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeTransform {
    /// Edges are stored as computed.
    Identity,
    /// Edges are stored as their square root (Q² edges become Q bounds).
    Sqrt,
}

impl EdgeTransform {
    /// Apply the transform to one edge value.
    pub fn apply(self, v: f64) -> f64 {
        match self {
            EdgeTransform::Identity => v,
            EdgeTransform::Sqrt => v.sqrt(),
        }
    }
}

/// Result of resolving a user-facing variable name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedVariable {
    /// Table variable the name refers to.
    pub variable: Variable,
    /// Transform from branch-space edges to table bounds.
    pub transform: EdgeTransform,
}

impl Variable {
    /// Every variable, in canonical column order.
    pub const ALL: [Variable; 5] =
        [Variable::X, Variable::Q, Variable::Z, Variable::Mh, Variable::PhPerp];

    /// Column set of the historical binning-table format.
    pub const DEFAULT_TABLE: [Variable; 4] = [Variable::X, Variable::Q, Variable::Z, Variable::Mh];

    /// Variables an injection grid may be defined over.
    pub const INJECTION_GRID: [Variable; 4] =
        [Variable::X, Variable::Q, Variable::Z, Variable::PhPerp];

    /// Column prefix (`X`, `Q`, `Z`, `Mh`, `PhPerp`).
    pub fn prefix(self) -> &'static str {
        match self {
            Variable::X => "X",
            Variable::Q => "Q",
            Variable::Z => "Z",
            Variable::Mh => "Mh",
            Variable::PhPerp => "PhPerp",
        }
    }

    /// Name of the lower-bound column.
    pub fn min_column(self) -> String {
        format!("{}_min", self.prefix())
    }

    /// Name of the upper-bound column.
    pub fn max_column(self) -> String {
        format!("{}_max", self.prefix())
    }

    /// Event-tree branch this variable is usually binned on.
    pub fn default_branch(self) -> &'static str {
        match self {
            Variable::Q => "Q2",
            other => other.prefix(),
        }
    }

    /// Transform applied to edges computed on [`Variable::default_branch`].
    pub fn default_transform(self) -> EdgeTransform {
        match self {
            Variable::Q => EdgeTransform::Sqrt,
            _ => EdgeTransform::Identity,
        }
    }

    /// Look up a variable by table prefix only (`Q2` is rejected here).
    pub fn from_prefix(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|v| v.prefix() == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))
    }

    /// Resolve a user-facing name. `Q2` maps to `Q` with a square-root edge transform.
    ///
    /// Unknown names are a caller error and fail immediately.
    pub fn from_name(name: &str) -> Result<ResolvedVariable> {
        if name == "Q2" {
            return Ok(ResolvedVariable { variable: Variable::Q, transform: EdgeTransform::Sqrt });
        }
        let variable = Self::from_prefix(name)?;
        Ok(ResolvedVariable { variable, transform: EdgeTransform::Identity })
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
