//! Fixed-edge grid tables.

use serde::{Deserialize, Serialize};

use ts_core::{Error, Result, Variable};

use crate::table::{BinRow, BinTable, TableDefaults};

/// Twenty logarithmic X bins from 1e-4 to 1.
pub const LOG_X_EDGES: [f64; 21] = [
    0.0001, 0.0001585, 0.0002512, 0.0003981, 0.000631, 0.001, 0.0015849, 0.0025119, 0.0039811,
    0.0063096, 0.01, 0.0158489, 0.0251189, 0.0398107, 0.0630957, 0.1, 0.1584893, 0.2511886,
    0.3981072, 0.6309573, 1.0,
];

/// Preset logarithmic X edges.
pub fn log_x_edges() -> Vec<f64> {
    LOG_X_EDGES.to_vec()
}

/// Edges of one grid dimension. `name` is any name [`Variable::from_name`]
/// accepts; `Q2` edges are stored as `Q`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDimension {
    /// Variable name.
    pub name: String,
    /// Bin edges, non-decreasing, at least two.
    pub edges: Vec<f64>,
}

impl GridDimension {
    /// Dimension over `edges`.
    pub fn new(name: impl Into<String>, edges: Vec<f64>) -> Self {
        Self { name: name.into(), edges }
    }
}

/// Cartesian product of per-dimension bins.
///
/// The first dimension varies slowest. Variables no dimension names keep the
/// sentinel bounds.
pub fn generate_grid_table(dims: &[GridDimension], defaults: &TableDefaults) -> Result<BinTable> {
    if dims.is_empty() {
        return Err(Error::Validation("grid table needs at least one dimension".into()));
    }

    let mut resolved: Vec<(Variable, Vec<f64>)> = Vec::with_capacity(dims.len());
    for d in dims {
        let r = Variable::from_name(&d.name)?;
        if d.edges.len() < 2 {
            return Err(Error::Validation(format!(
                "dimension '{}' needs at least 2 edges, got {}",
                d.name,
                d.edges.len()
            )));
        }
        if d.edges.iter().any(|e| !e.is_finite()) || d.edges.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::Validation(format!(
                "edges of '{}' must be finite and non-decreasing",
                d.name
            )));
        }
        if resolved.iter().any(|(v, _)| *v == r.variable) {
            return Err(Error::Validation(format!("variable {} appears twice", r.variable)));
        }
        let edges: Vec<f64> = d.edges.iter().map(|&e| r.transform.apply(e)).collect();
        resolved.push((r.variable, edges));
    }

    let counts: Vec<usize> = resolved.iter().map(|(_, e)| e.len() - 1).collect();
    let total: usize = counts.iter().product();

    let mut table = BinTable::default();
    let mut idx = vec![0usize; counts.len()];
    for _ in 0..total {
        let row = resolved.iter().zip(&idx).fold(BinRow::new(defaults), |row, ((v, edges), &i)| {
            row.with_bounds(*v, edges[i], edges[i + 1])
        });
        table.push(row);

        // Odometer increment, last dimension fastest.
        for d in (0..counts.len()).rev() {
            idx[d] += 1;
            if idx[d] < counts[d] {
                break;
            }
            idx[d] = 0;
        }
    }

    log::info!("generated grid table with {} bins", table.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_log_x_preset() {
        let e = log_x_edges();
        assert_eq!(e.len(), 21);
        assert_eq!(e[0], 1e-4);
        assert_eq!(e[20], 1.0);
        for (k, v) in e.iter().enumerate() {
            assert_relative_eq!(*v, 10f64.powf(-4.0 + 0.2 * k as f64), max_relative = 1e-4);
        }
    }

    #[test]
    fn test_first_dimension_slowest() {
        let dims = [
            GridDimension::new("X", vec![0.0, 0.1, 0.2]),
            GridDimension::new("Z", vec![0.2, 0.5, 0.8, 1.0]),
        ];
        let t = generate_grid_table(&dims, &TableDefaults::default()).unwrap();
        assert_eq!(t.len(), 6);
        let xs: Vec<f64> = t.rows().iter().map(|r| r.bounds(Variable::X).min).collect();
        let zs: Vec<f64> = t.rows().iter().map(|r| r.bounds(Variable::Z).min).collect();
        assert_eq!(xs, vec![0.0, 0.0, 0.0, 0.1, 0.1, 0.1]);
        assert_eq!(zs, vec![0.2, 0.5, 0.8, 0.2, 0.5, 0.8]);
        assert_eq!(t.rows()[0].bounds(Variable::Mh).max, 9999.0);
    }

    #[test]
    fn test_q2_edges_stored_as_q() {
        let dims = [GridDimension::new("Q2", vec![1.0, 4.0, 25.0])];
        let t = generate_grid_table(&dims, &TableDefaults::default()).unwrap();
        assert_eq!(t.rows()[1].bounds(Variable::Q).min, 2.0);
        assert_eq!(t.rows()[1].bounds(Variable::Q).max, 5.0);
    }

    #[test]
    fn test_phperp_grid_adds_columns() {
        let dims = [GridDimension::new("PhPerp", vec![0.0, 0.5, 1.0])];
        let t = generate_grid_table(&dims, &TableDefaults::default()).unwrap();
        assert!(t.header().contains(&"PhPerp_min".to_string()));
    }

    #[test]
    fn test_validation() {
        let d = TableDefaults::default();
        assert!(generate_grid_table(&[], &d).is_err());
        assert!(generate_grid_table(&[GridDimension::new("X", vec![0.1])], &d).is_err());
        assert!(generate_grid_table(&[GridDimension::new("X", vec![0.2, 0.1])], &d).is_err());
        assert!(generate_grid_table(&[GridDimension::new("W", vec![0.1, 0.2])], &d).is_err());
        let dup =
            [GridDimension::new("Q", vec![1.0, 2.0]), GridDimension::new("Q2", vec![1.0, 4.0])];
        assert!(generate_grid_table(&dup, &d).is_err());
    }
}
