//! Columnar event storage.

use std::collections::{BTreeMap, HashMap};

use ts_core::{Error, Result};

/// Columnar event sample (Structure-of-Arrays).
///
/// Columns may contain non-finite values (undefined angles and the like);
/// consumers decide how to treat them. Weights are always finite and default
/// to `1.0` when the source carries none.
#[derive(Debug, Clone)]
pub struct EventSample {
    n_events: usize,
    column_names: Vec<String>,
    columns: Vec<Vec<f64>>,
    name_to_index: HashMap<String, usize>,
    weights: Vec<f64>,
    weighted: bool,
}

impl EventSample {
    /// Create a sample from already materialized columns.
    ///
    /// Columns keep the order in which they are given. All columns and the
    /// optional weights must have the same length.
    pub fn from_columns(
        columns: impl IntoIterator<Item = (String, Vec<f64>)>,
        weights: Option<Vec<f64>>,
    ) -> Result<Self> {
        let mut column_names = Vec::new();
        let mut cols = Vec::new();
        let mut n_events: Option<usize> = None;

        for (name, col) in columns {
            if column_names.contains(&name) {
                return Err(Error::Validation(format!("duplicate column '{name}'")));
            }
            let n = col.len();
            if let Some(ne) = n_events {
                if n != ne {
                    return Err(Error::Validation(format!(
                        "column length mismatch for '{name}': expected {ne}, got {n}"
                    )));
                }
            } else {
                n_events = Some(n);
            }
            column_names.push(name);
            cols.push(col);
        }

        if column_names.is_empty() {
            return Err(Error::Validation("EventSample requires at least one column".into()));
        }
        let n_events = n_events.unwrap_or(0);

        let weighted = weights.is_some();
        let weights = match weights {
            Some(w) => {
                if w.len() != n_events {
                    return Err(Error::Validation(format!(
                        "weights length mismatch: expected {n_events}, got {}",
                        w.len()
                    )));
                }
                if w.iter().any(|x| !x.is_finite()) {
                    return Err(Error::Validation("weights must be finite".into()));
                }
                w
            }
            None => vec![1.0; n_events],
        };

        let name_to_index =
            column_names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect::<HashMap<_, _>>();

        Ok(Self { n_events, column_names, columns: cols, name_to_index, weights, weighted })
    }

    /// Number of events.
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    /// Names of stored columns (stable order).
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        let idx = self.name_to_index.get(name).copied()?;
        self.columns.get(idx).map(|c| c.as_slice())
    }

    /// Get a column by name, failing with a validation error if it is absent.
    pub fn require_column(&self, name: &str) -> Result<&[f64]> {
        self.column(name).ok_or_else(|| {
            Error::Validation(format!(
                "missing column '{name}' (available: {})",
                self.column_names.join(", ")
            ))
        })
    }

    /// Per-event weights (all ones for unweighted sources).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Whether the weights came from the source rather than the unit default.
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Sum of weights over a subset of events.
    pub fn total_weight(&self, indices: &[usize]) -> f64 {
        indices.iter().map(|&i| self.weights[i]).sum()
    }

    /// Indices of events whose columns are all finite.
    pub fn finite_indices(&self, columns: &[&str]) -> Result<Vec<usize>> {
        let cols = columns.iter().map(|c| self.require_column(c)).collect::<Result<Vec<_>>>()?;
        Ok((0..self.n_events).filter(|&i| cols.iter().all(|c| c[i].is_finite())).collect())
    }

    /// Restrict `indices` to events with `lo <= column < hi`.
    pub fn select_range(
        &self,
        column: &str,
        indices: &[usize],
        lo: f64,
        hi: f64,
    ) -> Result<Vec<usize>> {
        let col = self.require_column(column)?;
        Ok(indices.iter().copied().filter(|&i| col[i] >= lo && col[i] < hi).collect())
    }

    /// Keep only the first `max` events.
    pub fn truncate(&self, max: usize) -> Self {
        if max >= self.n_events {
            return self.clone();
        }
        let columns = self.columns.iter().map(|c| c[..max].to_vec()).collect();
        Self {
            n_events: max,
            column_names: self.column_names.clone(),
            columns,
            name_to_index: self.name_to_index.clone(),
            weights: self.weights[..max].to_vec(),
            weighted: self.weighted,
        }
    }

    /// Count of non-finite values per column, for columns that have any.
    pub fn non_finite_counts(&self) -> BTreeMap<String, usize> {
        self.column_names
            .iter()
            .zip(&self.columns)
            .filter_map(|(name, col)| {
                let n = col.iter().filter(|v| !v.is_finite()).count();
                (n > 0).then(|| (name.clone(), n))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_sample() -> EventSample {
        EventSample::from_columns(
            vec![
                ("X".to_string(), vec![0.01, 0.02, 0.03, 0.04]),
                ("Q2".to_string(), vec![1.0, 4.0, f64::NAN, 16.0]),
            ],
            Some(vec![1.0, 0.5, 2.0, 1.5]),
        )
        .unwrap()
    }

    #[test]
    fn test_from_columns() {
        let s = make_sample();
        assert_eq!(s.n_events(), 4);
        assert_eq!(s.column_names(), &["X".to_string(), "Q2".to_string()]);
        assert_eq!(s.column("X").unwrap()[1], 0.02);
        assert!(s.column("Z").is_none());
        assert!(s.is_weighted());
    }

    #[test]
    fn test_unweighted_defaults_to_ones() {
        let s = EventSample::from_columns(vec![("X".to_string(), vec![1.0, 2.0])], None).unwrap();
        assert_eq!(s.weights(), &[1.0, 1.0]);
        assert!(!s.is_weighted());
    }

    #[test]
    fn test_length_mismatch() {
        let r = EventSample::from_columns(
            vec![("a".to_string(), vec![1.0, 2.0]), ("b".to_string(), vec![1.0])],
            None,
        );
        assert!(r.is_err());

        let r = EventSample::from_columns(vec![("a".to_string(), vec![1.0])], Some(vec![]));
        assert!(r.is_err());
    }

    #[test]
    fn test_non_finite_weights_rejected() {
        let r = EventSample::from_columns(vec![("a".to_string(), vec![1.0])], Some(vec![f64::NAN]));
        assert!(r.is_err());
    }

    #[test]
    fn test_select_range_is_half_open() {
        let s = make_sample();
        let idx = s.select_range("X", &[0, 1, 2, 3], 0.02, 0.04).unwrap();
        assert_eq!(idx, vec![1, 2]);
        assert_eq!(s.total_weight(&idx), 2.5);
    }

    #[test]
    fn test_finite_indices_and_counts() {
        let s = make_sample();
        assert_eq!(s.finite_indices(&["X", "Q2"]).unwrap(), vec![0, 1, 3]);
        assert_eq!(s.non_finite_counts().get("Q2"), Some(&1));
        assert!(s.finite_indices(&["missing"]).is_err());
    }

    #[test]
    fn test_truncate() {
        let s = make_sample().truncate(2);
        assert_eq!(s.n_events(), 2);
        assert_eq!(s.weights(), &[1.0, 0.5]);
        assert_eq!(s.column("X").unwrap(), &[0.01, 0.02]);
    }
}
