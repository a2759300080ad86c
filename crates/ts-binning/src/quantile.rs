//! Weighted equal-population bin edges.
//!
//! Edges are picked so that each bin carries roughly the same total weight.
//! Targets `total * k / N` are mapped to the first sorted value whose
//! cumulative weight reaches the target; there is no interpolation between
//! neighbouring values, so heavy duplicates can collapse several edges onto
//! the same value.

use ts_core::{Error, Result};

/// Compute `n_bins + 1` weighted equal-population edges over `values`.
///
/// Returns `Ok(None)` for an empty sample; callers skip that dimension.
pub fn weighted_equal_bins(
    values: &[f64],
    weights: &[f64],
    n_bins: usize,
) -> Result<Option<Vec<f64>>> {
    let indices: Vec<usize> = (0..values.len()).collect();
    weighted_equal_bins_indexed(values, weights, &indices, n_bins)
}

/// [`weighted_equal_bins`] over the rows of `column` selected by `indices`.
pub fn weighted_equal_bins_indexed(
    column: &[f64],
    weights: &[f64],
    indices: &[usize],
    n_bins: usize,
) -> Result<Option<Vec<f64>>> {
    if n_bins == 0 {
        return Err(Error::Validation("n_bins must be >= 1".into()));
    }
    if column.len() != weights.len() {
        return Err(Error::Validation(format!(
            "values/weights length mismatch: {} vs {}",
            column.len(),
            weights.len()
        )));
    }
    if indices.is_empty() {
        return Ok(None);
    }

    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(indices.len());
    for &i in indices {
        let (Some(&v), Some(&w)) = (column.get(i), weights.get(i)) else {
            return Err(Error::Validation(format!(
                "row index {i} out of range for {} rows",
                column.len()
            )));
        };
        if !v.is_finite() {
            return Err(Error::Validation(format!("non-finite value at row {i}")));
        }
        if !w.is_finite() || w < 0.0 {
            return Err(Error::Validation(format!("invalid weight {w} at row {i}")));
        }
        pairs.push((v, w));
    }
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut cumsum = Vec::with_capacity(pairs.len());
    let mut acc = 0.0;
    for &(_, w) in &pairs {
        acc += w;
        cumsum.push(acc);
    }
    let total = acc;
    let last = pairs.len() - 1;

    let mut edges = Vec::with_capacity(n_bins + 1);
    edges.push(pairs[0].0);
    for k in 1..n_bins {
        let target = total * k as f64 / n_bins as f64;
        let pos = cumsum.partition_point(|&c| c < target).min(last);
        edges.push(pairs[pos].0);
    }
    edges.push(pairs[last].0);

    Ok(Some(edges))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ten_values_two_bins() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let weights = vec![1.0; 10];
        let edges = weighted_equal_bins(&values, &weights, 2).unwrap().unwrap();
        assert_eq!(edges, vec![1.0, 5.0, 10.0]);
    }

    #[test]
    fn test_empty_is_none() {
        assert_eq!(weighted_equal_bins(&[], &[], 4).unwrap(), None);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(weighted_equal_bins(&[1.0], &[1.0], 0).is_err());
        assert!(weighted_equal_bins(&[1.0, 2.0], &[1.0], 2).is_err());
        assert!(weighted_equal_bins(&[f64::NAN], &[1.0], 2).is_err());
        assert!(weighted_equal_bins(&[1.0], &[-1.0], 2).is_err());
        assert!(weighted_equal_bins_indexed(&[1.0], &[1.0], &[3], 2).is_err());
    }

    #[test]
    fn test_weights_shift_edges() {
        // Cumulative weight first reaches half the total (3 of 6) at the third value.
        let values = [1.0, 2.0, 3.0, 4.0];
        let weights = [1.0, 1.0, 1.0, 3.0];
        let edges = weighted_equal_bins(&values, &weights, 2).unwrap().unwrap();
        assert_eq!(edges, vec![1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_duplicates_collapse_edges() {
        let values = [5.0, 5.0, 5.0, 5.0, 6.0];
        let edges = weighted_equal_bins(&values, &[1.0; 5], 4).unwrap().unwrap();
        assert_eq!(edges, vec![5.0, 5.0, 5.0, 5.0, 6.0]);
    }

    #[test]
    fn test_indexed_subset() {
        let column = [10.0, 1.0, 20.0, 2.0, 30.0, 3.0];
        let weights = [1.0; 6];
        let edges = weighted_equal_bins_indexed(&column, &weights, &[1, 3, 5], 1).unwrap().unwrap();
        assert_eq!(edges, vec![1.0, 3.0]);
    }

    #[test]
    fn test_unsorted_input() {
        let values = [9.0, 1.0, 5.0, 3.0, 7.0, 2.0, 8.0, 4.0, 6.0, 10.0];
        let edges = weighted_equal_bins(&values, &[1.0; 10], 2).unwrap().unwrap();
        assert_eq!(edges, vec![1.0, 5.0, 10.0]);
    }

    proptest! {
        #[test]
        fn prop_edges_span_and_are_monotone(
            values in proptest::collection::vec(-1e3f64..1e3, 1..200),
            raw_weights in proptest::collection::vec(0.0f64..5.0, 200),
            n_bins in 1usize..=25,
        ) {
            let weights = &raw_weights[..values.len()];
            let edges = weighted_equal_bins(&values, weights, n_bins).unwrap().unwrap();

            prop_assert_eq!(edges.len(), n_bins + 1);
            for w in edges.windows(2) {
                prop_assert!(w[0] <= w[1]);
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert_eq!(edges[0], min);
            prop_assert_eq!(edges[n_bins], max);
        }

        #[test]
        fn prop_unit_weights_match_lower_quantiles(
            values in proptest::collection::vec(-1e3f64..1e3, 1..200),
            n_bins in 1usize..=25,
        ) {
            let n = values.len();
            let edges = weighted_equal_bins(&values, &vec![1.0; n], n_bins).unwrap().unwrap();

            let mut sorted = values.clone();
            sorted.sort_by(f64::total_cmp);
            for k in 1..n_bins {
                // First position whose cumulative count reaches n*k/N.
                let pos = (n * k).div_ceil(n_bins).max(1) - 1;
                prop_assert_eq!(edges[k], sorted[pos.min(n - 1)]);
            }
        }
    }
}
