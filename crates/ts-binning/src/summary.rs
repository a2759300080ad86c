//! Distribution of per-bin weights in a generated table.

use serde::Serialize;

use ts_core::stats;

/// How many extreme bins to report on each side.
const N_EXTREMES: usize = 5;

/// Summary of the total weight per bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinWeightSummary {
    /// Number of bins summarized (NaN weights dropped).
    pub n_bins: usize,
    /// Up to five smallest weights, ascending.
    pub smallest: Vec<f64>,
    /// Up to five largest weights, ascending.
    pub largest: Vec<f64>,
    /// Mean weight.
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    /// Median weight.
    pub median: f64,
    /// Most common weight after rounding to 6 decimals.
    pub mode: f64,
}

impl BinWeightSummary {
    /// Summarize per-bin weights. `None` when no finite weight remains.
    pub fn from_weights(weights: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = weights.iter().copied().filter(|w| !w.is_nan()).collect();
        if sorted.is_empty() {
            log::warn!("no bins with events");
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let k = N_EXTREMES.min(n);
        Some(Self {
            n_bins: n,
            smallest: sorted[..k].to_vec(),
            largest: sorted[n - k..].to_vec(),
            mean: stats::mean(&sorted),
            std: stats::population_std(&sorted),
            median: stats::median(&sorted),
            mode: stats::mode_rounded(&sorted, 6)?,
        })
    }

    /// Emit the summary through the `log` facade.
    pub fn log(&self) {
        log::info!("bin weights over {} bins", self.n_bins);
        log::info!("  smallest: {:?}", self.smallest);
        log::info!("  largest:  {:?}", self.largest);
        log::info!(
            "  mean {:.6}  std {:.6}  median {:.6}  mode {:.6}",
            self.mean,
            self.std,
            self.median,
            self.mode
        );
    }
}
