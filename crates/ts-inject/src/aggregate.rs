//! Per-bin aggregation of injection trials.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use ts_binning::{BinBounds, BinTable};
use ts_core::{Result, Variable, stats};

use crate::results::{LoadReport, TrialRecord};

/// Bounds agreeing within this tolerance are considered equal.
const BOUNDS_TOLERANCE: f64 = 1e-6;

/// Summary statistics of all trials of one bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinSummary {
    /// Index of the bin among the table's unique grid bins.
    pub bin_index: usize,
    /// Number of trials.
    pub n: usize,
    /// Extracted values, in load order.
    pub values: Vec<f64>,
    /// Reported errors of the trials that carried one.
    pub errors: Vec<f64>,
    /// Mean extracted value.
    pub mean: f64,
    /// Sample standard deviation of the extracted values (0 for one trial).
    pub std: f64,
    /// Standard error of the mean, `std / sqrt(n)`.
    pub stderr: f64,
    /// Mean reported error.
    pub mean_error: Option<f64>,
    /// Total events over the bin's job entries.
    pub events: Option<f64>,
    /// Injected value.
    pub injected: Option<f64>,
    /// `mean - injected`.
    pub bias: Option<f64>,
    /// Mean of `(value - injected) / error`.
    pub pull_mean: Option<f64>,
    /// Sample standard deviation of the pulls.
    pub pull_std: Option<f64>,
    /// Bin bounds (from the results or the table).
    pub bounds: BTreeMap<Variable, BinBounds>,
}

impl BinSummary {
    fn from_trials(bin_index: usize, trials: &[&TrialRecord]) -> Self {
        let values: Vec<f64> = trials.iter().map(|t| t.value).collect();
        let errors: Vec<f64> = trials.iter().filter_map(|t| t.error).collect();
        let n = values.len();
        let mean = stats::mean(&values);
        let std = stats::sample_std(&values);

        let mut seen_entries = BTreeSet::new();
        let mut events: Option<f64> = None;
        for t in trials {
            if let Some(e) = t.events
                && seen_entries.insert(t.entry_id)
            {
                *events.get_or_insert(0.0) += e;
            }
        }

        let injected = trials.iter().find_map(|t| t.injected);
        if let Some(inj) = injected
            && trials.iter().filter_map(|t| t.injected).any(|v| v != inj)
        {
            log::warn!("bin {bin_index}: trials disagree on the injected value; using {inj}");
        }

        let pulls: Vec<f64> = match injected {
            Some(inj) => trials
                .iter()
                .filter_map(|t| t.error.filter(|e| *e > 0.0).map(|e| (t.value - inj) / e))
                .collect(),
            None => Vec::new(),
        };

        let mut bounds = BTreeMap::new();
        for t in trials {
            for (v, b) in &t.bounds {
                bounds.entry(*v).or_insert(*b);
            }
        }

        Self {
            bin_index,
            n,
            mean,
            std,
            stderr: stats::standard_error(std, n),
            mean_error: (!errors.is_empty()).then(|| stats::mean(&errors)),
            events,
            injected,
            bias: injected.map(|inj| mean - inj),
            pull_mean: (!pulls.is_empty()).then(|| stats::mean(&pulls)),
            pull_std: (!pulls.is_empty()).then(|| stats::sample_std(&pulls)),
            bounds,
            values,
            errors,
        }
    }
}

/// Group trials by bin and summarize each bin. Output is sorted by `bin_index`.
pub fn aggregate(records: &[TrialRecord]) -> Vec<BinSummary> {
    let mut by_bin: BTreeMap<usize, Vec<&TrialRecord>> = BTreeMap::new();
    for r in records {
        by_bin.entry(r.bin_index).or_default().push(r);
    }
    by_bin.into_iter().map(|(bin, trials)| BinSummary::from_trials(bin, &trials)).collect()
}

/// Aggregate a whole load, folding in the events of entries that lost every
/// trial to non-finite values.
pub fn aggregate_report(report: &LoadReport) -> Vec<BinSummary> {
    let mut summaries = aggregate(&report.records);
    for (&bin, &events) in &report.unplaced_events {
        match summaries.iter_mut().find(|s| s.bin_index == bin) {
            Some(s) => *s.events.get_or_insert(0.0) += events,
            None => log::warn!("bin {bin}: {events} events belong to no finite trial; no summary"),
        }
    }
    summaries
}

/// Outcome of [`match_table`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Bins whose index is past the last unique grid bin of the table.
    pub out_of_range: Vec<usize>,
    /// Bins whose echoed bounds disagree with the table.
    pub mismatched: Vec<usize>,
}

/// Complete each summary's bounds from the table.
///
/// `bin_index` counts the table's unique bins over `grid` in first-seen
/// order, the same numbering the injection plan hands to its jobs. Only the
/// grid variables are filled. Bounds the results already carry are kept;
/// disagreements with the table are logged and reported.
pub fn match_table(
    summaries: &mut [BinSummary],
    table: &BinTable,
    grid: &[Variable],
) -> Result<MatchReport> {
    let keys = table.unique_bins(grid)?;
    let mut report = MatchReport::default();
    for s in summaries.iter_mut() {
        let Some(key) = keys.get(s.bin_index) else {
            log::warn!(
                "bin {} is out of range for {} unique bins on the table grid",
                s.bin_index,
                keys.len()
            );
            report.out_of_range.push(s.bin_index);
            continue;
        };
        let mut mismatch = false;
        for (&v, &from_table) in grid.iter().zip(&key.0) {
            match s.bounds.get(&v) {
                Some(b) if !b.approx_eq(&from_table, BOUNDS_TOLERANCE) => {
                    log::warn!(
                        "bin {}: {v} bounds [{}, {}) disagree with table [{}, {})",
                        s.bin_index,
                        b.min,
                        b.max,
                        from_table.min,
                        from_table.max
                    );
                    mismatch = true;
                }
                Some(_) => {}
                None => {
                    s.bounds.insert(v, from_table);
                }
            }
        }
        if mismatch {
            report.mismatched.push(s.bin_index);
        }
    }
    Ok(report)
}

fn opt(v: Option<f64>) -> String {
    v.map_or(String::new(), |x| format!("{x}"))
}

/// Write one CSV row per bin.
///
/// Bound columns are the union of variables present in the summaries.
pub fn write_summary_csv(summaries: &[BinSummary], path: &Path) -> Result<()> {
    let variables: BTreeSet<Variable> =
        summaries.iter().flat_map(|s| s.bounds.keys().copied()).collect();

    let mut wtr = csv::Writer::from_path(path)?;
    let mut header: Vec<String> = [
        "bin_index",
        "n",
        "mean",
        "std",
        "stderr",
        "mean_error",
        "events",
        "injected",
        "bias",
        "pull_mean",
        "pull_std",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    for v in &variables {
        header.push(v.min_column());
        header.push(v.max_column());
    }
    wtr.write_record(&header)?;

    for s in summaries {
        let mut record = vec![
            s.bin_index.to_string(),
            s.n.to_string(),
            format!("{}", s.mean),
            format!("{}", s.std),
            format!("{}", s.stderr),
            opt(s.mean_error),
            opt(s.events),
            opt(s.injected),
            opt(s.bias),
            opt(s.pull_mean),
            opt(s.pull_std),
        ];
        for v in &variables {
            match s.bounds.get(v) {
                Some(b) => {
                    record.push(format!("{}", b.min));
                    record.push(format!("{}", b.max));
                }
                None => record.extend([String::new(), String::new()]),
            }
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    log::info!("wrote {} bin summaries to {}", summaries.len(), path.display());
    Ok(())
}
