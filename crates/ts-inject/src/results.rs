//! Loading injection results from a directory of YAML files.
//!
//! Each `*.yaml` file holds a `jobs:` list. A job entry is a mapping tagged
//! with `bin_index`; the extracted value and its error are either scalars (one
//! trial) or equal-length lists (many trials). Bin bounds echoed by the job
//! (`X_min`, `X_max`, ...) are kept.
//!
//! Nothing here fails the run: a missing directory, an unreadable file or a
//! malformed entry is logged and skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;

use ts_binning::BinBounds;
use ts_core::Variable;

/// Keys read from each job entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    /// Extracted asymmetry.
    pub value: String,
    /// Statistical error of the extracted asymmetry.
    pub error: String,
    /// Injected asymmetry.
    pub injected: String,
    /// Number of events in the bin.
    pub events: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            value: "AUT_extracted".to_string(),
            error: "AUT_extracted_err".to_string(),
            injected: "AUT".to_string(),
            events: "events".to_string(),
        }
    }
}

/// One simulated trial for one bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    /// Unique grid bin the job ran on.
    pub bin_index: usize,
    /// Job entry the trial came from (global load order).
    pub entry_id: usize,
    /// Extracted value.
    pub value: f64,
    /// Statistical error of `value`.
    pub error: Option<f64>,
    /// Events of the job entry.
    pub events: Option<f64>,
    /// Injected value.
    pub injected: Option<f64>,
    /// Bounds echoed by the job.
    pub bounds: BTreeMap<Variable, BinBounds>,
}

/// Everything [`load_results`] found.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Trials sorted by `bin_index` (stable within a bin).
    pub records: Vec<TrialRecord>,
    /// Files parsed.
    pub files_read: usize,
    /// Files that could not be read or parsed.
    pub files_skipped: usize,
    /// Job entries skipped as malformed.
    pub entries_skipped: usize,
    /// Events of entries that yielded no finite trial, summed by bin.
    pub unplaced_events: BTreeMap<usize, f64>,
}

/// A parsed job entry.
struct ParsedEntry {
    bin_index: usize,
    events: Option<f64>,
    trials: Vec<TrialRecord>,
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Scalar or list of numbers.
fn as_f64_list(v: &Value) -> Option<Vec<f64>> {
    match v {
        Value::Sequence(seq) => seq.iter().map(as_f64).collect(),
        other => as_f64(other).map(|x| vec![x]),
    }
}

fn as_index(v: &Value) -> Option<usize> {
    match v {
        Value::Number(n) => match n.as_u64() {
            Some(u) => usize::try_from(u).ok(),
            None => n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as usize),
        },
        _ => None,
    }
}

/// Parse one job entry into its trials.
fn parse_entry(entry: &Value, fields: &FieldNames, entry_id: usize) -> Result<ParsedEntry, String> {
    let map = entry.as_mapping().ok_or("job entry is not a mapping")?;
    let get = |key: &str| map.get(key);

    let bin_index = get("bin_index").and_then(as_index).ok_or("missing or invalid bin_index")?;
    let values = get(&fields.value)
        .and_then(as_f64_list)
        .ok_or_else(|| format!("bin {bin_index}: missing or non-numeric '{}'", fields.value))?;
    let errors = match get(&fields.error) {
        Some(v) => {
            let errs = as_f64_list(v)
                .ok_or_else(|| format!("bin {bin_index}: non-numeric '{}'", fields.error))?;
            if errs.len() != values.len() {
                return Err(format!(
                    "bin {bin_index}: {} values but {} errors",
                    values.len(),
                    errs.len()
                ));
            }
            Some(errs)
        }
        None => None,
    };
    let events = get(&fields.events).and_then(as_f64);
    let injected = get(&fields.injected).and_then(as_f64);

    let mut bounds = BTreeMap::new();
    for v in Variable::ALL {
        let lo = get(&v.min_column()).and_then(as_f64);
        let hi = get(&v.max_column()).and_then(as_f64);
        if let (Some(min), Some(max)) = (lo, hi) {
            bounds.insert(v, BinBounds { min, max });
        }
    }

    let mut trials = Vec::with_capacity(values.len());
    for (i, &value) in values.iter().enumerate() {
        let error = errors.as_ref().map(|e| e[i]);
        if !value.is_finite() {
            log::warn!("bin {bin_index}: dropping non-finite extracted value");
            continue;
        }
        trials.push(TrialRecord {
            bin_index,
            entry_id,
            value,
            error: error.filter(|e| e.is_finite()),
            events,
            injected,
            bounds: bounds.clone(),
        });
    }
    Ok(ParsedEntry { bin_index, events, trials })
}

fn yaml_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "yaml"))
        .collect();
    files.sort();
    Ok(files)
}

/// Load every `*.yaml` result file in `dir`.
pub fn load_results(dir: &Path, fields: &FieldNames) -> LoadReport {
    let mut report = LoadReport::default();
    if !dir.is_dir() {
        log::error!("{} is not a valid directory", dir.display());
        return report;
    }
    let files = match yaml_files(dir) {
        Ok(f) => f,
        Err(e) => {
            log::error!("failed to list {}: {e}", dir.display());
            return report;
        }
    };

    let mut entry_id = 0usize;
    for path in files {
        let doc: Value = match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|s| serde_yaml_ng::from_str(&s).map_err(|e| e.to_string()))
        {
            Ok(doc) => doc,
            Err(e) => {
                log::error!("error reading {}: {e}", path.display());
                report.files_skipped += 1;
                continue;
            }
        };
        report.files_read += 1;

        let Some(jobs) = doc.get("jobs").and_then(Value::as_sequence) else {
            log::warn!("{}: no 'jobs' list", path.display());
            continue;
        };
        for job in jobs {
            match parse_entry(job, fields, entry_id) {
                Ok(parsed) => {
                    if parsed.trials.is_empty()
                        && let Some(e) = parsed.events
                    {
                        log::warn!(
                            "{}: bin {} entry has no finite trials; keeping its {e} events",
                            path.display(),
                            parsed.bin_index
                        );
                        *report.unplaced_events.entry(parsed.bin_index).or_default() += e;
                    }
                    report.records.extend(parsed.trials);
                }
                Err(msg) => {
                    log::warn!("{}: skipping job entry: {msg}", path.display());
                    report.entries_skipped += 1;
                }
            }
            entry_id += 1;
        }
    }

    report.records.sort_by_key(|r| r.bin_index);
    log::info!(
        "loaded {} trials from {} files ({} files, {} entries skipped)",
        report.records.len(),
        report.files_read,
        report.files_skipped,
        report.entries_skipped
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_dir(name: &str) -> PathBuf {
        let nanos =
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        let dir = std::env::temp_dir().join(format!("tmdstat_{}_{}_{}", name, std::process::id(), nanos));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_scalar_and_list_entries() {
        let dir = tmp_dir("results_load");
        std::fs::write(
            dir.join("bins_2_to_3.yaml"),
            "jobs:\n  - bin_index: 3\n    AUT_extracted: [0.1, 0.2]\n    AUT_extracted_err: [0.01, 0.02]\n    events: 100\n    AUT: 0.15\n  - bin_index: 2\n    AUT_extracted: 0.05\n    X_min: 0.01\n    X_max: 0.1\n",
        )
        .unwrap();
        std::fs::write(dir.join("bins_0_to_1.yaml"), "jobs:\n  - bin_index: 0\n    AUT_extracted: 0.3\n").unwrap();

        let report = load_results(&dir, &FieldNames::default());
        assert_eq!(report.files_read, 2);
        let bins: Vec<usize> = report.records.iter().map(|r| r.bin_index).collect();
        assert_eq!(bins, vec![0, 2, 3, 3]);

        let b2 = &report.records[1];
        assert_eq!(b2.bounds.get(&Variable::X), Some(&BinBounds { min: 0.01, max: 0.1 }));
        assert_eq!(b2.error, None);

        let b3 = &report.records[3];
        assert_eq!((b3.value, b3.error, b3.events, b3.injected), (0.2, Some(0.02), Some(100.0), Some(0.15)));
        assert_eq!(report.records[2].entry_id, b3.entry_id);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_bad_files_and_entries_are_skipped() {
        let dir = tmp_dir("results_bad");
        std::fs::write(dir.join("broken.yaml"), "jobs: [unclosed").unwrap();
        std::fs::write(dir.join("nojobs.yaml"), "other: 1\n").unwrap();
        std::fs::write(dir.join("notes.txt"), "jobs: []\n").unwrap();
        std::fs::write(
            dir.join("mixed.yaml"),
            "jobs:\n  - AUT_extracted: 0.1\n  - bin_index: 1\n    AUT_extracted: [0.1, 0.2]\n    AUT_extracted_err: [0.1]\n  - bin_index: 4\n    AUT_extracted: 0.4\n",
        )
        .unwrap();

        let report = load_results(&dir, &FieldNames::default());
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.files_read, 2);
        assert_eq!(report.entries_skipped, 2);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].bin_index, 4);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_events_kept_when_all_trials_non_finite() {
        let dir = tmp_dir("results_nan");
        std::fs::write(
            dir.join("a.yaml"),
            "jobs:\n  - bin_index: 2\n    AUT_extracted: [.nan, .nan]\n    events: 300\n  - bin_index: 2\n    AUT_extracted: [0.1, .nan]\n    events: 200\n",
        )
        .unwrap();
        let report = load_results(&dir, &FieldNames::default());
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.entries_skipped, 0);
        assert_eq!(report.unplaced_events.get(&2), Some(&300.0));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let report = load_results(Path::new("/nonexistent/tmdstat/results"), &FieldNames::default());
        assert!(report.records.is_empty());
        assert_eq!(report.files_read, 0);
    }

    #[test]
    fn test_custom_field_names() {
        let dir = tmp_dir("results_fields");
        std::fs::write(dir.join("a.yaml"), "jobs:\n  - bin_index: 0\n    A_rec: 0.5\n    A_rec_err: 0.1\n").unwrap();
        let fields = FieldNames { value: "A_rec".into(), error: "A_rec_err".into(), ..Default::default() };
        let report = load_results(&dir, &fields);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].error, Some(0.1));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
