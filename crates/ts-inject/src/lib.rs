//! # ts-inject
//!
//! Asymmetry-injection studies for tmdstat.
//!
//! Planning side: [`InjectionPlan`] turns a run configuration and a binning
//! table into `inject` jobs (SLURM scripts or local runs).
//!
//! Post-processing side: [`load_results`] reads the per-job YAML files,
//! [`aggregate`] summarizes the trials of every bin, [`match_table`] attaches
//! table bounds, and the summaries are written as CSV or as an
//! [`AsymmetryArtifact`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod artifact;
pub mod plan;
pub mod results;

pub use aggregate::{
    BinSummary, MatchReport, aggregate, aggregate_report, match_table, write_summary_csv,
};
pub use artifact::{ASYMMETRY_SCHEMA_V1, AsymmetryArtifact, AsymmetryPoint, LinearityFit};
pub use plan::{
    GridSpec, InjectionConfig, InjectionJob, InjectionPlan, LOG_FILE, SlurmOptions, run_timestamp,
    submit_scripts,
};
pub use results::{FieldNames, LoadReport, TrialRecord, load_results};
