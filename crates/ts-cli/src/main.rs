//! tmdstat CLI

mod config;
mod convert;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use ts_binning::{BinTable, BinWeightSummary, generate_grid_table};
use ts_core::{ArtifactMeta, Variable};
use ts_events::{EventSample, ReadRequest, open_source};
use ts_hist::{build_kinematics, required_branches};
use ts_inject::{
    AsymmetryArtifact, FieldNames, GridSpec, InjectionConfig, InjectionPlan, aggregate_report,
    load_results, match_table, run_timestamp, submit_scripts, write_summary_csv,
};

use crate::config::{BinningConfig, GridConfig, KinematicsConfig, load_yaml};

#[derive(Parser)]
#[command(name = "tmdstat")]
#[command(about = "tmdstat - binning, kinematics and injection studies for SIDIS simulations")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a hierarchical weighted-quantile binning table
    BinTable {
        /// Event file (.root, .parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// TTree name (ROOT input only)
        #[arg(long)]
        tree: Option<String>,

        /// Binning config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dimensions as `name:bins`, comma separated (e.g. `X:10,Q2:10,Z:10,Mh:10`)
        #[arg(long)]
        dims: Option<String>,

        /// Read at most this many events
        #[arg(long)]
        max_entries: Option<usize>,

        /// Ignore the weight branch (unit weights)
        #[arg(long)]
        no_weight: bool,

        /// Output table (CSV)
        #[arg(short, long)]
        output: PathBuf,

        /// Also write the per-bin weight summary (JSON)
        #[arg(long)]
        summary: Option<PathBuf>,
    },

    /// Build a fixed-edge grid table
    GridTable {
        /// Grid config (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Output table (CSV)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Fill kinematics histograms into a plot-friendly JSON artifact
    Kinematics {
        /// Event file (.root, .parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// TTree name (ROOT input only)
        #[arg(long)]
        tree: Option<String>,

        /// Kinematics config (YAML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Read at most this many events
        #[arg(long)]
        max_entries: Option<usize>,

        /// Ignore the weight branch (unit weights)
        #[arg(long)]
        no_weight: bool,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Convert selected branches of an event file to Parquet
    Convert {
        /// Event file (.root, .parquet)
        #[arg(short, long)]
        input: PathBuf,

        /// TTree name (ROOT input only)
        #[arg(long)]
        tree: Option<String>,

        /// Branches to keep, comma separated
        #[arg(long)]
        branches: String,

        /// Weight branch
        #[arg(long)]
        weight: Option<String>,

        /// Keep only the first N events
        #[arg(long)]
        max_entries: Option<usize>,

        /// Output Parquet file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Plan injection jobs over the bins of a table
    PlanInjections {
        /// Injection config (YAML)
        #[arg(short, long)]
        config: PathBuf,

        /// Print the plan as JSON and touch nothing on disk
        #[arg(long, conflicts_with_all = ["submit", "run_local"])]
        dry_run: bool,

        /// Submit the generated scripts with sbatch
        #[arg(long, conflicts_with = "run_local")]
        submit: bool,

        /// Run the jobs here, one after the other
        #[arg(long)]
        run_local: bool,
    },

    /// Aggregate injection results into per-bin summaries
    Postprocess {
        /// Directory of per-job result files (*.yaml)
        #[arg(short, long)]
        results_dir: PathBuf,

        /// Binning table the jobs ran on (CSV); fills in bin bounds
        #[arg(long)]
        table: Option<PathBuf>,

        /// Injection grid the jobs were planned over (e.g. `X` or `X,Z`)
        #[arg(long, default_value = "X")]
        grid: String,

        /// Key of the extracted asymmetry
        #[arg(long, default_value = "AUT_extracted")]
        value_field: String,

        /// Key of its statistical error
        #[arg(long, default_value = "AUT_extracted_err")]
        error_field: String,

        /// Key of the injected asymmetry
        #[arg(long, default_value = "AUT")]
        injected_field: String,

        /// Key of the event count
        #[arg(long, default_value = "events")]
        events_field: String,

        /// Write per-bin summaries as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the asymmetry artifact (JSON)
        #[arg(long)]
        artifact: Option<PathBuf>,

        /// Variable the artifact is plotted against
        #[arg(long, default_value = "X")]
        variable: String,

        /// Output file for the summaries (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version information
    Version,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::BinTable { input, tree, config, dims, max_entries, no_weight, output, summary } => {
            cmd_bin_table(
                &input,
                tree.as_deref(),
                config.as_deref(),
                dims.as_deref(),
                max_entries,
                no_weight,
                &output,
                summary.as_ref(),
            )
        }
        Commands::GridTable { config, output } => cmd_grid_table(&config, &output),
        Commands::Kinematics { input, tree, config, max_entries, no_weight, output } => {
            cmd_kinematics(
                &input,
                tree.as_deref(),
                config.as_deref(),
                max_entries,
                no_weight,
                output.as_ref(),
            )
        }
        Commands::Convert { input, tree, branches, weight, max_entries, output } => {
            convert::cmd_convert(
                &input,
                tree.as_deref(),
                &output,
                &convert::parse_branches(&branches),
                weight.as_deref(),
                max_entries,
            )
        }
        Commands::PlanInjections { config, dry_run, submit, run_local } => {
            cmd_plan_injections(&config, dry_run, submit, run_local)
        }
        Commands::Postprocess {
            results_dir,
            table,
            grid,
            value_field,
            error_field,
            injected_field,
            events_field,
            csv,
            artifact,
            variable,
            output,
        } => {
            let fields = FieldNames {
                value: value_field,
                error: error_field,
                injected: injected_field,
                events: events_field,
            };
            cmd_postprocess(
                &results_dir,
                table.as_deref(),
                &grid,
                &fields,
                csv.as_deref(),
                artifact.as_ref(),
                &variable,
                output.as_ref(),
            )
        }
        Commands::Version => {
            println!("tmdstat {}", ts_core::VERSION);
            Ok(())
        }
    }
}

fn read_events(
    input: &Path,
    tree: Option<&str>,
    branches: Vec<String>,
    weight: Option<&str>,
    max_entries: Option<usize>,
) -> Result<(EventSample, String)> {
    let source = open_source(input, tree)?;
    let description = source.describe();
    tracing::info!(source = %description, branches = branches.len(), "reading events");

    let mut request = ReadRequest::new(branches).with_max_entries(max_entries);
    if let Some(w) = weight {
        request = request.with_weight(w);
    }
    let sample = source
        .read(&request)
        .with_context(|| format!("failed to read events from {}", input.display()))?;
    tracing::info!(events = sample.n_events(), weighted = sample.is_weighted(), "events loaded");
    for (column, count) in sample.non_finite_counts() {
        tracing::warn!(column = %column, count, "column has non-finite values");
    }
    Ok((sample, description))
}

#[allow(clippy::too_many_arguments)]
fn cmd_bin_table(
    input: &Path,
    tree: Option<&str>,
    config: Option<&Path>,
    dims: Option<&str>,
    max_entries: Option<usize>,
    no_weight: bool,
    output: &Path,
    summary: Option<&PathBuf>,
) -> Result<()> {
    let mut cfg: BinningConfig = match config {
        Some(path) => load_yaml(path)?,
        None => BinningConfig::default(),
    };
    if let Some(d) = dims {
        cfg.set_dims_from_arg(d)?;
    }
    if max_entries.is_some() {
        cfg.max_entries = max_entries;
    }
    if no_weight {
        cfg.weight = None;
    }

    let binning = cfg.binning()?;
    let (sample, _) =
        read_events(input, tree, binning.branches(), cfg.weight.as_deref(), cfg.max_entries)?;
    let result = binning.build(&sample, &cfg.defaults)?;

    result
        .table
        .write_csv(output)
        .with_context(|| format!("failed to write table {}", output.display()))?;
    tracing::info!(bins = result.table.len(), path = %output.display(), "binning table written");

    let weight_summary = BinWeightSummary::from_weights(&result.weights);
    if let Some(s) = &weight_summary {
        s.log();
    }
    if let Some(path) = summary {
        let value = serde_json::json!({
            "schema_version": "tmdstat_bin_weights_v1",
            "meta": ArtifactMeta::now()?,
            "n_events": result.n_events,
            "n_used": result.n_used,
            "n_bins": result.table.len(),
            "weights": result.weights,
            "summary": weight_summary,
        });
        write_json(Some(path), value)?;
    }
    Ok(())
}

fn cmd_grid_table(config: &Path, output: &Path) -> Result<()> {
    let cfg: GridConfig = load_yaml(config)?;
    let table = generate_grid_table(&cfg.dimensions()?, &cfg.defaults)?;
    table
        .write_csv(output)
        .with_context(|| format!("failed to write table {}", output.display()))?;
    tracing::info!(bins = table.len(), path = %output.display(), "grid table written");
    Ok(())
}

fn cmd_kinematics(
    input: &Path,
    tree: Option<&str>,
    config: Option<&Path>,
    max_entries: Option<usize>,
    no_weight: bool,
    output: Option<&PathBuf>,
) -> Result<()> {
    let mut cfg: KinematicsConfig = match config {
        Some(path) => load_yaml(path)?,
        None => KinematicsConfig::default(),
    };
    if max_entries.is_some() {
        cfg.max_entries = max_entries;
    }
    if no_weight {
        cfg.weight = None;
    }

    let catalog = cfg.catalog()?;
    let branches = required_branches(&catalog, &cfg.panels)?;
    let (sample, description) =
        read_events(input, tree, branches, cfg.weight.as_deref(), cfg.max_entries)?;

    let artifact = build_kinematics(&sample, &catalog, &cfg.panels, &cfg.layout(), &description)?;
    tracing::info!(panels = artifact.panels.len(), rows = artifact.nrows, "kinematics filled");
    write_json(output, serde_json::to_value(&artifact)?)
}

fn cmd_plan_injections(config: &Path, dry_run: bool, submit: bool, run_local: bool) -> Result<()> {
    let cfg: InjectionConfig = load_yaml(config)?;
    let table = BinTable::read_csv(&cfg.table)
        .with_context(|| format!("failed to read table {}", cfg.table.display()))?;
    let plan = InjectionPlan::build(&cfg, &table)?;
    if dry_run {
        return write_json(None, serde_json::to_value(&plan)?);
    }
    println!("Detected {} unique bins for grid {}.", plan.n_bins, cfg.grid.joined());

    plan.clean_outputs()?;
    let timestamp = run_timestamp();
    let job_dir = plan.job_dir(&timestamp);
    plan.append_log(&timestamp)?;
    let scripts = plan.write_scripts(&job_dir)?;
    println!("SLURM job scripts located in: {}", job_dir.display());

    if submit {
        let n = submit_scripts(&scripts)?;
        println!("Submitted {n} of {} jobs.", scripts.len());
    } else if run_local {
        let failed = plan.run_local()?;
        if failed > 0 {
            anyhow::bail!("{failed} of {} local injection jobs failed", plan.jobs.len());
        }
        println!("All local injections completed.");
    }
    Ok(())
}

fn cmd_postprocess(
    results_dir: &Path,
    table: Option<&Path>,
    grid: &str,
    fields: &FieldNames,
    csv: Option<&Path>,
    artifact: Option<&PathBuf>,
    variable: &str,
    output: Option<&PathBuf>,
) -> Result<()> {
    let variable = Variable::from_name(variable)?.variable;
    let report = load_results(results_dir, fields);
    let mut summaries = aggregate_report(&report);
    tracing::info!(bins = summaries.len(), trials = report.records.len(), "results aggregated");

    if let Some(path) = table {
        let table = BinTable::read_csv(path)
            .with_context(|| format!("failed to read table {}", path.display()))?;
        let grid = GridSpec::Joined(grid.to_string()).variables()?;
        let m = match_table(&mut summaries, &table, &grid)?;
        if !m.out_of_range.is_empty() || !m.mismatched.is_empty() {
            tracing::warn!(
                out_of_range = m.out_of_range.len(),
                mismatched = m.mismatched.len(),
                "results do not fully match the binning table"
            );
        }
    }

    if let Some(path) = csv {
        write_summary_csv(&summaries, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    if let Some(path) = artifact {
        let a = AsymmetryArtifact::from_summaries(&summaries, variable)?;
        write_json(Some(path), serde_json::to_value(&a)?)?;
    }

    let value = serde_json::json!({
        "files_read": report.files_read,
        "files_skipped": report.files_skipped,
        "entries_skipped": report.entries_skipped,
        "bins": summaries,
    });
    write_json(output, value)
}

fn write_json(output: Option<&PathBuf>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
