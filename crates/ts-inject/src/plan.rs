//! Injection job planning.
//!
//! An [`InjectionConfig`] names an event file, a binning table and the grid the
//! injections run over. [`InjectionPlan::build`] counts the table's unique
//! bins on that grid and splits them into contiguous groups, one external
//! `inject` job per group. The plan can be written out as SLURM batch
//! scripts or run locally, one job after the other.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use ts_binning::{BinTable, validate_grid};
use ts_core::{Error, Result, Variable};

/// Name of the run log kept in the output directory.
pub const LOG_FILE: &str = "injection_log.txt";

/// Batch-system resources requested per job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlurmOptions {
    /// Allocation account.
    pub account: String,
    /// Partition.
    pub partition: String,
    /// CPUs per task.
    pub cpus_per_task: u32,
    /// Memory per CPU (`4G`).
    pub mem_per_cpu: String,
    /// Wall-clock limit (`HH:MM:SS`).
    pub time: String,
}

impl Default for SlurmOptions {
    fn default() -> Self {
        Self {
            account: "eic".into(),
            partition: "production".into(),
            cpus_per_task: 2,
            mem_per_cpu: "4G".into(),
            time: "24:00:00".into(),
        }
    }
}

/// Grid given either as `"X,Q"` or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridSpec {
    /// Comma-separated names.
    Joined(String),
    /// One name per element.
    List(Vec<String>),
}

impl GridSpec {
    /// Trimmed, non-empty names.
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            GridSpec::Joined(s) => s.split(',').collect(),
            GridSpec::List(v) => v.iter().map(String::as_str).collect(),
        };
        raw.into_iter().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
    }

    /// Names joined with commas, as passed to `inject --grid`.
    pub fn joined(&self) -> String {
        self.names().join(",")
    }

    /// Parse and validate the grid variables.
    pub fn variables(&self) -> Result<Vec<Variable>> {
        let grid = self
            .names()
            .iter()
            .map(|n| Variable::from_prefix(n))
            .collect::<Result<Vec<_>>>()?;
        validate_grid(&grid)?;
        Ok(grid)
    }
}

fn default_bins_per_job() -> usize {
    1
}

fn default_inject_binary() -> String {
    "./submodules/tmd-eic-ana/bin/inject".into()
}

fn default_n_injections() -> u64 {
    1000
}

/// One injection campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InjectionConfig {
    /// Root of all injection outputs.
    pub main_outdir: PathBuf,
    /// Event file.
    pub file: String,
    /// Tree inside `file`.
    pub tree: String,
    /// Beam energy label (`10x100`).
    pub energy: String,
    /// Binning table CSV.
    pub table: PathBuf,
    /// Events read per job.
    pub max_entries: u64,
    /// Physics channel (`Dihadron`, `SIDIS`).
    pub channel: String,
    /// EIC running period (`EarlyScience`).
    pub eic_timeline: String,
    /// Target species.
    pub target: String,
    /// Variables the injections are gridded over.
    pub grid: GridSpec,
    /// Trials per bin.
    #[serde(default = "default_n_injections")]
    pub n_injections: u64,
    /// Extract on generator-level kinematics.
    #[serde(default)]
    pub extract_with_true: bool,
    /// Target polarization.
    pub target_polarization: f64,
    /// Bins handled by one job.
    #[serde(default = "default_bins_per_job")]
    pub bins_per_job: usize,
    /// Path of the `inject` executable.
    #[serde(default = "default_inject_binary")]
    pub inject_binary: String,
    /// Batch resources.
    #[serde(default)]
    pub slurm: SlurmOptions,
}

impl InjectionConfig {
    /// Parse a YAML config.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(s)?)
    }

    /// `<main_outdir>/<channel>/<energy>/<eic_timeline>/<target>/<grid>`.
    pub fn out_dir(&self) -> PathBuf {
        self.main_outdir
            .join(&self.channel)
            .join(&self.energy)
            .join(&self.eic_timeline)
            .join(&self.target)
            .join(self.grid.joined())
    }

    fn log_lines(&self) -> Vec<String> {
        vec![
            format!("main_outdir: {}", self.main_outdir.display()),
            format!("file: {}", self.file),
            format!("tree: {}", self.tree),
            format!("energy: {}", self.energy),
            format!("table: {}", self.table.display()),
            format!("max_entries: {}", self.max_entries),
            format!("channel: {}", self.channel),
            format!("eic_timeline: {}", self.eic_timeline),
            format!("target: {}", self.target),
            format!("grid: {}", self.grid.joined()),
            format!("n_injections: {}", self.n_injections),
            format!("extract_with_true: {}", self.extract_with_true),
            format!("target_polarization: {}", self.target_polarization),
            format!("bins_per_job: {}", self.bins_per_job),
        ]
    }
}

/// One `inject` invocation over a contiguous bin range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionJob {
    /// `inj_<first>_to_<last>_<energy>`.
    pub name: String,
    /// First bin index (inclusive).
    pub first_bin: usize,
    /// Last bin index (inclusive).
    pub last_bin: usize,
    /// `bins_<first>_to_<last>.yaml`.
    pub output_file: String,
    /// Arguments passed to the executable.
    pub args: Vec<String>,
}

/// All jobs of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InjectionPlan {
    /// Where results and logs go.
    pub out_dir: PathBuf,
    /// Parsed grid.
    pub grid: Vec<Variable>,
    /// Unique bins on the grid.
    pub n_bins: usize,
    /// Executable run by every job.
    pub binary: String,
    /// Jobs in bin order.
    pub jobs: Vec<InjectionJob>,
    #[serde(skip)]
    config: InjectionConfig,
}

impl InjectionPlan {
    /// Plan jobs for `config` over the unique bins of `table`.
    pub fn build(config: &InjectionConfig, table: &BinTable) -> Result<Self> {
        if config.bins_per_job == 0 {
            return Err(Error::Validation("bins_per_job must be >= 1".into()));
        }
        let grid = config.grid.variables()?;
        let n_bins = table.unique_bins(&grid)?.len();
        let grid_label = config.grid.joined();
        log::info!("detected {n_bins} unique bins for grid {grid_label}");
        if n_bins == 0 {
            log::warn!("table has no rows; no jobs planned");
        }

        let out_dir = config.out_dir();
        let jobs = (0..n_bins)
            .step_by(config.bins_per_job)
            .map(|first| {
                let last = (first + config.bins_per_job).min(n_bins) - 1;
                let output_file = format!("bins_{first}_to_{last}.yaml");
                let args = vec![
                    "--file".to_string(),
                    config.file.clone(),
                    "--tree".into(),
                    config.tree.clone(),
                    "--energy".into(),
                    config.energy.clone(),
                    "--table".into(),
                    config.table.display().to_string(),
                    "--outDir".into(),
                    out_dir.display().to_string(),
                    "--maxEntries".into(),
                    config.max_entries.to_string(),
                    "--channel".into(),
                    config.channel.clone(),
                    "--eic_timeline".into(),
                    config.eic_timeline.clone(),
                    "--target".into(),
                    config.target.clone(),
                    "--grid".into(),
                    grid_label.clone(),
                    "--n_injections".into(),
                    config.n_injections.to_string(),
                    "--extract_with_true".into(),
                    config.extract_with_true.to_string(),
                    "--targetPolarization".into(),
                    config.target_polarization.to_string(),
                    "--bin_index_start".into(),
                    first.to_string(),
                    "--bin_index_end".into(),
                    last.to_string(),
                    "--outFilename".into(),
                    output_file.clone(),
                ];
                InjectionJob {
                    name: format!("inj_{first}_to_{last}_{}", config.energy),
                    first_bin: first,
                    last_bin: last,
                    output_file,
                    args,
                }
            })
            .collect();

        Ok(Self {
            out_dir,
            grid,
            n_bins,
            binary: config.inject_binary.clone(),
            jobs,
            config: config.clone(),
        })
    }

    /// `<out_dir>/slurm/<timestamp>`.
    pub fn job_dir(&self, timestamp: &str) -> PathBuf {
        self.out_dir.join("slurm").join(timestamp)
    }

    /// Batch script for `job`, with scheduler logs under `job_dir`.
    pub fn slurm_script(&self, job: &InjectionJob, job_dir: &Path) -> String {
        let s = &self.config.slurm;
        let mut out = String::new();
        let _ = writeln!(out, "#!/bin/bash");
        let _ = writeln!(out, "#SBATCH --job-name={}", job.name);
        let _ = writeln!(out, "#SBATCH --output={}/%x_%j.out", job_dir.display());
        let _ = writeln!(out, "#SBATCH --error={}/%x_%j.err", job_dir.display());
        let _ = writeln!(out, "#SBATCH --account={}", s.account);
        let _ = writeln!(out, "#SBATCH --partition={}", s.partition);
        let _ = writeln!(out, "#SBATCH --cpus-per-task={}", s.cpus_per_task);
        let _ = writeln!(out, "#SBATCH --mem-per-cpu={}", s.mem_per_cpu);
        let _ = writeln!(out, "#SBATCH --time={}", s.time);
        let _ = writeln!(out);
        let _ = write!(out, "srun {}", self.binary);
        for pair in job.args.chunks(2) {
            let _ = write!(out, " \\\n  {}", pair.join(" "));
        }
        out.push('\n');
        out
    }

    /// Write one `slurm_<job>.sh` per job into `job_dir` (created if missing).
    pub fn write_scripts(&self, job_dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(job_dir)?;
        let mut paths = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let path = job_dir.join(format!("slurm_{}.sh", job.name));
            fs::write(&path, self.slurm_script(job, job_dir))?;
            log::info!("created SLURM script {}", path.display());
            paths.push(path);
        }
        Ok(paths)
    }

    /// Append a run header to [`LOG_FILE`] in the output directory.
    pub fn append_log(&self, timestamp: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.out_dir)?;
        let path = self.out_dir.join(LOG_FILE);
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "===== Injection Run at {timestamp} =====")?;
        for line in self.config.log_lines() {
            writeln!(f, "{line}")?;
        }
        writeln!(f, "bins: {}", self.n_bins)?;
        writeln!(f, "=====================================")?;
        Ok(path)
    }

    /// Remove stale `*.yaml` results from the output directory. Returns the count removed.
    pub fn clean_outputs(&self) -> Result<usize> {
        if !self.out_dir.is_dir() {
            return Ok(0);
        }
        let mut removed = 0;
        for entry in fs::read_dir(&self.out_dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|e| e == "yaml") {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        if removed > 0 {
            log::info!("removed {removed} old result files from {}", self.out_dir.display());
        }
        Ok(removed)
    }

    /// Shell-style rendering of a job's command line.
    pub fn command_line(&self, job: &InjectionJob) -> String {
        std::iter::once(self.binary.as_str())
            .chain(job.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run every job in sequence. Returns the number of jobs that failed.
    pub fn run_local(&self) -> Result<usize> {
        fs::create_dir_all(&self.out_dir)?;
        let mut failed = 0;
        for job in &self.jobs {
            log::info!("running: {}", self.command_line(job));
            let status = Command::new(&self.binary).args(&job.args).status()?;
            if !status.success() {
                log::error!("job {} exited with {status}", job.name);
                failed += 1;
            }
        }
        Ok(failed)
    }
}

/// Submit scripts with `sbatch`. Returns the number accepted.
pub fn submit_scripts(scripts: &[PathBuf]) -> Result<usize> {
    let mut submitted = 0;
    for script in scripts {
        let status = Command::new("sbatch").arg(script).status()?;
        if status.success() {
            submitted += 1;
        } else {
            log::error!("sbatch {} exited with {status}", script.display());
        }
    }
    Ok(submitted)
}

/// Local time formatted as `YYYYmmdd_HHMMSS`.
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ts_binning::{BinRow, TableDefaults};

    const CONFIG: &str = "\
main_outdir: out/inj
file: events.root
tree: dihadron_tree
energy: 10x100
table: tables/x.csv
max_entries: 100000
channel: Dihadron
eic_timeline: EarlyScience
target: Proton
grid: X
n_injections: 50
target_polarization: 0.7
bins_per_job: 2
";

    fn table(n: usize) -> BinTable {
        let d = TableDefaults::default();
        let mut t = BinTable::default();
        for i in 0..n {
            let lo = i as f64 * 0.1;
            // Two Z slices per x bin; unique bins on the X grid are counted once.
            t.push(BinRow::new(&d).with_bounds(Variable::X, lo, lo + 0.1).with_bounds(Variable::Z, 0.0, 0.5));
            t.push(BinRow::new(&d).with_bounds(Variable::X, lo, lo + 0.1).with_bounds(Variable::Z, 0.5, 1.0));
        }
        t
    }

    fn tmp_dir(name: &str) -> PathBuf {
        let nanos =
            std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap().as_nanos();
        std::env::temp_dir().join(format!("tmdstat_{}_{}_{}", name, std::process::id(), nanos))
    }

    #[test]
    fn test_config_defaults_and_grid_forms() {
        let cfg = InjectionConfig::from_yaml_str(CONFIG).unwrap();
        assert_eq!(cfg.slurm, SlurmOptions::default());
        assert!(!cfg.extract_with_true);
        assert_eq!(cfg.inject_binary, "./submodules/tmd-eic-ana/bin/inject");
        assert_eq!(cfg.out_dir(), PathBuf::from("out/inj/Dihadron/10x100/EarlyScience/Proton/X"));

        let list = GridSpec::List(vec!["X".into(), " Q".into()]);
        assert_eq!(list.joined(), "X,Q");
        assert_eq!(GridSpec::Joined("Z, PhPerp".into()).variables().unwrap(), vec![Variable::Z, Variable::PhPerp]);
        assert!(GridSpec::Joined("X,Mh".into()).variables().is_err());
        assert!(GridSpec::Joined("".into()).variables().is_err());
    }

    #[test]
    fn test_jobs_split_unique_bins() {
        let cfg = InjectionConfig::from_yaml_str(CONFIG).unwrap();
        let plan = InjectionPlan::build(&cfg, &table(5)).unwrap();
        assert_eq!(plan.n_bins, 5);
        let ranges: Vec<(usize, usize)> = plan.jobs.iter().map(|j| (j.first_bin, j.last_bin)).collect();
        assert_eq!(ranges, vec![(0, 1), (2, 3), (4, 4)]);

        let last = &plan.jobs[2];
        assert_eq!(last.name, "inj_4_to_4_10x100");
        assert_eq!(last.output_file, "bins_4_to_4.yaml");
        let cmd = plan.command_line(last);
        assert!(cmd.starts_with("./submodules/tmd-eic-ana/bin/inject --file events.root"));
        assert!(cmd.contains("--targetPolarization 0.7"));
        assert!(cmd.ends_with("--bin_index_start 4 --bin_index_end 4 --outFilename bins_4_to_4.yaml"));
    }

    #[test]
    fn test_invalid_plans() {
        let mut cfg = InjectionConfig::from_yaml_str(CONFIG).unwrap();
        cfg.bins_per_job = 0;
        assert!(InjectionPlan::build(&cfg, &table(2)).is_err());
        cfg.bins_per_job = 1;
        cfg.grid = GridSpec::Joined("Mh".into());
        assert!(InjectionPlan::build(&cfg, &table(2)).is_err());
        assert!(InjectionConfig::from_yaml_str("main_outdir: x\nbogus: 1\n").is_err());
    }

    #[test]
    fn test_scripts_log_and_clean() {
        let mut cfg = InjectionConfig::from_yaml_str(CONFIG).unwrap();
        let root = tmp_dir("plan");
        cfg.main_outdir = root.clone();
        let plan = InjectionPlan::build(&cfg, &table(3)).unwrap();

        let job_dir = plan.job_dir("20250101_120000");
        let scripts = plan.write_scripts(&job_dir).unwrap();
        assert_eq!(scripts.len(), 2);
        let text = fs::read_to_string(&scripts[0]).unwrap();
        assert!(text.starts_with("#!/bin/bash\n#SBATCH --job-name=inj_0_to_1_10x100\n"));
        assert!(text.contains("#SBATCH --account=eic\n"));
        assert!(text.contains("#SBATCH --mem-per-cpu=4G\n"));
        assert!(text.contains("srun ./submodules/tmd-eic-ana/bin/inject \\\n  --file events.root \\\n"));
        assert!(text.ends_with("  --outFilename bins_0_to_1.yaml\n"));

        plan.append_log("20250101_120000").unwrap();
        plan.append_log("20250102_120000").unwrap();
        let log = fs::read_to_string(plan.out_dir.join(LOG_FILE)).unwrap();
        assert_eq!(log.matches("===== Injection Run at").count(), 2);
        assert!(log.contains("grid: X\n"));
        assert!(log.contains("bins: 3\n"));

        fs::write(plan.out_dir.join("bins_0_to_1.yaml"), "jobs: []\n").unwrap();
        assert_eq!(plan.clean_outputs().unwrap(), 1);
        assert!(plan.out_dir.join(LOG_FILE).exists());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_run_timestamp_format() {
        let ts = run_timestamp();
        assert_eq!(ts.len(), 15);
        assert_eq!(&ts[8..9], "_");
    }
}
