use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use ts_binning::{GridDimension, TableDefaults, generate_grid_table};

fn bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tmdstat"))
}

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("tmdstat_cli_{}_{}_{}", std::process::id(), nanos, name));
    std::fs::create_dir_all(&p).unwrap();
    p
}

fn run(args: &[&str]) -> Output {
    Command::new(bin_path())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run {:?} {:?}: {}", bin_path(), args, e))
}

/// Three X bins crossed with two Z bins: six rows, three unique bins on the X grid.
fn write_table(dir: &Path) -> PathBuf {
    let table = generate_grid_table(
        &[
            GridDimension::new("X", vec![0.0, 0.1, 0.3, 1.0]),
            GridDimension::new("Z", vec![0.0, 0.5, 1.0]),
        ],
        &TableDefaults::default(),
    )
    .unwrap();
    let path = dir.join("table.csv");
    table.write_csv(&path).unwrap();
    path
}

fn write_config(dir: &Path, table: &Path) -> PathBuf {
    let cfg = dir.join("inject.yaml");
    std::fs::write(
        &cfg,
        format!(
            "main_outdir: {}\nfile: events.root\ntree: dihadron_tree\nenergy: 10x100\ntable: {}\n\
             max_entries: 1000\nchannel: Dihadron\neic_timeline: EarlyScience\ntarget: Proton\n\
             grid: X\nn_injections: 20\ntarget_polarization: 0.7\nbins_per_job: 2\n",
            dir.join("injectout").display(),
            table.display()
        ),
    )
    .unwrap();
    cfg
}

#[test]
fn plan_injections_dry_run_prints_jobs() {
    let dir = tmp_dir("plan_dry");
    let table = write_table(&dir);
    let cfg = write_config(&dir, &table);

    let out = run(&["plan-injections", "--config", cfg.to_str().unwrap(), "--dry-run"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let plan: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(plan["n_bins"], 3);
    assert_eq!(plan["jobs"].as_array().unwrap().len(), 2);
    assert_eq!(plan["jobs"][1]["name"], "inj_2_to_2_10x100");
    assert!(!dir.join("injectout").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn plan_injections_writes_scripts_and_log() {
    let dir = tmp_dir("plan_write");
    let table = write_table(&dir);
    let cfg = write_config(&dir, &table);
    let out_dir = dir.join("injectout/Dihadron/10x100/EarlyScience/Proton/X");
    std::fs::create_dir_all(&out_dir).unwrap();
    std::fs::write(out_dir.join("bins_0_to_1.yaml"), "jobs: []\n").unwrap();

    let out = run(&["plan-injections", "--config", cfg.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("Detected 3 unique bins for grid X."));

    assert!(!out_dir.join("bins_0_to_1.yaml").exists(), "stale results should be removed");
    let log = std::fs::read_to_string(out_dir.join("injection_log.txt")).unwrap();
    assert!(log.starts_with("===== Injection Run at "));
    assert!(log.contains("bins: 3\n"));

    let runs: Vec<PathBuf> =
        std::fs::read_dir(out_dir.join("slurm")).unwrap().map(|e| e.unwrap().path()).collect();
    assert_eq!(runs.len(), 1);
    let mut scripts: Vec<String> = std::fs::read_dir(&runs[0])
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    scripts.sort();
    assert_eq!(scripts, vec!["slurm_inj_0_to_1_10x100.sh", "slurm_inj_2_to_2_10x100.sh"]);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn postprocess_aggregates_and_matches_table() {
    let dir = tmp_dir("postprocess");
    let table = write_table(&dir);
    let results = dir.join("results");
    std::fs::create_dir_all(&results).unwrap();
    std::fs::write(
        results.join("bins_0_to_1.yaml"),
        "jobs:\n  - bin_index: 0\n    AUT_extracted: [0.09, 0.11]\n    AUT_extracted_err: [0.01, 0.01]\n    AUT: 0.1\n    events: 500\n  - bin_index: 1\n    AUT_extracted: 0.2\n    AUT: 0.1\n",
    )
    .unwrap();
    std::fs::write(results.join("broken.yaml"), "jobs: [").unwrap();

    let csv = dir.join("summary.csv");
    let artifact = dir.join("asym.json");
    let output = dir.join("bins.json");
    let out = run(&[
        "postprocess",
        "--results-dir",
        results.to_str().unwrap(),
        "--table",
        table.to_str().unwrap(),
        "--grid",
        "X",
        "--csv",
        csv.to_str().unwrap(),
        "--artifact",
        artifact.to_str().unwrap(),
        "--output",
        output.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(v["files_read"], 1);
    assert_eq!(v["files_skipped"], 1);
    let bins = v["bins"].as_array().unwrap();
    assert_eq!(bins.len(), 2);
    assert_eq!(bins[0]["n"], 2);
    assert!((bins[0]["mean"].as_f64().unwrap() - 0.1).abs() < 1e-12);
    assert_eq!(bins[0]["events"], 500.0);
    // Job bin 1 is the second unique X bin, the same numbering the plan uses.
    assert_eq!(bins[1]["bounds"]["X"]["min"], 0.1);
    assert_eq!(bins[1]["bounds"]["X"]["max"], 0.3);
    assert!(bins[1]["bounds"].get("Z").is_none());

    let text = std::fs::read_to_string(&csv).unwrap();
    assert!(text.lines().next().unwrap().ends_with("pull_std,X_min,X_max"));
    assert_eq!(text.lines().count(), 3);

    let a: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&artifact).unwrap()).unwrap();
    assert_eq!(a["schema_version"], "tmdstat_asymmetry_v1");
    assert_eq!(a["points"].as_array().unwrap().len(), 2);
    assert!((a["points"][1]["center"].as_f64().unwrap() - 0.2).abs() < 1e-12);
    assert!(a["linearity"].is_null());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn postprocess_missing_directory_is_empty() {
    let out = run(&["postprocess", "--results-dir", "/nonexistent/tmdstat/results"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert!(v["bins"].as_array().unwrap().is_empty());
}
