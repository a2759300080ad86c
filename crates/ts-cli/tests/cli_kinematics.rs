use std::path::PathBuf;
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

use ts_events::{EventSample, write_parquet};

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

fn write_events(dir: &std::path::Path) -> PathBuf {
    let sample = EventSample::from_columns(
        vec![
            ("X".to_string(), vec![0.002, 0.02, 0.2, 0.5]),
            ("Q2".to_string(), vec![4.0, 25.0, 90.0, 300.0]),
            ("Z".to_string(), vec![0.2, 0.4, 0.6, 0.8]),
            ("PhPerp".to_string(), vec![0.3, 0.7, 1.2, 2.2]),
        ],
        Some(vec![1.0, 1.0, 2.0, 0.5]),
    )
    .unwrap();
    let path = dir.join("events.parquet");
    write_parquet(&sample, &path).unwrap();
    path
}

#[test]
fn kinematics_default_panels() {
    let dir = tmp_dir("kin_default");
    let events = write_events(&dir);

    let out = run(&["kinematics", "--input", events.to_str().unwrap()]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();

    assert_eq!(v["schema_version"], "tmdstat_kinematics_v1");
    assert_eq!(v["ncols"], 3);
    assert_eq!(v["nrows"], 2);
    let panels = v["panels"].as_array().unwrap();
    let names: Vec<&str> = panels.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["xQ", "zpT", "X", "Q2", "Z", "PhPerp"]);
    assert_eq!(v["source"]["sum_weights"], 4.5);

    let z_total: f64 = panels[4]["sumw"].as_array().unwrap().iter().map(|x| x.as_f64().unwrap()).sum();
    assert!((z_total - 4.5).abs() < 1e-12);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn kinematics_config_overrides_and_pairs() {
    let dir = tmp_dir("kin_config");
    let events = write_events(&dir);
    let cfg = dir.join("kin.yaml");
    std::fs::write(
        &cfg,
        "title: ep 10x100\nncols: 2\npanels: [[X, Q2], Z]\noverrides:\n  Q2:\n    x_range: [1, 1000]\n    bins: 30\n",
    )
    .unwrap();
    let output = dir.join("kin.json");

    let out = run(&[
        "kinematics",
        "--input",
        events.to_str().unwrap(),
        "--config",
        cfg.to_str().unwrap(),
        "--no-weight",
        "--output",
        output.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));

    let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(v["title"], "ep 10x100");
    assert_eq!((v["ncols"].as_u64(), v["nrows"].as_u64()), (Some(2), Some(1)));
    assert_eq!(v["source"]["sum_weights"], 4.0);

    let pair = &v["panels"][0];
    assert_eq!(pair["kind"], "hist2d");
    assert_eq!(pair["name"], "X_vs_Q2");
    let y_edges = pair["y_edges"].as_array().unwrap();
    assert_eq!(y_edges.len(), 31);
    assert!((y_edges[30].as_f64().unwrap() - 1000.0).abs() < 1e-9);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn kinematics_missing_branch_fails() {
    let dir = tmp_dir("kin_missing");
    let events = write_events(&dir);
    let cfg = dir.join("kin.yaml");
    std::fs::write(&cfg, "panels: [Mh]\n").unwrap();

    let out = run(&["kinematics", "--input", events.to_str().unwrap(), "--config", cfg.to_str().unwrap()]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Mh"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn kinematics_warns_on_non_finite_columns() {
    let dir = tmp_dir("kin_nan");
    let sample = EventSample::from_columns(
        vec![("Z".to_string(), vec![0.2, f64::NAN, 0.6]), ("X".to_string(), vec![0.1, 0.2, 0.3])],
        None,
    )
    .unwrap();
    let events = dir.join("events.parquet");
    write_parquet(&sample, &events).unwrap();
    let cfg = dir.join("kin.yaml");
    std::fs::write(&cfg, "panels: [Z]\n").unwrap();

    let out = run(&["kinematics", "--input", events.to_str().unwrap(), "--config", cfg.to_str().unwrap(), "--no-weight"]);
    assert!(out.status.success(), "stderr={}", String::from_utf8_lossy(&out.stderr));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("column has non-finite values"), "stderr={stderr}");

    let _ = std::fs::remove_dir_all(&dir);
}
