use cda_instances::Assignment;
use cda_runtime::*;
use cda_utils::{load_json, write_json};
use std::path::Path;

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("cda-runtime-{}-{}", std::process::id(), name))
}

#[test]
fn test_series_round_trip() {
    let path = temp_path("series.txt");
    {
        let mut writer = SeriesWriter::create(&path, &["t", "e"]).unwrap();
        writer.record_point(0.0, 0.125).unwrap();
        writer.record_point(0.5, 0.0625).unwrap();
    }
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# t\te\n"));
    let rows = read_series(&path).unwrap();
    assert_eq!(rows, vec![vec![0.0, 0.125], vec![0.5, 0.0625]]);
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_default_names() {
    let name = walksat_series_name(3, 100, 300, 0.5, 10.0, 1, 1e-2);
    assert_eq!(
        name.to_str().unwrap(),
        "CDA_WalkSAT_av_rates_ener_K_3_N_100_M_300_q_0.5000_tl_10.00_seed_1_tol_1.0e-2.txt"
    );
    let name = decimation_series_name(3, 20, 60, 0.3, 5, 7, 1e-3);
    assert!(name.to_str().unwrap().starts_with("CDA_decimation_FMS_dyn_K_3_N_20_M_60"));
    assert_eq!(
        final_report_path(Path::new("run.txt")),
        Path::new("run.final.json")
    );
}

#[test]
fn test_final_report_json() {
    let path = temp_path("report.json");
    let report = FinalReport {
        assignment: Assignment {
            variables: vec![true, false, true],
        },
        residual_energy: 1,
        accepted_steps: 12,
        energy: 1.0,
        runtime_secs: 0.25,
    };
    write_json(&report, &path).unwrap();
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("\"assignment\""));
    let loaded: FinalReport = load_json(path.to_str().unwrap()).unwrap();
    assert_eq!(loaded, report);
    std::fs::remove_file(&path).unwrap();
}
