use std::fs;
use std::path::Path;

use laser_power_combiner::data::model::KEY_COLUMN;
use laser_power_combiner::output::OutputFormat;
use laser_power_combiner::plot::PlotStyle;
use laser_power_combiner::{run, CalibrationError, RunConfig, RunOutcome};
use tempfile::TempDir;

fn write_log(dir: &Path, name: &str, rows: &[(u32, f64, f64)]) {
    let mut text = String::from("Laser power measurement\nSensor;S170C\nResult table values\n");
    text.push_str("power_instruction;power;error\n");
    for (pct, power, error) in rows {
        text.push_str(&format!("{pct};{power};{error}\n"));
    }
    text.push_str("Time;10:15:00\n");
    fs::write(dir.join(name), text).unwrap();
}

fn config(tmp: &TempDir, format: OutputFormat) -> RunConfig {
    let mut config = RunConfig::new(
        tmp.path().join("logs"),
        tmp.path().join("out").join("combined_power_data.xlsx"),
        tmp.path().join("out").join("plots"),
    );
    config.format = format;
    config.delimited_dir = tmp.path().join("csv");
    config.plot_style = PlotStyle {
        width: 400,
        height: 300,
        ..PlotStyle::default()
    };
    config
}

fn two_session_logs(tmp: &TempDir) {
    let logs = tmp.path().join("logs");
    fs::create_dir_all(&logs).unwrap();
    write_log(
        &logs,
        "08-10_scan_488.csv",
        &[(20, 2.1, 0.1), (30, 3.2, -0.1), (40, 4.0, 0.2)],
    );
    write_log(
        &logs,
        "07-25_scan_488.csv",
        &[(10, 1.0, 0.05), (20, 2.0, 0.1), (30, 3.0, 0.1)],
    );
}

#[test]
fn two_sessions_merge_into_one_group() {
    let tmp = TempDir::new().unwrap();
    two_session_logs(&tmp);
    let mut config = config(&tmp, OutputFormat::Delimited);
    config.render_charts = false;

    let RunOutcome::Completed(summary) = run(&config).unwrap() else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.files_parsed, 2);
    assert_eq!(summary.groups.len(), 1);
    let group = &summary.groups[0];
    assert_eq!(group.wavelength, 488);
    assert_eq!(group.rows, 4);
    assert_eq!(group.labels, vec!["07-25", "08-10"]);
    assert_eq!(
        group.columns,
        vec![KEY_COLUMN, "07-25_power", "07-25_error", "08-10_power", "08-10_error"]
    );

    let csv_path = tmp.path().join("csv").join("combined_488nm.csv");
    assert_eq!(summary.exported, vec![csv_path.clone()]);
    let content = fs::read_to_string(csv_path).unwrap();
    let keys: Vec<&str> = content
        .lines()
        .skip(1)
        .map(|l| l.split(',').next().unwrap())
        .collect();
    assert_eq!(keys, vec!["10", "20", "30", "40"]);
    assert!(content.lines().nth(1).unwrap().ends_with(",,"));
    assert!(content.lines().nth(4).unwrap().starts_with("40,,,"));
    assert!(summary.charts.is_empty());
}

#[test]
fn charts_and_workbook_are_written() {
    let tmp = TempDir::new().unwrap();
    two_session_logs(&tmp);
    let mut config = config(&tmp, OutputFormat::Spreadsheet);
    config.summary_path = Some(tmp.path().join("summary.json"));

    let RunOutcome::Completed(summary) = run(&config).unwrap() else {
        panic!("expected a completed run");
    };

    let chart = tmp.path().join("out").join("plots").join("laser_power_488nm.png");
    assert_eq!(summary.charts, vec![chart.clone()]);
    let png = fs::read(&chart).unwrap();
    assert_eq!(&png[..4], b"\x89PNG");

    #[cfg(feature = "xlsx")]
    assert!(tmp.path().join("out").join("combined_power_data.xlsx").is_file());
    #[cfg(not(feature = "xlsx"))]
    {
        assert!(!tmp.path().join("out").join("combined_power_data.xlsx").exists());
        assert!(tmp.path().join("csv").join("combined_488nm.csv").is_file());
    }

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("summary.json")).unwrap())
            .unwrap();
    assert_eq!(json["groups"][0]["wavelength"], 488);
}

#[test]
fn empty_folder_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join("logs")).unwrap();
    let config = config(&tmp, OutputFormat::Spreadsheet);

    assert!(matches!(run(&config).unwrap(), RunOutcome::NoInputFiles));
    assert!(!tmp.path().join("out").exists());
    assert!(!tmp.path().join("csv").exists());
}

#[test]
fn one_bad_file_aborts_the_run() {
    let tmp = TempDir::new().unwrap();
    two_session_logs(&tmp);
    fs::write(
        tmp.path().join("logs").join("09-01_scan_488.csv"),
        "power_instruction;power;error\n10;1;0\n",
    )
    .unwrap();
    let config = config(&tmp, OutputFormat::Delimited);

    let err = run(&config).unwrap_err();
    assert!(matches!(err, CalibrationError::MarkerNotFound { .. }));
    assert!(!tmp.path().join("csv").exists());
}

#[test]
fn wavelengths_are_grouped_separately() {
    let tmp = TempDir::new().unwrap();
    two_session_logs(&tmp);
    let logs = tmp.path().join("logs");
    write_log(&logs, "07-25_scan_640.csv", &[(10, 5.0, 0.1)]);
    write_log(&logs, "notes_without_wavelength.csv", &[(10, 5.0, 0.1)]);
    let mut config = config(&tmp, OutputFormat::Delimited);
    config.render_charts = false;

    let RunOutcome::Completed(summary) = run(&config).unwrap() else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.files_parsed, 4);
    let wavelengths: Vec<u32> = summary.groups.iter().map(|g| g.wavelength).collect();
    assert_eq!(wavelengths, vec![488, 640]);
    assert_eq!(summary.exported.len(), 2);
}
