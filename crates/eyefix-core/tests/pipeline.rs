use std::fs;
use std::path::{Path, PathBuf};

use eyefix_core::{
    extract_fixations, run_extraction, Diagnostic, Diagnostics, DropReason, DuplicateRepair,
    PipelineConfig, PipelineError, SchemaPolicy,
};
use eyefix_parser::ParserError;
use tempfile::TempDir;

fn write_log(dir: &TempDir, name: &str, lines: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(&path, content).expect("write log");
    path
}

fn read_output(path: &Path) -> String {
    fs::read_to_string(path).expect("read output")
}

#[test]
fn aligns_fixations_to_movie_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "** CONVERTED FROM P01.EDF",
            "MARKER MovieStart 1000 clip.mp4",
            "SFIX R   1500",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
            "SFIX R   2000",
            "EFIX R   2000\t2100\t101\t500.0\t380.0\t1190",
        ],
    );
    let output = dir.path().join("fixations.txt");

    let report = run_extraction(&PipelineConfig::new(&input, &output)).expect("pipeline");

    assert_eq!(read_output(&output), "500\n1000\n");
    assert_eq!(report.movie_start, 1000);
    assert_eq!(report.movie_start_line, Some(2));
    assert_eq!(report.fixation_lines, 2);
    assert_eq!(report.lines_written, 2);
    assert_eq!(report.rows_dropped, 0);
    assert_eq!(
        report.diagnostics.last(),
        Some(&Diagnostic::OutputWritten { lines: 2 })
    );
}

#[test]
fn fixation_before_movie_start_is_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   800\t900\t101\t512.3\t384.1\t1200",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
            "EFIX R   2000\t2100\t101\t500.0\t380.0\t1190",
        ],
    );
    let output = dir.path().join("fixations.txt");

    let report = run_extraction(&PipelineConfig::new(&input, &output)).expect("pipeline");

    assert_eq!(read_output(&output), "500\n1000\n");
    assert_eq!(report.rows, 3);
    assert_eq!(report.lines_written, report.rows - 1);
    assert!(report.diagnostics.contains(&Diagnostic::RowDropped {
        row_index: 0,
        reason: DropReason::NegativeAlignedTime { exact_start: -200 },
    }));
}

#[test]
fn missing_marker_halts_without_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &["EFIX R   1500\t1600\t101\t512.3\t384.1\t1200"],
    );
    let output = dir.path().join("fixations.txt");

    let err = run_extraction(&PipelineConfig::new(&input, &output))
        .expect_err("missing marker should halt");

    assert!(matches!(err, PipelineError::MissingMovieStart { .. }));
    assert!(!output.exists());
}

#[test]
fn start_row_past_end_of_file_is_missing_movie_start() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("fixations.txt");
    let mut config = PipelineConfig::new(&input, &output);
    config.start_row = 50;

    let err = run_extraction(&config).expect_err("start row past EOF should halt");
    match err {
        PipelineError::MissingMovieStart { start_row, .. } => assert_eq!(start_row, 50),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn log_without_fixations_halts_without_output() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &["MSG 1000 MovieStart", "SFIX R   1500", "SSACC R  1601"],
    );
    let output = dir.path().join("fixations.txt");

    let err = run_extraction(&PipelineConfig::new(&input, &output))
        .expect_err("no fixations should halt");

    assert!(matches!(err, PipelineError::NoFixationRecords { .. }));
    assert!(!output.exists());
}

#[test]
fn configured_movie_start_skips_marker_scan() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "EFIX R   12500\t12600\t101\t512.3\t384.1\t1200",
            "EFIX R   13000\t13100\t101\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("fixations.txt");
    let mut config = PipelineConfig::new(&input, &output);
    config.movie_start_override = Some(12000);

    let report = run_extraction(&config).expect("pipeline");

    assert_eq!(read_output(&output), "500\n1000\n");
    assert_eq!(report.movie_start_line, None);
    assert_eq!(
        report.diagnostics[0],
        Diagnostic::MovieStartOverridden { movie_start: 12000 }
    );
}

#[test]
fn configured_movie_start_still_drops_earlier_fixations() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   11800\t11900\t101\t512.3\t384.1\t1200",
            "EFIX R   12500\t12600\t101\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("fixations.txt");
    let mut config = PipelineConfig::new(&input, &output);
    config.movie_start_override = Some(12000);

    let report = run_extraction(&config).expect("pipeline");

    assert_eq!(read_output(&output), "500\n");
    assert_eq!(report.movie_start, 12000);
    assert_eq!(report.rows_dropped, 1);
    assert!(report.diagnostics.contains(&Diagnostic::RowDropped {
        row_index: 0,
        reason: DropReason::NegativeAlignedTime { exact_start: -200 },
    }));
}

#[test]
fn unwritable_output_surfaces_output_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("missing").join("fixations.txt");

    let err = run_extraction(&PipelineConfig::new(&input, &output))
        .expect_err("missing parent directory");

    match err {
        PipelineError::Output { path, .. } => assert_eq!(path, output),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn out_of_range_start_time_is_dropped_not_saturated() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   1e19\t1600\t101\t512.3\t384.1\t1200",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("fixations.txt");

    let report = run_extraction(&PipelineConfig::new(&input, &output)).expect("pipeline");

    assert_eq!(read_output(&output), "500\n");
    assert!(report
        .diagnostics
        .contains(&Diagnostic::UnparsableNumericField {
            row_index: 0,
            column: "start_time".to_string(),
            value: "1e19".to_string(),
        }));
    assert!(report.diagnostics.contains(&Diagnostic::RowDropped {
        row_index: 0,
        reason: DropReason::MissingStartTime,
    }));
}

#[test]
fn rerun_overwrites_output_identically() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("fixations.txt");
    fs::write(&output, "stale\nstale\nstale\n").expect("seed output");

    let config = PipelineConfig::new(&input, &output);
    run_extraction(&config).expect("first run");
    let first = fs::read(&output).expect("read first");
    run_extraction(&config).expect("second run");
    let second = fs::read(&output).expect("read second");

    assert_eq!(first, b"500\n");
    assert_eq!(first, second);
}

#[test]
fn duplicate_start_takes_previous_end_time() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
            "EFIX R   1500\t1700\t201\t512.3\t384.1\t1200",
            "EFIX R   1200\t1300\t101\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("fixations.txt");

    let report = run_extraction(&PipelineConfig::new(&input, &output)).expect("pipeline");

    assert_eq!(read_output(&output), "200\n500\n600\n");
    assert_eq!(report.duplicate_count, 1);
    assert_eq!(report.repaired_count, 1);

    let values: Vec<i64> = read_output(&output)
        .lines()
        .map(|line| line.parse().expect("integer line"))
        .collect();
    assert!(values.iter().all(|value| *value >= 0));
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn until_stable_repair_clears_sorted_collisions() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 0 MovieStart",
            "EFIX R   100\t150\t51\t1.0\t1.0\t1",
            "EFIX R   100\t400\t301\t1.0\t1.0\t1",
            "EFIX R   120\t130\t11\t1.0\t1.0\t1",
            "EFIX R   150\t160\t11\t1.0\t1.0\t1",
        ],
    );
    let output = dir.path().join("fixations.txt");

    let mut config = PipelineConfig::new(&input, &output);
    run_extraction(&config).expect("single pass");
    assert_eq!(read_output(&output), "100\n120\n150\n150\n");

    config.table.duplicate_repair = DuplicateRepair::UntilStable;
    run_extraction(&config).expect("until stable");
    assert_eq!(read_output(&output), "100\n120\n150\n400\n");
}

#[test]
fn schema_drift_halts_before_output_in_strict_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   1500\t1600\t101\t512.3\t384.1\t1200",
            "EFIX R   2000\t2100\t101\t500.0",
        ],
    );
    let output = dir.path().join("fixations.txt");
    let mut config = PipelineConfig::new(&input, &output);

    let mut diagnostics = Diagnostics::new();
    let err = extract_fixations(&config, &mut diagnostics).expect_err("strict schema");
    assert!(matches!(
        err,
        PipelineError::Parser(ParserError::SchemaMismatch {
            row_index: 1,
            line_number: 3,
            ..
        })
    ));
    assert!(!output.exists());
    assert!(diagnostics
        .events()
        .contains(&Diagnostic::FixationLinesCollected { count: 2 }));

    config.table.schema_policy = SchemaPolicy::Lenient;
    run_extraction(&config).expect("lenient run");
    assert_eq!(read_output(&output), "500\n1000\n");
}

#[test]
fn missing_input_surfaces_open_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = dir.path().join("absent.asc");
    let output = dir.path().join("fixations.txt");

    let err = run_extraction(&PipelineConfig::new(&input, &output)).expect_err("missing input");
    assert!(matches!(
        err,
        PipelineError::Parser(ParserError::Open { .. })
    ));
    assert!(!output.exists());
}

#[test]
fn report_serializes_to_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let input = write_log(
        &dir,
        "session.asc",
        &[
            "MSG 1000 MovieStart",
            "EFIX R   900\t950\t51\t512.3\t384.1\t1200",
        ],
    );
    let output = dir.path().join("fixations.txt");

    let report = run_extraction(&PipelineConfig::new(&input, &output)).expect("pipeline");
    let json = serde_json::to_value(&report).expect("serialize report");

    assert_eq!(json["lines_written"], 0);
    assert_eq!(json["rows_dropped"], 1);
    assert!(json["diagnostics"]
        .as_array()
        .expect("diagnostics array")
        .iter()
        .any(|event| event["kind"] == "row_dropped"));
    assert_eq!(read_output(&output), "");
}
