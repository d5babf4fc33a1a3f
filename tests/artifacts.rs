use fhirpath_compare::artifacts::{ResultKind, ResultsStore, parse_output_fallback};
use fhirpath_compare::report::build_report;
use fhirpath_compare::types::{LanguageRunSummary, ResultSource, RunSummary, epoch_secs};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

fn summary(language: &str, passed: usize) -> LanguageRunSummary {
    LanguageRunSummary {
        language: language.to_string(),
        timestamp: epoch_secs(),
        tests: Vec::new(),
        summary: RunSummary {
            total: passed,
            passed,
            failed: 0,
            errors: 0,
        },
        source: ResultSource::Structured,
        error: None,
    }
}

#[test]
fn consecutive_runs_retain_exactly_one_artifact() {
    let dir = TempDir::new().unwrap();
    let store = ResultsStore::new(dir.path()).unwrap();

    // First run, including a leftover timestamped artifact from an older
    // runner version.
    fs::write(
        dir.path().join("python_test_results_1700000000.json"),
        "{}",
    )
    .unwrap();
    store.cleanup_stale("python", ResultKind::Test);
    store.write_test_summary(&summary("python", 3)).unwrap();

    // Second run.
    store.cleanup_stale("python", ResultKind::Test);
    store.write_test_summary(&summary("python", 7)).unwrap();

    let artifacts: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with("python_test_results"))
        .collect();
    assert_eq!(artifacts.len(), 1);

    let latest = store.find_latest("python", ResultKind::Test).unwrap();
    let parsed = store.read_test_summary(&latest).unwrap();
    assert_eq!(parsed.summary.passed, 7);
}

#[test]
fn artifacts_are_scoped_by_language_and_kind() {
    let dir = TempDir::new().unwrap();
    let store = ResultsStore::new(dir.path()).unwrap();
    store.write_test_summary(&summary("python", 1)).unwrap();
    store.write_test_summary(&summary("go", 2)).unwrap();

    store.cleanup_stale("python", ResultKind::Test);
    assert!(store.find_latest("python", ResultKind::Test).is_none());
    // Other languages' artifacts are untouched.
    assert!(store.find_latest("go", ResultKind::Test).is_some());
    // And so is the other result kind.
    assert!(store.find_latest("go", ResultKind::Benchmark).is_none());
}

#[test]
fn cleanup_on_missing_directory_is_harmless() {
    let dir = TempDir::new().unwrap();
    let store = ResultsStore::new(dir.path().join("results")).unwrap();
    fs::remove_dir_all(dir.path().join("results")).unwrap();
    store.cleanup_stale("python", ResultKind::Test);
    assert!(store.find_latest("python", ResultKind::Test).is_none());
}

#[test]
fn fallback_parsing_counts_markers_and_is_tagged() {
    let stdout = "\
✅ t1 (0.42ms)
✅ t2 (0.11ms)
❌ t3 mismatch
some unrelated logging
";
    let inferred = parse_output_fallback("go", stdout);
    assert_eq!(inferred.source, ResultSource::InferredFromOutput);
    assert_eq!(inferred.summary.total, 3);
    assert_eq!(inferred.summary.passed, 2);
    assert_eq!(inferred.summary.failed, 1);
    assert_eq!(inferred.summary.errors, 0);
    assert!(inferred.tests.is_empty());
}

#[test]
fn error_shaped_summary_counts_one_error_and_no_tests() {
    let errored = LanguageRunSummary::error_result("java", "mvn: command not found");
    assert_eq!(errored.summary.total, 0);
    assert_eq!(errored.summary.errors, 1);
    assert_eq!(errored.error.as_deref(), Some("mvn: command not found"));
}

#[test]
fn report_wraps_results_with_cross_language_totals() {
    let dir = TempDir::new().unwrap();
    let store = ResultsStore::new(dir.path()).unwrap();

    let report = build_report(
        vec![summary("python", 3), summary("go", 5)],
        vec![],
    );
    assert_eq!(report.summary.languages_tested, 2);
    assert_eq!(report.summary.total_tests, 8);
    assert_eq!(report.summary.total_benchmarks, 0);

    let path = store.write_report(&report).unwrap();
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(
        written["comparisonReport"]["summary"]["totalTests"],
        serde_json::json!(8)
    );
    assert_eq!(
        written["comparisonReport"]["testResults"][0]["language"],
        serde_json::json!("python")
    );
}

#[test]
fn artifact_json_uses_camel_case_schema() {
    let dir = TempDir::new().unwrap();
    let store = ResultsStore::new(dir.path()).unwrap();
    let path = store.write_test_summary(&summary("python", 2)).unwrap();
    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw.get("summary").is_some());
    assert_eq!(raw["summary"]["passed"], serde_json::json!(2));
    assert!(raw.get("error").is_none());
}
