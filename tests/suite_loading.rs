use fhirpath_compare::suite::{load_benchmarks, load_official_tests, parse_official_tests};
use fhirpath_compare::types::ExpectedOutput;
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const SAMPLE_SUITE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<tests name="fhir-r4">
  <group name="testExists">
    <test name="t1" description="name exists" inputfile="patient-example.xml">
      <expression>Patient.name.exists()</expression>
      <output type="boolean">true</output>
    </test>
    <test name="t2" predicate="true" mode="strict">
      <expression>Patient.birthDate</expression>
      <output type="date">1974-12-25</output>
      <output type="string">spare</output>
    </test>
    <test name="no-expression" description="not executable"/>
    <test name="bad" invalid="semantic">
      <expression>Patient.name.select(</expression>
    </test>
  </group>
  <group name="testLiterals">
    <test name="t3">
      <expression>1 + 1</expression>
      <output type="integer">2</output>
    </test>
  </group>
</tests>
"#;

#[test]
fn loads_groups_tests_and_ordered_outputs() {
    let tests = parse_official_tests(SAMPLE_SUITE).unwrap();
    // The expression-less entry is skipped, not an error.
    assert_eq!(tests.len(), 4);

    let t1 = &tests[0];
    assert_eq!(t1.name, "t1");
    assert_eq!(t1.description, "name exists");
    assert_eq!(t1.group, "testExists");
    assert_eq!(t1.input_file, "patient-example.xml");
    assert_eq!(t1.expression, "Patient.name.exists()");
    assert!(!t1.predicate);
    assert!(t1.invalid.is_none());
    assert_eq!(
        t1.expected_output,
        vec![ExpectedOutput {
            output_type: "boolean".into(),
            value: "true".into()
        }]
    );

    let t2 = &tests[1];
    // Description defaults to the test name, inputfile to the patient example.
    assert_eq!(t2.description, "t2");
    assert_eq!(t2.input_file, "patient-example.xml");
    assert!(t2.predicate);
    assert_eq!(t2.mode.as_deref(), Some("strict"));
    // Declared outputs keep their document order.
    assert_eq!(t2.expected_output[0].output_type, "date");
    assert_eq!(t2.expected_output[1].value, "spare");

    let bad = &tests[2];
    assert_eq!(bad.invalid.as_deref(), Some("semantic"));
    assert!(bad.is_invalid_test());

    assert_eq!(tests[3].group, "testLiterals");
}

#[test]
fn malformed_suite_fails_loading_entirely() {
    assert!(parse_official_tests("<tests><group name='x'><test").is_err());
}

#[test]
fn truncated_suite_fails_even_after_complete_entries() {
    // EOF with elements still open is malformed input, not a short suite.
    let cut_mid_group =
        "<tests><group name='g'><test name='t'><expression>1 + 1</expression></test>";
    assert!(parse_official_tests(cut_mid_group).is_err());

    let cut_mid_test = "<tests><group name='g'><test name='t'><expression>1</expression>";
    assert!(parse_official_tests(cut_mid_test).is_err());
}

#[test]
fn load_from_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(load_official_tests(&dir.path().join("nope.xml")).is_err());
}

#[test]
fn loads_suite_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tests-fhir-r4.xml");
    fs::write(&path, SAMPLE_SUITE).unwrap();
    let tests = load_official_tests(&path).unwrap();
    assert_eq!(tests.len(), 4);
}

#[test]
fn benchmark_config_parses_with_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test-config.json");
    fs::write(
        &path,
        r#"{
          "testData": { "inputFiles": ["patient-example.xml", "observation-example.xml"] },
          "benchmarkTests": [
            {
              "name": "simple_path",
              "description": "simple path navigation",
              "expression": "Patient.name.family",
              "inputFile": "patient-example.xml",
              "iterations": 500
            },
            { "name": "defaulted", "expression": "Patient.name.exists()" }
          ]
        }"#,
    )
    .unwrap();

    let (input_files, benchmarks) = load_benchmarks(&path).unwrap();
    assert_eq!(input_files.len(), 2);
    assert_eq!(benchmarks.len(), 2);
    assert_eq!(benchmarks[0].iterations, 500);
    // Iterations default to 1000, input file to the patient example.
    assert_eq!(benchmarks[1].iterations, 1000);
    assert_eq!(benchmarks[1].input_file, "patient-example.xml");
}

#[test]
fn malformed_benchmark_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("test-config.json");
    fs::write(&path, "{ not json").unwrap();
    assert!(load_benchmarks(&path).is_err());
}
