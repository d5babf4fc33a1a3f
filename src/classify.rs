use crate::types::{TestCase, TestResult, TestStatus};
use serde_json::Value;

/// What a single evaluation attempt produced: a value, or a raised error.
#[derive(Debug, Clone)]
pub enum EvalOutcome {
    Succeeded(Value),
    Raised(String),
}

pub const EXPECTED_ERROR_MESSAGE: &str = "Expected error but expression succeeded";

/// State-free decision procedure turning an evaluation attempt plus the
/// test's expectation metadata into a classified result.
///
/// For invalid-marked tests success is inverted: raising is the correct
/// behavior and silently succeeding is surfaced as a failure.
pub fn classify(case: &TestCase, outcome: EvalOutcome, execution_time_ms: f64) -> TestResult {
    let (status, actual, error) = match (case.is_invalid_test(), outcome) {
        (false, EvalOutcome::Succeeded(value)) => (TestStatus::Passed, Some(value), None),
        (false, EvalOutcome::Raised(message)) => (TestStatus::Error, None, Some(message)),
        (true, EvalOutcome::Succeeded(_)) => (
            TestStatus::Failed,
            None,
            Some(EXPECTED_ERROR_MESSAGE.to_string()),
        ),
        (true, EvalOutcome::Raised(_)) => (TestStatus::Passed, None, None),
    };
    TestResult {
        name: case.name.clone(),
        description: case.description.clone(),
        expression: case.expression.clone(),
        status,
        execution_time_ms,
        expected: case.expected_output.clone(),
        actual,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn case(invalid: Option<&str>) -> TestCase {
        TestCase {
            name: "t".into(),
            description: "t".into(),
            input_file: "patient-example.xml".into(),
            expression: "Patient.name.exists()".into(),
            expected_output: vec![],
            predicate: false,
            mode: None,
            invalid: invalid.map(String::from),
            group: "basic".into(),
        }
    }

    #[test]
    fn valid_test_success_passes_with_actual() {
        let r = classify(&case(None), EvalOutcome::Succeeded(json!([true])), 1.0);
        assert_eq!(r.status, TestStatus::Passed);
        assert_eq!(r.actual, Some(json!([true])));
        assert!(r.error.is_none());
    }

    #[test]
    fn valid_test_raise_is_error_with_message() {
        let r = classify(&case(None), EvalOutcome::Raised("boom".into()), 1.0);
        assert_eq!(r.status, TestStatus::Error);
        assert!(r.actual.is_none());
        assert_eq!(r.error.as_deref(), Some("boom"));
    }

    #[test]
    fn invalid_test_success_is_failure() {
        let r = classify(&case(Some("true")), EvalOutcome::Succeeded(json!([1])), 1.0);
        assert_eq!(r.status, TestStatus::Failed);
        assert!(r.actual.is_none());
        assert_eq!(r.error.as_deref(), Some(EXPECTED_ERROR_MESSAGE));
    }

    #[test]
    fn invalid_test_raise_passes() {
        let r = classify(&case(Some("semantic")), EvalOutcome::Raised("bad".into()), 1.0);
        assert_eq!(r.status, TestStatus::Passed);
        assert!(r.actual.is_none());
        assert!(r.error.is_none());
    }

    #[test]
    fn empty_invalid_marker_is_not_invalid() {
        assert!(!case(Some("")).is_invalid_test());
        assert!(case(Some("semantic")).is_invalid_test());
    }
}
