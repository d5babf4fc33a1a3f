use crate::classify::{EvalOutcome, classify};
use crate::compare::outputs_match;
use crate::fixtures::FixtureCache;
use crate::types::{
    BenchmarkCase, BenchmarkResult, LanguageBenchmarkSummary, LanguageRunSummary, ResultSource,
    RunSummary, TestCase, TestStatus, epoch_secs,
};
use anyhow::Result;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, warn};

/// Untimed iterations before each benchmark's timed loop.
const WARMUP_ITERATIONS: u32 = 10;

/// The opaque evaluation function every implementation boils down to.
/// External adapters satisfy it across a process boundary; a self-hosted
/// runner implements it in-process.
pub trait Evaluator {
    fn evaluate(&self, input: &Value, expression: &str) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Run invalid-marked tests through the classifier instead of skipping
    /// them at the orchestration layer.
    pub include_invalid: bool,
    /// Compare successful results against the declared expected outputs.
    pub compare_output: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            include_invalid: false,
            compare_output: true,
        }
    }
}

/// Run the full suite sequentially against one evaluator. Test cases whose
/// fixture cannot be loaded are skipped entirely: absent from the result list
/// and from every summary counter.
pub fn run_tests(
    language: &str,
    evaluator: &dyn Evaluator,
    cases: &[TestCase],
    fixtures: &mut FixtureCache,
    opts: &RunOptions,
) -> LanguageRunSummary {
    let mut tests = Vec::new();
    let mut summary = RunSummary::default();

    for case in cases {
        if case.is_invalid_test() && !opts.include_invalid {
            debug!(test = %case.name, "skipping invalid-marked test");
            continue;
        }
        let Some(input) = fixtures.load(&case.input_file) else {
            warn!(test = %case.name, fixture = %case.input_file, "skipping test, fixture unavailable");
            continue;
        };

        let start = Instant::now();
        let outcome = match evaluator.evaluate(input, &case.expression) {
            Ok(value) => EvalOutcome::Succeeded(value),
            Err(e) => EvalOutcome::Raised(e.to_string()),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut result = classify(case, outcome, elapsed_ms);
        // Structural comparison is a separate step on top of the classifier:
        // a successful evaluation of a valid test must also produce the
        // declared outputs.
        if opts.compare_output && result.status == TestStatus::Passed && !case.is_invalid_test() {
            if let Some(actual) = &result.actual {
                if !outputs_match(&case.expected_output, actual, case.predicate) {
                    result.status = TestStatus::Failed;
                    result.error = Some("Result did not match expected output".to_string());
                }
            }
        }

        summary.record(result.status);
        tests.push(result);
    }

    LanguageRunSummary {
        language: language.to_string(),
        timestamp: epoch_secs(),
        tests,
        summary,
        source: ResultSource::Structured,
        error: None,
    }
}

/// Run the benchmark set sequentially. Evaluator failures do not stop a
/// benchmark loop; their cost is reflected in the timings instead.
pub fn run_benchmarks(
    language: &str,
    evaluator: &dyn Evaluator,
    cases: &[BenchmarkCase],
    fixtures: &mut FixtureCache,
) -> LanguageBenchmarkSummary {
    let mut benchmarks = Vec::new();

    for case in cases {
        let Some(input) = fixtures.load(&case.input_file) else {
            warn!(benchmark = %case.name, fixture = %case.input_file, "skipping benchmark, fixture unavailable");
            continue;
        };

        for _ in 0..WARMUP_ITERATIONS {
            let _ = evaluator.evaluate(input, &case.expression);
        }

        let mut timings = Vec::with_capacity(case.iterations as usize);
        for _ in 0..case.iterations {
            let start = Instant::now();
            let _ = evaluator.evaluate(input, &case.expression);
            timings.push(start.elapsed().as_secs_f64() * 1000.0);
        }

        if !timings.is_empty() {
            let result = BenchmarkResult::from_timings(case, &timings);
            debug!(
                benchmark = %case.name,
                avg_ms = result.avg_time_ms,
                ops_per_second = result.ops_per_second,
                "benchmark complete"
            );
            benchmarks.push(result);
        }
    }

    LanguageBenchmarkSummary {
        language: language.to_string(),
        timestamp: epoch_secs(),
        benchmarks,
        error: None,
    }
}
