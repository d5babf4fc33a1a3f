use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One entry from the official suite: a named expression plus its expectation
/// metadata. Built once at load time, never mutated.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub description: String,
    pub input_file: String,
    pub expression: String,
    pub expected_output: Vec<ExpectedOutput>,
    pub predicate: bool,
    pub mode: Option<String>,
    /// Non-empty means the expression is expected to fail evaluation.
    pub invalid: Option<String>,
    pub group: String,
}

impl TestCase {
    pub fn is_invalid_test(&self) -> bool {
        self.invalid.as_deref().is_some_and(|v| !v.is_empty())
    }
}

/// A declared expected-output entry. The loader keeps the value textual;
/// type coercion happens at comparison time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedOutput {
    #[serde(rename = "type")]
    pub output_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkCase {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub expression: String,
    #[serde(default = "default_input_file")]
    pub input_file: String,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

fn default_input_file() -> String {
    "patient-example.xml".to_string()
}

fn default_iterations() -> u32 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub name: String,
    pub description: String,
    pub expression: String,
    pub status: TestStatus,
    pub execution_time_ms: f64,
    pub expected: Vec<ExpectedOutput>,
    pub actual: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkResult {
    pub name: String,
    pub description: String,
    pub expression: String,
    pub iterations: u32,
    pub avg_time_ms: f64,
    pub min_time_ms: f64,
    pub max_time_ms: f64,
    pub ops_per_second: f64,
}

impl BenchmarkResult {
    /// Aggregate a non-empty sequence of per-iteration timings (ms).
    /// Degenerate all-zero timings yield 0 ops/sec rather than a division fault.
    pub fn from_timings(case: &BenchmarkCase, timings: &[f64]) -> Self {
        let avg = timings.iter().sum::<f64>() / timings.len() as f64;
        let min = timings.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = timings.iter().cloned().fold(0.0_f64, f64::max);
        let ops = if avg > 0.0 { 1000.0 / avg } else { 0.0 };
        BenchmarkResult {
            name: case.name.clone(),
            description: case.description.clone(),
            expression: case.expression.clone(),
            iterations: case.iterations,
            avg_time_ms: avg,
            min_time_ms: min,
            max_time_ms: max,
            ops_per_second: ops,
        }
    }
}

/// Monotone per-language counters. Invariant: total == passed + failed + errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn record(&mut self, status: TestStatus) {
        self.total += 1;
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Error => self.errors += 1,
        }
    }
}

/// Where a per-language summary came from. Structured artifacts are
/// authoritative; summaries inferred from captured output are a degraded
/// fallback and must stay visibly tagged as such.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultSource {
    #[default]
    Structured,
    InferredFromOutput,
}

/// The durable artifact of running the full test suite for one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageRunSummary {
    pub language: String,
    pub timestamp: f64,
    #[serde(default)]
    pub tests: Vec<TestResult>,
    pub summary: RunSummary,
    #[serde(default, skip_serializing_if = "is_structured")]
    pub source: ResultSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn is_structured(s: &ResultSource) -> bool {
    *s == ResultSource::Structured
}

impl LanguageRunSummary {
    pub fn error_result(language: &str, message: impl Into<String>) -> Self {
        LanguageRunSummary {
            language: language.to_string(),
            timestamp: epoch_secs(),
            tests: Vec::new(),
            summary: RunSummary {
                total: 0,
                passed: 0,
                failed: 0,
                errors: 1,
            },
            source: ResultSource::Structured,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageBenchmarkSummary {
    pub language: String,
    pub timestamp: f64,
    #[serde(default)]
    pub benchmarks: Vec<BenchmarkResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LanguageBenchmarkSummary {
    pub fn error_result(language: &str, message: impl Into<String>) -> Self {
        LanguageBenchmarkSummary {
            language: language.to_string(),
            timestamp: epoch_secs(),
            benchmarks: Vec::new(),
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportTotals {
    pub languages_tested: usize,
    pub total_tests: usize,
    pub total_benchmarks: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    pub timestamp: f64,
    pub test_results: Vec<LanguageRunSummary>,
    pub benchmark_results: Vec<LanguageBenchmarkSummary>,
    pub summary: ReportTotals,
}

/// Seconds since the Unix epoch, the timestamp convention of the artifact schema.
pub fn epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
