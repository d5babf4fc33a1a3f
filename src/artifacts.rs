use crate::types::{
    ComparisonReport, LanguageBenchmarkSummary, LanguageRunSummary, ResultSource, RunSummary,
    epoch_secs,
};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, warn};

/// Which result artifact a filename belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Test,
    Benchmark,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultKind::Test => "test",
            ResultKind::Benchmark => "benchmark",
        }
    }
}

/// The shared results location: adapters write their artifacts here, the
/// aggregator reads them back. Owned by the orchestrator for one run.
#[derive(Debug, Clone)]
pub struct ResultsStore {
    dir: PathBuf,
}

impl ResultsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create results directory {}", dir.display()))?;
        Ok(ResultsStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_name(language: &str, kind: ResultKind) -> String {
        format!("{language}_{}_results", kind.as_str())
    }

    fn matches(&self, name: &str, language: &str, kind: ResultKind) -> bool {
        name.starts_with(&Self::artifact_name(language, kind)) && name.ends_with(".json")
    }

    /// All artifacts for a language+kind, in directory order.
    fn artifacts(&self, language: &str, kind: ResultKind) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| self.matches(n, language, kind))
            })
            .collect()
    }

    /// Delete all prior artifacts for a language+kind. Individual delete
    /// failures are logged and skipped; cleanup never aborts a run.
    pub fn cleanup_stale(&self, language: &str, kind: ResultKind) {
        for path in self.artifacts(language, kind) {
            match fs::remove_file(&path) {
                Ok(()) => debug!(file = %path.display(), "removed stale result artifact"),
                Err(e) => warn!(file = %path.display(), error = %e, "could not remove stale artifact"),
            }
        }
    }

    /// The most-recently-modified artifact for a language+kind, if any.
    pub fn find_latest(&self, language: &str, kind: ResultKind) -> Option<PathBuf> {
        self.artifacts(language, kind)
            .into_iter()
            .max_by_key(|p| modified(p))
    }

    pub fn read_test_summary(&self, path: &Path) -> Result<LanguageRunSummary> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read result artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("malformed result artifact {}", path.display()))
    }

    pub fn read_benchmark_summary(&self, path: &Path) -> Result<LanguageBenchmarkSummary> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read benchmark artifact {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("malformed benchmark artifact {}", path.display()))
    }

    pub fn write_test_summary(&self, summary: &LanguageRunSummary) -> Result<PathBuf> {
        let path = self
            .dir
            .join(format!("{}.json", Self::artifact_name(&summary.language, ResultKind::Test)));
        write_json(&path, summary)?;
        Ok(path)
    }

    pub fn write_benchmark_summary(&self, summary: &LanguageBenchmarkSummary) -> Result<PathBuf> {
        let path = self.dir.join(format!(
            "{}.json",
            Self::artifact_name(&summary.language, ResultKind::Benchmark)
        ));
        write_json(&path, summary)?;
        Ok(path)
    }

    pub fn write_report(&self, report: &ComparisonReport) -> Result<PathBuf> {
        let path = self.dir.join("comparison_report.json");
        let wrapped = serde_json::json!({ "comparisonReport": report });
        let content =
            serde_json::to_string_pretty(&wrapped).context("cannot serialize comparison report")?;
        fs::write(&path, content)
            .with_context(|| format!("cannot write report {}", path.display()))?;
        Ok(path)
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let content = serde_json::to_string_pretty(value)
        .with_context(|| format!("cannot serialize artifact {}", path.display()))?;
    fs::write(path, content).with_context(|| format!("cannot write artifact {}", path.display()))
}

fn modified(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
}

/// Degraded fallback when an adapter exits cleanly without writing an
/// artifact: count success/failure marker lines in its captured output. The
/// result is approximate and stays tagged as inferred, never conflated with a
/// structured artifact.
pub fn parse_output_fallback(language: &str, output: &str) -> LanguageRunSummary {
    let mut passed = 0usize;
    let mut total = 0usize;

    for line in output.lines() {
        let lower = line.to_lowercase();
        if line.contains('✅') || lower.contains("passed") {
            passed += 1;
            total += 1;
        } else if line.contains('❌') || lower.contains("failed") || lower.contains("error") {
            total += 1;
        }
    }

    LanguageRunSummary {
        language: language.to_string(),
        timestamp: epoch_secs(),
        tests: Vec::new(),
        summary: RunSummary {
            total,
            passed,
            failed: total - passed,
            errors: 0,
        },
        source: ResultSource::InferredFromOutput,
        error: None,
    }
}
