use crate::types::{
    ComparisonReport, LanguageBenchmarkSummary, LanguageRunSummary, ReportTotals, ResultSource,
    epoch_secs,
};
use colored::Colorize;

/// Merge the per-language summaries collected this run into one report with
/// cross-language totals. Built fresh each run, never incrementally updated.
pub fn build_report(
    test_results: Vec<LanguageRunSummary>,
    benchmark_results: Vec<LanguageBenchmarkSummary>,
) -> ComparisonReport {
    let summary = ReportTotals {
        languages_tested: test_results.len(),
        total_tests: test_results.iter().map(|r| r.summary.total).sum(),
        total_benchmarks: benchmark_results.iter().map(|r| r.benchmarks.len()).sum(),
    };
    ComparisonReport {
        timestamp: epoch_secs(),
        test_results,
        benchmark_results,
        summary,
    }
}

pub fn render_human(report: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", "=".repeat(60)));
    out.push_str(&format!(
        "{}\n",
        "FHIRPATH LIBRARY COMPARISON SUMMARY".bold()
    ));
    out.push_str(&format!("{}\n", "=".repeat(60)));

    for result in &report.test_results {
        let s = &result.summary;
        let passed = if s.passed == s.total && s.total > 0 {
            s.passed.to_string().green().to_string()
        } else {
            s.passed.to_string().yellow().to_string()
        };
        let mut line = format!(
            "{:12} | Tests: {passed}/{} passed, {} failed, {} errors",
            result.language, s.total, s.failed, s.errors
        );
        if result.source == ResultSource::InferredFromOutput {
            line.push_str(&format!(" {}", "(inferred from output)".yellow()));
        }
        if let Some(err) = &result.error {
            line.push_str(&format!(" {} {}", "[error]".red().bold(), err.red()));
        }
        out.push_str(&line);
        out.push('\n');
    }

    let with_benchmarks: Vec<_> = report
        .benchmark_results
        .iter()
        .filter(|r| !r.benchmarks.is_empty() || r.error.is_some())
        .collect();
    if !with_benchmarks.is_empty() {
        out.push_str("\nBenchmark results (avg time in ms):\n");
        for result in with_benchmarks {
            out.push_str(&format!("\n{}:\n", result.language.bold()));
            if let Some(err) = &result.error {
                out.push_str(&format!("  {} {}\n", "[error]".red().bold(), err.red()));
            }
            for bench in &result.benchmarks {
                out.push_str(&format!(
                    "  {:25} | {:8.2} ms | {:10.1} ops/sec\n",
                    bench.name, bench.avg_time_ms, bench.ops_per_second
                ));
            }
        }
    }

    out.push_str(&format!(
        "\nLanguages: {}, total tests: {}, total benchmarks: {}\n",
        report.summary.languages_tested, report.summary.total_tests, report.summary.total_benchmarks
    ));
    out
}

pub fn print_human(report: &ComparisonReport) {
    print!("{}", render_human(report));
}
