use anyhow::{Context, Result};
use clap::Parser;
use colored::control::set_override as set_color_override;
use fhirpath_compare::adapter::{self, DEFAULT_TIMEOUT, RunMode};
use fhirpath_compare::artifacts::{ResultKind, ResultsStore};
use fhirpath_compare::report::{build_report, print_human};
use fhirpath_compare::suite::{load_benchmarks, load_official_tests};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "Run the FHIRPath conformance suite and benchmarks across language implementations"
)]
struct Cli {
    /// Specific languages to test (default: all discovered implementations)
    #[arg(long, value_name = "LANGUAGE", num_args = 1..)]
    languages: Vec<String>,

    /// Only set up adapter dependencies, don't run anything
    #[arg(long, conflicts_with_all = ["tests_only", "benchmarks_only"])]
    setup_only: bool,

    /// Only run tests, skip benchmarks
    #[arg(long, conflicts_with = "benchmarks_only")]
    tests_only: bool,

    /// Only run benchmarks, skip tests
    #[arg(long)]
    benchmarks_only: bool,

    /// Comparison project root holding implementations/, test-cases/,
    /// test-data/ and results/
    #[arg(long, value_name = "DIR", default_value = ".")]
    root: PathBuf,

    /// Override the shared results location
    #[arg(long, value_name = "DIR")]
    results_dir: Option<PathBuf>,

    /// Per-adapter invocation timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    #[arg(long = "no-color")]
    no_color: bool,

    #[arg(short = 'v', long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "fhirpath_compare=info".to_string())
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "fhirpath_compare=warn".to_string())
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if cli.no_color {
        set_color_override(false);
    }

    let implementations_dir = cli.root.join("implementations");
    let suite_path = cli.root.join("test-cases").join("tests-fhir-r4.xml");
    let config_path = cli.root.join("test-cases").join("test-config.json");
    let results_dir = cli
        .results_dir
        .clone()
        .unwrap_or_else(|| cli.root.join("results"));

    // Validate the definitions the adapters are about to consume. A broken
    // definition is fatal up front, before any adapter is invoked.
    if !cli.setup_only {
        if !cli.benchmarks_only {
            let tests = load_official_tests(&suite_path)?;
            info!(tests = tests.len(), "validated test suite");
        }
        if !cli.tests_only {
            let (_, benchmark_cases) = load_benchmarks(&config_path)?;
            info!(benchmarks = benchmark_cases.len(), "validated benchmark config");
        }
    }

    let store = ResultsStore::new(&results_dir)?;
    let registry = adapter::registry();
    let available = adapter::discover_implementations(&implementations_dir);

    let selected: Vec<String> = if cli.languages.is_empty() {
        available.clone()
    } else {
        cli.languages.clone()
    };
    info!(available = ?available, selected = ?selected, "implementations");

    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);

    let mut test_results = Vec::new();
    let mut benchmark_results = Vec::new();

    for language in &selected {
        let Some(descriptor) = registry.get(language) else {
            warn!(language = %language, "no registered adapter, skipping");
            continue;
        };

        info!(
            language = %language,
            command = %adapter::resolve_command(&descriptor.run.program),
            "adapter command"
        );
        if let Err(e) = descriptor.setup(&implementations_dir) {
            warn!(language = %language, error = %e, "setup failed, skipping");
            continue;
        }
        if cli.setup_only {
            continue;
        }

        if !cli.benchmarks_only {
            info!(language = %language, mode = RunMode::Test.as_str(), "running adapter");
            let summary =
                adapter::run_adapter_tests(descriptor, &implementations_dir, &store, timeout);
            // Persist immediately so partial runs retain partial results.
            // Artifacts the adapter already wrote are left untouched.
            if store.find_latest(language, ResultKind::Test).is_none() {
                store.write_test_summary(&summary)?;
            }
            test_results.push(summary);
        }

        if !cli.tests_only {
            info!(language = %language, mode = RunMode::Benchmark.as_str(), "running adapter");
            let summary =
                adapter::run_adapter_benchmarks(descriptor, &implementations_dir, &store, timeout);
            if store.find_latest(language, ResultKind::Benchmark).is_none() {
                store.write_benchmark_summary(&summary)?;
            }
            benchmark_results.push(summary);
        }
    }

    if cli.setup_only {
        println!("Setup completed");
        return Ok(());
    }

    let report = build_report(test_results, benchmark_results);
    let report_path = store
        .write_report(&report)
        .context("failed to write comparison report")?;
    info!(path = %report_path.display(), "report written");

    print_human(&report);

    Ok(())
}
