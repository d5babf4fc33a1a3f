use crate::artifacts::{ResultKind, ResultsStore, parse_output_fallback};
use crate::types::{LanguageBenchmarkSummary, LanguageRunSummary};
use anyhow::{Context, Result, anyhow};
use indexmap::IndexMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};
use wait_timeout::ChildExt;

/// 5 minutes per adapter invocation; a hung adapter must not block the run
/// forever.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// What an adapter invocation should execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Test,
    Benchmark,
    Both,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            RunMode::Test => "test",
            RunMode::Benchmark => "benchmark",
            RunMode::Both => "both",
        }
    }
}

/// One external command, relative to the implementation directory.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: &str, args: &[&str]) -> Self {
        CommandSpec {
            program: program.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// How to set up and invoke one language implementation. Registered as data:
/// adding a language is a registry entry, not a code branch.
#[derive(Debug, Clone)]
pub struct AdapterDescriptor {
    pub language: String,
    /// Directory under `implementations/` holding this adapter.
    pub dir_name: String,
    pub setup: Vec<CommandSpec>,
    /// Run command; the mode argument is appended at invocation time.
    pub run: CommandSpec,
}

/// The static registry of known adapters, in report order.
pub fn registry() -> IndexMap<String, AdapterDescriptor> {
    let entries = [
        AdapterDescriptor {
            language: "javascript".into(),
            dir_name: "javascript".into(),
            setup: vec![CommandSpec::new("npm", &["install"])],
            run: CommandSpec::new("node", &["test-runner.js"]),
        },
        AdapterDescriptor {
            language: "python".into(),
            dir_name: "python".into(),
            setup: vec![CommandSpec::new(
                "pip",
                &["install", "-r", "requirements.txt"],
            )],
            run: CommandSpec::new("python3", &["test_runner.py"]),
        },
        AdapterDescriptor {
            language: "java".into(),
            dir_name: "java".into(),
            setup: vec![CommandSpec::new("mvn", &["compile"])],
            run: CommandSpec::new(
                "mvn",
                &[
                    "exec:java",
                    "-Dexec.mainClass=org.fhirpath.comparison.TestRunner",
                ],
            ),
        },
        AdapterDescriptor {
            language: "csharp".into(),
            dir_name: "csharp".into(),
            setup: vec![CommandSpec::new("dotnet", &["restore"])],
            run: CommandSpec::new("dotnet", &["run", "--"]),
        },
        AdapterDescriptor {
            language: "rust".into(),
            dir_name: "rust".into(),
            setup: vec![CommandSpec::new("cargo", &["build"])],
            run: CommandSpec::new("cargo", &["run", "--"]),
        },
        AdapterDescriptor {
            language: "go".into(),
            dir_name: "go".into(),
            setup: vec![
                CommandSpec::new("go", &["mod", "tidy"]),
                CommandSpec::new("go", &["run", "main.go"]),
            ],
            run: CommandSpec::new("go", &["run", "main.go"]),
        },
    ];
    entries
        .into_iter()
        .map(|d| (d.language.clone(), d))
        .collect()
}

/// Resolve an adapter command to its full path for diagnostics; commands
/// given as explicit paths are shown as-is.
pub fn resolve_command(cmd: &str) -> String {
    if cmd.contains(std::path::MAIN_SEPARATOR) {
        return cmd.to_string();
    }
    match which::which(cmd) {
        Ok(p) => p.to_string_lossy().into_owned(),
        Err(_) => cmd.to_string(),
    }
}

/// Implementation directories present on disk, in directory order.
pub fn discover_implementations(implementations_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(implementations_dir) else {
        return Vec::new();
    };
    let mut found: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|e| e.file_name().to_str().map(String::from))
        .filter(|name| !name.starts_with('.'))
        .collect();
    found.sort();
    found
}

impl AdapterDescriptor {
    pub fn implementation_dir(&self, implementations_dir: &Path) -> PathBuf {
        implementations_dir.join(&self.dir_name)
    }

    /// Run the adapter's setup commands. Failure means this language is
    /// skipped for the rest of the run.
    pub fn setup(&self, implementations_dir: &Path) -> Result<()> {
        let dir = self.implementation_dir(implementations_dir);
        if !dir.is_dir() {
            return Err(anyhow!(
                "implementation directory not found: {}",
                dir.display()
            ));
        }
        for spec in &self.setup {
            info!(language = %self.language, command = %spec.program, "running setup");
            let status = Command::new(&spec.program)
                .args(&spec.args)
                .current_dir(&dir)
                .status()
                .with_context(|| format!("failed to start '{}'", spec.program))?;
            if !status.success() {
                return Err(anyhow!("'{}' exited with status {status}", spec.program));
            }
        }
        Ok(())
    }

    /// Invoke the adapter with a mode argument, working directory set to its
    /// implementation root, stdout/stderr captured, exit bounded by `timeout`.
    pub fn invoke(
        &self,
        implementations_dir: &Path,
        mode: RunMode,
        timeout: Duration,
    ) -> Result<AdapterOutput> {
        let dir = self.implementation_dir(implementations_dir);
        let mut cmd = Command::new(&self.run.program);
        cmd.args(&self.run.args)
            .arg(mode.as_str())
            .current_dir(&dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start '{}'", self.run.program))?;

        // Drain both pipes off-thread while waiting. A chatty adapter fills
        // the OS pipe buffer long before it finishes, and a blocked write on
        // its side would turn into a false timeout on ours.
        let stdout_drain = drain(child.stdout.take());
        let stderr_drain = drain(child.stderr.take());

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_drain.join();
                let _ = stderr_drain.join();
                return Err(anyhow!(
                    "adapter timed out after {} s",
                    timeout.as_secs()
                ));
            }
        };

        let stdout = String::from_utf8_lossy(&stdout_drain.join().unwrap_or_default()).into_owned();
        let stderr = String::from_utf8_lossy(&stderr_drain.join().unwrap_or_default()).into_owned();
        if !status.success() {
            return Err(anyhow!(
                "adapter exited with status {}\nstderr: {}",
                status,
                stderr.trim_end()
            ));
        }
        Ok(AdapterOutput { stdout, stderr })
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut collected = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut collected);
        }
        collected
    })
}

#[derive(Debug)]
pub struct AdapterOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Full test run for one language: retire stale artifacts, invoke the
/// adapter, collect the authoritative artifact or degrade gracefully. Never
/// returns an error; one language's failure must not abort the others.
pub fn run_adapter_tests(
    descriptor: &AdapterDescriptor,
    implementations_dir: &Path,
    store: &ResultsStore,
    timeout: Duration,
) -> LanguageRunSummary {
    let language = &descriptor.language;
    store.cleanup_stale(language, ResultKind::Test);

    let output = match descriptor.invoke(implementations_dir, RunMode::Test, timeout) {
        Ok(output) => output,
        Err(e) => {
            warn!(language = %language, error = %e, "test run failed");
            return LanguageRunSummary::error_result(language, e.to_string());
        }
    };

    match store.find_latest(language, ResultKind::Test) {
        Some(path) => match store.read_test_summary(&path) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(language = %language, error = %e, "retiring unreadable result artifact");
                store.cleanup_stale(language, ResultKind::Test);
                LanguageRunSummary::error_result(language, e.to_string())
            }
        },
        None => {
            warn!(language = %language, "no result artifact found, inferring from output");
            parse_output_fallback(language, &output.stdout)
        }
    }
}

/// Benchmark counterpart of [`run_adapter_tests`]. There is no textual
/// fallback for benchmark numbers; a missing artifact is an error result.
pub fn run_adapter_benchmarks(
    descriptor: &AdapterDescriptor,
    implementations_dir: &Path,
    store: &ResultsStore,
    timeout: Duration,
) -> LanguageBenchmarkSummary {
    let language = &descriptor.language;
    store.cleanup_stale(language, ResultKind::Benchmark);

    if let Err(e) = descriptor.invoke(implementations_dir, RunMode::Benchmark, timeout) {
        warn!(language = %language, error = %e, "benchmark run failed");
        return LanguageBenchmarkSummary::error_result(language, e.to_string());
    }

    match store.find_latest(language, ResultKind::Benchmark) {
        Some(path) => match store.read_benchmark_summary(&path) {
            Ok(summary) => summary,
            Err(e) => {
                warn!(language = %language, error = %e, "retiring unreadable benchmark artifact");
                store.cleanup_stale(language, ResultKind::Benchmark);
                LanguageBenchmarkSummary::error_result(language, e.to_string())
            }
        },
        None => {
            warn!(language = %language, "no benchmark artifact generated");
            LanguageBenchmarkSummary::error_result(language, "No results file generated")
        }
    }
}
