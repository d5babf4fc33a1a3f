use crate::types::{BenchmarkCase, ExpectedOutput, TestCase};
use anyhow::{Context, Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Benchmark configuration document: fixtures to preload plus the benchmark
/// case list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BenchConfig {
    test_data: TestDataSection,
    #[serde(default)]
    benchmark_tests: Vec<BenchmarkCase>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TestDataSection {
    #[serde(default)]
    input_files: Vec<String>,
}

/// Load the benchmark configuration. Returns the fixture preload list and the
/// benchmark cases. Unparsable input is fatal for the run.
pub fn load_benchmarks(path: &Path) -> Result<(Vec<String>, Vec<BenchmarkCase>)> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read benchmark config {}", path.display()))?;
    let config: BenchConfig = serde_json::from_str(&content)
        .with_context(|| format!("malformed benchmark config {}", path.display()))?;
    Ok((config.test_data.input_files, config.benchmark_tests))
}

fn attr(e: &BytesStart<'_>, name: &str) -> Result<Option<String>> {
    Ok(e.try_get_attribute(name)
        .map_err(|err| anyhow!("bad attribute {name}: {err}"))?
        .map(|a| a.unescape_value().map(|v| v.into_owned()))
        .transpose()
        .map_err(|err| anyhow!("bad attribute value for {name}: {err}"))?)
}

/// Load the official suite XML: named groups containing named test entries.
/// Entries without an expression are skipped; they are not executable.
/// Unparsable structure fails the whole load.
pub fn load_official_tests(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read test suite {}", path.display()))?;
    let tests = parse_official_tests(&content)
        .with_context(|| format!("malformed test suite {}", path.display()))?;
    debug!(count = tests.len(), "loaded official test cases");
    Ok(tests)
}

/// Partially-built test entry while its child elements are being read.
#[derive(Debug, Default)]
struct PendingTest {
    name: String,
    description: String,
    input_file: String,
    predicate: bool,
    mode: Option<String>,
    invalid: Option<String>,
    expression: Option<String>,
    outputs: Vec<ExpectedOutput>,
}

pub fn parse_official_tests(xml: &str) -> Result<Vec<TestCase>> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut tests = Vec::new();
    let mut group_name = String::from("unknown");
    let mut pending: Option<PendingTest> = None;
    // Which text-bearing child of <test> we are inside, if any.
    enum TextTarget {
        Expression,
        Output(String),
    }
    let mut text_target: Option<TextTarget> = None;
    let mut depth: usize = 0;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| anyhow!("XML parse error at offset {}: {e}", reader.buffer_position()))?
        {
            Event::Start(ref e) => {
                depth += 1;
                match e.name().as_ref() {
                    b"group" => {
                        group_name = attr(e, "name")?.unwrap_or_else(|| "unknown".to_string());
                    }
                    b"test" => {
                        let name = attr(e, "name")?.unwrap_or_default();
                        pending = Some(PendingTest {
                            description: attr(e, "description")?.unwrap_or_else(|| name.clone()),
                            name,
                            input_file: attr(e, "inputfile")?
                                .unwrap_or_else(|| "patient-example.xml".to_string()),
                            predicate: attr(e, "predicate")?.as_deref() == Some("true"),
                            mode: attr(e, "mode")?,
                            invalid: attr(e, "invalid")?,
                            ..PendingTest::default()
                        });
                    }
                    b"expression" if pending.is_some() => {
                        text_target = Some(TextTarget::Expression);
                    }
                    b"output" if pending.is_some() => {
                        let output_type = attr(e, "type")?.unwrap_or_else(|| "string".to_string());
                        text_target = Some(TextTarget::Output(output_type));
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) => {
                if let (Some(test), Some(target)) = (pending.as_mut(), text_target.as_ref()) {
                    let text = t
                        .unescape()
                        .map_err(|e| anyhow!("bad text content: {e}"))?
                        .into_owned();
                    match target {
                        TextTarget::Expression => test.expression = Some(text),
                        TextTarget::Output(output_type) => test.outputs.push(ExpectedOutput {
                            output_type: output_type.clone(),
                            value: text,
                        }),
                    }
                }
            }
            Event::End(ref e) => {
                depth = depth.saturating_sub(1);
                match e.name().as_ref() {
                    b"expression" | b"output" => text_target = None,
                    b"test" => {
                        if let Some(test) = pending.take() {
                            // An expression is mandatory for executability.
                            match test.expression.filter(|e| !e.is_empty()) {
                                Some(expression) => tests.push(TestCase {
                                    name: test.name,
                                    description: test.description,
                                    input_file: test.input_file,
                                    expression,
                                    expected_output: test.outputs,
                                    predicate: test.predicate,
                                    mode: test.mode,
                                    invalid: test.invalid,
                                    group: group_name.clone(),
                                }),
                                None => {
                                    debug!(name = %test.name, "skipping test entry without expression")
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
            // <output type="..."/> with no text: declared but empty, ignored,
            // matching the reference loaders which drop valueless outputs.
            Event::Empty(_) => {}
            Event::Eof => {
                // A truncated document ends with elements still open; that is
                // malformed input, not a short suite.
                if depth > 0 || pending.is_some() {
                    return Err(anyhow!(
                        "unexpected end of document with {depth} unclosed element(s)"
                    ));
                }
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(tests)
}
