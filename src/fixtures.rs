use anyhow::{Result, anyhow};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Write-once-per-key cache of input documents, keyed by filename. Owned by
/// the orchestrator for the lifetime of one run; no process-wide state.
///
/// Missing and unreadable fixtures are treated identically: `load` returns
/// `None` and the caller must skip any test case depending on them.
#[derive(Debug)]
pub struct FixtureCache {
    data_dir: PathBuf,
    cache: HashMap<String, Value>,
}

impl FixtureCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        FixtureCache {
            data_dir: data_dir.into(),
            cache: HashMap::new(),
        }
    }

    /// Load a fixture, converting it into the structured form evaluators
    /// consume. First successful load is retained for the rest of the run.
    pub fn load(&mut self, filename: &str) -> Option<&Value> {
        if !self.cache.contains_key(filename) {
            let value = match self.read_fixture(filename) {
                Ok(v) => v,
                Err(e) => {
                    warn!(fixture = filename, error = %e, "fixture unavailable");
                    return None;
                }
            };
            self.cache.insert(filename.to_string(), value);
        }
        self.cache.get(filename)
    }

    fn read_fixture(&self, filename: &str) -> Result<Value> {
        let path = self.data_dir.join(filename);
        let content = fs::read_to_string(&path)
            .map_err(|e| anyhow!("cannot read {}: {e}", path.display()))?;
        if filename.ends_with(".json") {
            serde_json::from_str(&content).map_err(|e| anyhow!("invalid JSON fixture: {e}"))
        } else {
            xml_to_json(&content)
        }
    }
}

/// Convert a FHIR XML document to its JSON-ish mapping form, following the
/// conventions of the original comparison runners: the root element name
/// becomes `resourceType`, `xmlns` attributes are dropped, an element whose
/// only content is a `value` attribute collapses to that value, and repeated
/// sibling elements accumulate into arrays.
pub fn xml_to_json(xml: &str) -> Result<Value> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    // Stack of (element name, accumulated object, text content).
    let mut stack: Vec<(String, Map<String, Value>, Option<String>)> = Vec::new();
    let mut root: Option<Value> = None;

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| anyhow!("XML parse error at offset {}: {e}", reader.buffer_position()))?
        {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                stack.push((name, attributes_of(e)?, None));
            }
            Event::Empty(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let obj = attributes_of(e)?;
                let value = collapse(obj, None);
                let has_parent = !stack.is_empty();
                attach(&mut stack, &mut root, name, value, has_parent);
            }
            Event::Text(ref t) => {
                if let Some((_, _, text)) = stack.last_mut() {
                    let chunk = t
                        .unescape()
                        .map_err(|e| anyhow!("bad text content: {e}"))?
                        .into_owned();
                    match text {
                        Some(existing) => existing.push_str(&chunk),
                        None => *text = Some(chunk),
                    }
                }
            }
            Event::End(_) => {
                let (name, obj, text) = stack
                    .pop()
                    .ok_or_else(|| anyhow!("unbalanced XML element"))?;
                let is_root = stack.is_empty();
                let value = collapse(obj, text);
                attach(&mut stack, &mut root, name, value, !is_root);
                if is_root {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    root.ok_or_else(|| anyhow!("empty XML document"))
}

fn attributes_of(e: &quick_xml::events::BytesStart<'_>) -> Result<Map<String, Value>> {
    let mut obj = Map::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| anyhow!("bad attribute: {e}"))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        if key.starts_with("xmlns") {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|e| anyhow!("bad attribute value: {e}"))?
            .into_owned();
        obj.insert(key, Value::String(value));
    }
    Ok(obj)
}

/// Final value of a closed element: a bare `value` attribute (or bare text)
/// collapses to a string; anything else stays an object.
fn collapse(mut obj: Map<String, Value>, text: Option<String>) -> Value {
    if let Some(text) = text {
        obj.insert("value".to_string(), Value::String(text));
    }
    if obj.len() == 1 {
        if let Some(Value::String(s)) = obj.get("value") {
            return Value::String(s.clone());
        }
    }
    Value::Object(obj)
}

/// Add a child value to its parent object, growing repeated siblings into an
/// array. The root element instead becomes the document with a `resourceType`.
fn attach(
    stack: &mut [(String, Map<String, Value>, Option<String>)],
    root: &mut Option<Value>,
    name: String,
    value: Value,
    has_parent: bool,
) {
    if has_parent {
        if let Some((_, parent, _)) = stack.last_mut() {
            match parent.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    parent.insert(name, Value::Array(vec![first, value]));
                }
                None => {
                    parent.insert(name, value);
                }
            }
        }
    } else {
        let mut doc = match value {
            Value::Object(obj) => obj,
            other => {
                let mut obj = Map::new();
                obj.insert("value".to_string(), other);
                obj
            }
        };
        doc.insert("resourceType".to_string(), Value::String(name));
        *root = Some(Value::Object(doc));
    }
}
