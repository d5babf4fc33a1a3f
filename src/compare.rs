use crate::types::ExpectedOutput;
use serde_json::Value;

const DECIMAL_TOLERANCE: f64 = 1e-10;

/// Type-aware structural comparison of the declared expected outputs against
/// the value an evaluator produced. Evaluators return their result as a JSON
/// collection; a bare scalar is treated as a singleton. A predicate test
/// declares a single boolean that asserts whether evaluation produced any
/// result at all, not what the result contains.
pub fn outputs_match(expected: &[ExpectedOutput], actual: &Value, predicate: bool) -> bool {
    let items: Vec<&Value> = match actual {
        Value::Array(items) => items.iter().collect(),
        Value::Null => Vec::new(),
        other => vec![other],
    };
    if predicate {
        return match expected {
            [exp] => exp.value.parse::<bool>().ok() == Some(!items.is_empty()),
            _ => false,
        };
    }
    if expected.len() != items.len() {
        return false;
    }
    expected
        .iter()
        .zip(items)
        .all(|(exp, act)| output_matches(exp, act))
}

fn output_matches(expected: &ExpectedOutput, actual: &Value) -> bool {
    match expected.output_type.as_str() {
        "boolean" => actual.as_bool() == expected.value.parse::<bool>().ok(),
        "integer" => actual.as_i64() == expected.value.parse::<i64>().ok(),
        "decimal" | "quantity" => match (actual.as_f64(), expected.value.parse::<f64>().ok()) {
            (Some(a), Some(e)) => (a - e).abs() < DECIMAL_TOLERANCE,
            _ => false,
        },
        // string, code, date, dateTime, time, uri, ... all compare textually.
        _ => text_of(actual).is_some_and(|a| a == expected.value),
    }
}

/// Textual form of an actual value: strings directly, numbers and booleans via
/// display, objects via their `value` field when the evaluator echoes the
/// element form.
fn text_of(actual: &Value) -> Option<String> {
    match actual {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(obj) => obj.get("value").and_then(text_of),
        _ => None,
    }
}
