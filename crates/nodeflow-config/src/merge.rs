//! Merging of layered configuration trees
//!
//! Sources are folded highest precedence first. When two sources define
//! the same key:
//! - mappings merge recursively
//! - numbers keep the larger value
//! - sequences are concatenated, higher precedence entries first
//! - any other value keeps the higher precedence definition

use serde_json::{Map, Value};

/// Expand a source into its mappings: a mapping yields itself, a sequence
/// yields each mapping it contains, anything else yields nothing.
///
/// Returned values are copies; the caller's data is never touched.
pub fn flatten(source: &Value) -> Vec<Map<String, Value>> {
    match source {
        Value::Object(map) => vec![map.clone()],
        Value::Array(items) => items.iter().flat_map(flatten).collect(),
        _ => Vec::new(),
    }
}

/// Fold mappings (highest precedence first) into one
pub fn combine<I>(sources: I) -> Map<String, Value>
where
    I: IntoIterator<Item = Map<String, Value>>,
{
    let mut merged = Map::new();
    for source in sources {
        selective_update(&mut merged, source);
    }
    merged
}

fn selective_update(target: &mut Map<String, Value>, incoming: Map<String, Value>) {
    for (key, value) in incoming {
        let Some(existing) = target.get_mut(&key) else {
            target.insert(key, value);
            continue;
        };

        match (existing, value) {
            (Value::Object(existing), Value::Object(value)) => selective_update(existing, value),
            (Value::Array(existing), Value::Array(value)) => existing.extend(value),
            (existing @ Value::Number(_), value @ Value::Number(_)) => {
                if as_f64(&value) > as_f64(existing) {
                    *existing = value;
                }
            }
            _ => {}
        }
    }
}

fn as_f64(value: &Value) -> f64 {
    value.as_f64().unwrap_or(f64::NEG_INFINITY)
}
