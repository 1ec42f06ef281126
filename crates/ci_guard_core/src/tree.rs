//! Recursive lookups over parsed YAML documents.

use serde_yaml::{Mapping, Value};

/// Every value stored under `key` anywhere in `doc`, in document order.
///
/// The search keeps descending into matched values, so a `uses` nested inside
/// another `uses` value is found as well.
pub fn values_under_key<'a>(doc: &'a Value, key: &str) -> Vec<&'a Value> {
    let mut found = Vec::new();
    collect_under_key(doc, key, &mut found);
    found
}

fn collect_under_key<'a>(value: &'a Value, key: &str, found: &mut Vec<&'a Value>) {
    match value {
        Value::Mapping(mapping) => {
            for (k, v) in mapping {
                if k.as_str() == Some(key) {
                    found.push(v);
                }
                collect_under_key(v, key, found);
            }
        }
        Value::Sequence(items) => {
            for item in items {
                collect_under_key(item, key, found);
            }
        }
        Value::Tagged(tagged) => collect_under_key(&tagged.value, key, found),
        _ => {}
    }
}

/// Mapping items with a `name` key that sit in a list stored under `env`.
pub fn env_entries(doc: &Value) -> Vec<&Mapping> {
    values_under_key(doc, "env")
        .into_iter()
        .filter_map(Value::as_sequence)
        .flatten()
        .filter_map(Value::as_mapping)
        .filter(|item| item.contains_key("name"))
        .collect()
}

/// Whether any mapping anywhere in `doc` has `key`.
pub fn contains_key(doc: &Value, key: &str) -> bool {
    match doc {
        Value::Mapping(mapping) => mapping
            .iter()
            .any(|(k, v)| k.as_str() == Some(key) || contains_key(v, key)),
        Value::Sequence(items) => items.iter().any(|item| contains_key(item, key)),
        Value::Tagged(tagged) => contains_key(&tagged.value, key),
        _ => false,
    }
}

/// Text form of a value. Scalars render bare, anything else as compact YAML.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_owned())
            .unwrap_or_default(),
    }
}
