//! Merging per-chunk JSON responses into one object

use serde_json::{Map, Value};
use tracing::debug;

/// Merge chunk responses in order
///
/// Lists are concatenated, objects shallow-merged (later keys win), other
/// values appended to the existing text as `"{old}\n{new}"` and trimmed.
/// `null` values are skipped; on a shape mismatch the later value wins.
pub fn merge_responses<I>(responses: I) -> Value
where
    I: IntoIterator<Item = Value>,
{
    let mut merged = Map::new();

    for response in responses {
        let Value::Object(fields) = response else {
            debug!("Skipping non-object chunk response");
            continue;
        };

        for (key, value) in fields {
            match value {
                Value::Null => {}
                Value::Array(items) => match merged.get_mut(&key) {
                    Some(Value::Array(existing)) => existing.extend(items),
                    _ => {
                        merged.insert(key, Value::Array(items));
                    }
                },
                Value::Object(entries) => match merged.get_mut(&key) {
                    Some(Value::Object(existing)) => existing.extend(entries),
                    _ => {
                        merged.insert(key, Value::Object(entries));
                    }
                },
                scalar => {
                    let old = match merged.get(&key) {
                        Some(Value::String(s)) => s.clone(),
                        _ => String::new(),
                    };
                    let new = match scalar {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    let text = format!("{old}\n{new}").trim().to_string();
                    merged.insert(key, Value::String(text));
                }
            }
        }
    }

    Value::Object(merged)
}
