//! Pulling a JSON object out of model output
//!
//! JSON mode guarantees a bare object from OpenAI, but OpenAI-compatible local
//! servers frequently wrap the object in a Markdown fence or add a sentence
//! before it. Both shapes are accepted here.

use crate::{LLMError, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*\})\s*```").expect("fence pattern is valid")
});

/// Parse the first JSON object found in `text`
///
/// Tries, in order: the whole trimmed text, a fenced code block, and the span
/// between the first `{` and the last `}`.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(LLMError::UnexpectedResponse(
            "empty response where a JSON object was expected".to_string(),
        ));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return into_object(value);
    }

    if let Some(captures) = FENCED_OBJECT.captures(trimmed) {
        if let Some(body) = captures.get(1) {
            if let Ok(value) = serde_json::from_str::<Value>(body.as_str()) {
                return into_object(value);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            let value = serde_json::from_str::<Value>(&trimmed[start..=end]).map_err(|e| {
                LLMError::UnexpectedResponse(format!("invalid JSON object in response: {e}"))
            })?;
            return into_object(value);
        }
    }

    Err(LLMError::UnexpectedResponse(format!(
        "no JSON object in response: {}",
        preview(trimmed)
    )))
}

fn into_object(value: Value) -> Result<Value> {
    if value.is_object() {
        Ok(value)
    } else {
        Err(LLMError::UnexpectedResponse(format!(
            "expected a JSON object, got {}",
            preview(&value.to_string())
        )))
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    if text.chars().count() <= MAX {
        text.to_string()
    } else {
        let head: String = text.chars().take(MAX).collect();
        format!("{head}...")
    }
}
