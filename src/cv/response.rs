//! Model Response Handling
//!
//! Models are told to respond with bare JSON, but in practice wrap it in
//! code fences or stray prose often enough that export would be flaky
//! without a tolerant extraction step.

use serde_json::Value;

use crate::types::{CvError, Result};

/// Extract a JSON object from model output.
///
/// Tries, in order: the trimmed text as-is, the text with code fences
/// stripped, and the outermost `{...}` span.
pub fn extract_json(text: &str) -> Result<Value> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let unfenced = strip_fences(trimmed);
    if let Ok(value) = serde_json::from_str(unfenced) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (unfenced.find('{'), unfenced.rfind('}'))
        && start < end
        && let Ok(value) = serde_json::from_str(&unfenced[start..=end])
    {
        return Ok(value);
    }

    Err(CvError::MalformedResponse(format!(
        "expected a JSON object, got: {}",
        truncate(trimmed, 200)
    )))
}

/// Remove a surrounding ```/```json fence if present.
fn strip_fences(text: &str) -> &str {
    let mut inner = text;
    if let Some(rest) = inner.strip_prefix("```") {
        inner = rest.strip_prefix("json").unwrap_or(rest);
        inner = inner.trim_start_matches(['\r', '\n']);
        if let Some(body) = inner.strip_suffix("```") {
            inner = body;
        }
    }
    inner.trim()
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_json() {
        let value = extract_json(r#"{"extract": "x"}"#).unwrap();
        assert_eq!(value["extract"], "x");
    }

    #[test]
    fn test_fenced_json() {
        let value = extract_json("```json\n{\"extract\": \"x\"}\n```").unwrap();
        assert_eq!(value["extract"], "x");

        let value = extract_json("```\n{\"extract\": \"y\"}\n```").unwrap();
        assert_eq!(value["extract"], "y");
    }

    #[test]
    fn test_json_with_surrounding_prose() {
        let value = extract_json("Here is the CV:\n{\"extract\": \"x\"}\nHope it helps!").unwrap();
        assert_eq!(value["extract"], "x");
    }

    #[test]
    fn test_garbage_rejected() {
        let err = extract_json("I am unable to help with that.").unwrap_err();
        assert!(matches!(err, CvError::MalformedResponse(_)));
    }
}
