//! Pulling a JSON array of decisions out of free-form model output.
//!
//! Models wrap JSON in code fences, prepend prose, or emit one bad element in
//! an otherwise valid array. Extraction finds the first bracket-balanced array
//! (ignoring brackets inside string literals) and parses each element on its
//! own.

use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use crate::error::{BackendError, Result};

/// One element of the model's answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawDecision {
    pub source: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// Returns the first balanced `[...]` slice of `text`, if any.
pub fn extract_json_array(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('[') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(bytes, start) {
            let candidate = &text[start..=end];
            if serde_json::from_str::<Value>(candidate).is_ok_and(|v| v.is_array()) {
                return Some(candidate);
            }
        }
        // Stray or non-JSON bracket such as "[see below]": try the next one.
        search_from = start + 1;
    }
    None
}

/// Index of the `]` closing the `[` at `start`, skipping string contents.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (byte == b']').then_some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the decisions in `text`.
///
/// A missing or unparseable array is a [`BackendError::MalformedResponse`].
/// Individual malformed elements are skipped with a warning.
pub fn parse_decisions(text: &str) -> Result<Vec<RawDecision>> {
    let array = extract_json_array(text)
        .ok_or_else(|| BackendError::MalformedResponse("no JSON array in response".into()))?;
    let values: Vec<Value> = serde_json::from_str(array)
        .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

    let mut decisions = Vec::with_capacity(values.len());
    for (position, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<RawDecision>(value) {
            Ok(decision) => decisions.push(decision),
            Err(error) => warn!(position, %error, "skipping malformed reasoning element"),
        }
    }
    Ok(decisions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_array_inside_code_fence() {
        let text = "Here you go:\n```json\n[{\"source\":\"a\",\"target\":\"B\"}]\n```\nDone.";
        assert_eq!(extract_json_array(text), Some("[{\"source\":\"a\",\"target\":\"B\"}]"));
    }

    #[test]
    fn ignores_brackets_in_strings() {
        let text = r#"[{"source":"x","reasoning":"looks like ] or [ noise"}] trailing ]"#;
        assert_eq!(
            extract_json_array(text),
            Some(r#"[{"source":"x","reasoning":"looks like ] or [ noise"}]"#)
        );
    }

    #[test]
    fn skips_non_json_brackets() {
        let text = r#"Answer [final]: [{"source":"x","target":null}]"#;
        assert_eq!(extract_json_array(text), Some(r#"[{"source":"x","target":null}]"#));
    }

    #[test]
    fn stray_open_bracket_is_skipped() {
        let text = r#"options [a, b: [{"source":"x","target":"Y"}]"#;
        assert_eq!(extract_json_array(text), Some(r#"[{"source":"x","target":"Y"}]"#));
    }

    #[test]
    fn unbalanced_is_none() {
        assert_eq!(extract_json_array(r#"[{"source":"x""#), None);
        assert_eq!(extract_json_array("no json here"), None);
    }

    #[test]
    fn malformed_element_only_drops_itself() {
        let text = r#"[{"source":"a","target":"A","confidence":0.8},{"target":"B"},{"source":"c","target":null}]"#;
        let decisions = parse_decisions(text).unwrap();
        assert_eq!(decisions.len(), 2);
        assert_eq!(decisions[0].target.as_deref(), Some("A"));
        assert_eq!(decisions[1].source, "c");
        assert_eq!(decisions[1].target, None);
    }

    #[test]
    fn missing_array_is_malformed() {
        assert!(matches!(
            parse_decisions("I cannot help with that."),
            Err(BackendError::MalformedResponse(_))
        ));
    }
}
