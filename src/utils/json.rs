//! Defensive parsing of structured answers embedded in free-form LLM text.

use serde::de::DeserializeOwned;

use crate::error::{Error, Result};

/// Return the first balanced `{...}` substring of `text`.
///
/// Braces inside JSON string literals are ignored, so `{"a": "}"}` is taken
/// as a whole. Returns `None` when no opening brace is ever closed.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extract the first JSON object from `text` and deserialize it.
///
/// Missing braces and parse failures are both reported as
/// [`Error::MalformedCompletionOutput`].
pub fn parse_embedded_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let candidate = extract_json_object(text).ok_or_else(|| {
        Error::MalformedCompletionOutput("no JSON object in completion".to_string())
    })?;

    serde_json::from_str(candidate).map_err(|e| Error::MalformedCompletionOutput(e.to_string()))
}
