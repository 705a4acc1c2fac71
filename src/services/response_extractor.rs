//! Recovers generated text (and optional reasoning) from an arbitrary
//! response body using the configuration's response paths.

use serde_json::Value;

use crate::services::path_address::get_path;
use crate::types::ai::{AIConfigurationDraft, Generation};
use crate::types::errors::ExtractError;

/// Result of a successful extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub generation: Generation,
    /// The parsed response, kept for diagnostics.
    pub raw: Value,
}

/// Renders an addressed value as text. `None` for null and empty values.
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// Parses `raw_body` and extracts content and thinking.
///
/// # Errors
/// - `ExtractError::MalformedResponse` if the body is not JSON.
/// - `ExtractError::NoContentExtracted` if the content path is absent or empty.
pub fn extract(raw_body: &str, config: &AIConfigurationDraft) -> Result<Extraction, ExtractError> {
    let raw: Value = serde_json::from_str(raw_body)
        .map_err(|e| ExtractError::MalformedResponse(e.to_string()))?;

    let content = get_path(&raw, &config.response_text_path)
        .and_then(as_text)
        .ok_or_else(|| ExtractError::NoContentExtracted(config.response_text_path.clone()))?;

    let thinking = config
        .response_thinking_path
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .and_then(|p| get_path(&raw, p))
        .and_then(as_text);

    Ok(Extraction {
        generation: Generation { content, thinking },
        raw,
    })
}
