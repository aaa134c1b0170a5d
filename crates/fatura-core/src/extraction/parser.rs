//! Turning model output into an `ExtractedRecord`.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::error::ExtractionError;
use crate::models::ExtractedRecord;

lazy_static! {
    // ```json ... ``` anywhere in the answer
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n?(.*?)```").unwrap();
}

/// Remove Markdown code fences and any chatter around the JSON object.
pub fn strip_fences(raw: &str) -> &str {
    let inner = CODE_FENCE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(raw)
        .trim();

    // Some models still prepend a sentence; keep the outermost object
    match (inner.find('{'), inner.rfind('}')) {
        (Some(start), Some(end)) if start < end => &inner[start..=end],
        _ => inner,
    }
}

/// Parse and validate model output.
pub fn parse_record(raw: &str) -> Result<ExtractedRecord, ExtractionError> {
    let json = strip_fences(raw);

    let value: Value =
        serde_json::from_str(json).map_err(|e| ExtractionError::Parse(e.to_string()))?;

    if !value.is_object() {
        return Err(ExtractionError::Invalid(format!(
            "expected a JSON object, found {}",
            value
        )));
    }

    let record: ExtractedRecord =
        serde_json::from_value(value).map_err(|e| ExtractionError::Invalid(e.to_string()))?;

    if record.is_empty() {
        return Err(ExtractionError::Invalid("no field was filled in".to_string()));
    }

    Ok(record)
}
