//! Recovery of the rewrite response from imperfect model output.
//!
//! Models wrap JSON in markdown fences, put raw newlines inside string
//! values, add prose around the object or leave trailing commas. The
//! response is de-fenced once, then each pipeline in [`REPAIR_PIPELINES`] is
//! applied in order until one yields JSON that deserializes.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

/// Parsed rewrite of a single file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    pub file_content: String,
    #[serde(default)]
    pub messages: BTreeMap<String, String>,
}

#[derive(Error, Debug)]
#[error("{message}")]
pub struct RepairError {
    /// Last parse error after every repair was tried.
    pub message: String,
    /// First 200 characters of the de-fenced response.
    pub preview: String,
}

type Repair = fn(&str) -> String;

/// Repair pipelines in the order they are tried. The first is the identity.
pub const REPAIR_PIPELINES: &[&[Repair]] = &[
    &[],
    &[escape_control_chars],
    &[extract_outermost_object, strip_trailing_commas],
    &[
        extract_outermost_object,
        strip_trailing_commas,
        escape_control_chars,
    ],
];

static RE_TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

const PREVIEW_CHARS: usize = 200;

/// Parses `raw` as `T`, trying each repair pipeline in turn.
pub fn parse_with_repairs<T: DeserializeOwned>(raw: &str) -> Result<T, RepairError> {
    let text = strip_markdown_fences(raw);
    let mut last_error = String::from("empty response");

    for pipeline in REPAIR_PIPELINES {
        let candidate = pipeline
            .iter()
            .fold(text.clone(), |acc, repair| repair(&acc));
        match serde_json::from_str::<T>(&candidate) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(RepairError {
        message: last_error,
        preview: text.chars().take(PREVIEW_CHARS).collect(),
    })
}

/// Removes a surrounding markdown code fence (with optional language tag).
pub fn strip_markdown_fences(text: &str) -> String {
    let trimmed = text.trim();
    let Some(after_ticks) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    let body = after_ticks
        .trim_start_matches(|c: char| c.is_ascii_alphabetic())
        .trim_start_matches(['\n', '\r', ' ']);
    match body.find("```") {
        Some(close) => body[..close].trim().to_string(),
        None => body.trim().to_string(),
    }
}

/// Escapes raw control characters inside the `"fileContent"` string value.
pub fn escape_control_chars(text: &str) -> String {
    const KEY: &str = "\"fileContent\"";
    let Some(key_idx) = text.find(KEY) else {
        return text.to_string();
    };
    let after_key = key_idx + KEY.len();
    let Some(quote_offset) = text[after_key..].find('"') else {
        return text.to_string();
    };
    let content_start = after_key + quote_offset + 1;

    let mut repaired = String::with_capacity(text.len() + 16);
    repaired.push_str(&text[..content_start]);

    let mut chars = text[content_start..].char_indices();
    let mut rest_start = text.len();
    while let Some((offset, c)) = chars.next() {
        match c {
            '\\' => {
                repaired.push(c);
                if let Some((_, escaped)) = chars.next() {
                    repaired.push(escaped);
                }
            }
            '"' => {
                rest_start = content_start + offset;
                break;
            }
            '\n' => repaired.push_str("\\n"),
            '\r' => repaired.push_str("\\r"),
            '\t' => repaired.push_str("\\t"),
            c if (c as u32) < 0x20 => repaired.push_str(&format!("\\u{:04x}", c as u32)),
            c => repaired.push(c),
        }
    }

    repaired.push_str(&text[rest_start..]);
    repaired
}

/// Keeps the text from the first `{` to the last `}`.
pub fn extract_outermost_object(text: &str) -> String {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => text[start..=end].to_string(),
        _ => text.to_string(),
    }
}

/// Drops commas directly before `}` or `]`.
pub fn strip_trailing_commas(text: &str) -> String {
    RE_TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Individual repairs ──

    #[test]
    fn test_strip_fences_with_language_tag() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_markdown_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_fences_without_closing_fence() {
        assert_eq!(strip_markdown_fences("```\n{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_markdown_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_escape_control_chars_only_in_file_content() {
        let raw = "{\"fileContent\": \"line1\nline2\t\\\"q\\\"\", \"messages\": {}}";
        let repaired = escape_control_chars(raw);
        assert_eq!(
            repaired,
            "{\"fileContent\": \"line1\\nline2\\t\\\"q\\\"\", \"messages\": {}}"
        );
    }

    #[test]
    fn test_escape_control_chars_without_key_is_identity() {
        assert_eq!(escape_control_chars("{\"x\": 1}"), "{\"x\": 1}");
    }

    #[test]
    fn test_extract_outermost_object() {
        assert_eq!(
            extract_outermost_object("Here you go: {\"a\": {\"b\": 1}} thanks"),
            "{\"a\": {\"b\": 1}}"
        );
        assert_eq!(extract_outermost_object("no braces"), "no braces");
    }

    #[test]
    fn test_strip_trailing_commas() {
        assert_eq!(
            strip_trailing_commas("{\"a\": [1, 2,], \"b\": 3,\n}"),
            "{\"a\": [1, 2], \"b\": 3\n}"
        );
    }

    // ── Chain ──

    #[test]
    fn test_parse_clean_response() {
        let parsed: TransformResponse = parse_with_repairs(
            r#"{"fileContent": "export {}", "messages": {"home.title": "Hello"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.file_content, "export {}");
        assert_eq!(parsed.messages["home.title"], "Hello");
    }

    #[test]
    fn test_parse_fenced_response_with_raw_newlines() {
        let raw = "```json\n{\"fileContent\": \"const a = 1;\nconst b = 2;\", \"messages\": {}}\n```";
        let parsed: TransformResponse = parse_with_repairs(raw).unwrap();
        assert_eq!(parsed.file_content, "const a = 1;\nconst b = 2;");
    }

    #[test]
    fn test_parse_prose_and_trailing_commas() {
        let raw = "Sure! {\"fileContent\": \"x\", \"messages\": {\"a.b\": \"A\",},} Done.";
        let parsed: TransformResponse = parse_with_repairs(raw).unwrap();
        assert_eq!(parsed.messages["a.b"], "A");
    }

    #[test]
    fn test_parse_needs_every_repair() {
        let raw = "Output:\n{\"fileContent\": \"a\nb\", \"messages\": {\"k\": \"v\",}}";
        let parsed: TransformResponse = parse_with_repairs(raw).unwrap();
        assert_eq!(parsed.file_content, "a\nb");
        assert_eq!(parsed.messages["k"], "v");
    }

    #[test]
    fn test_unrepairable_response_reports_preview() {
        let raw = "I cannot help with that request.".repeat(20);
        let err = parse_with_repairs::<TransformResponse>(&raw).unwrap_err();
        assert_eq!(err.preview.chars().count(), 200);
        assert!(!err.message.is_empty());
    }
}
