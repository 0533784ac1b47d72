//! Prompt text for whole-file rewrites.

use std::fmt::Write;

use crate::scanner::StringHit;

/// Role instruction sent alongside every rewrite prompt.
pub const SYSTEM_INSTRUCTION: &str = "You are a code transformation assistant that updates \
React components to use translation function calls instead of hardcoded strings.";

const RESPONSE_CONTRACT: &str = r#"Return your response as strict JSON with this shape, and nothing else. CRITICAL REQUIREMENTS:
- Return ONLY valid JSON, no comments, no trailing commas, no extra text before or after the JSON object
- The "fileContent" value must be a single string with ALL newlines escaped as \n (do not use literal newline characters inside the JSON string)
- Ensure proper JSON escaping: quotes inside strings must be escaped as \"
- No trailing commas before } or ]

Expected JSON format:
{
  "fileContent": "<the full updated file text, with \n for newlines>",
  "messages": {
    "common.keyOne": "Original text one",
    "common.keyTwo": "Original text two"
  }
}"#;

/// Inputs for one file's rewrite prompt.
pub struct TransformRequest<'a> {
    pub relative_path: &'a str,
    pub code: &'a str,
    pub hits: &'a [StringHit],
    /// Framework-specific task bullets, each already formatted as list items.
    pub instructions: &'a [String],
}

/// Formats a hit as `- line:column [Type:attr] "value"`.
pub fn format_hit(hit: &StringHit) -> String {
    let attribute = hit
        .attribute_name
        .as_deref()
        .map(|name| format!(":{}", name))
        .unwrap_or_default();
    format!(
        "- {}:{} [{}{}] \"{}\"",
        hit.line,
        hit.column,
        hit.kind.as_str(),
        attribute,
        hit.value
    )
}

pub fn build_transform_prompt(request: &TransformRequest<'_>) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are given a TypeScript/TSX or JavaScript/JSX file from a web project.\n"
    );
    let _ = writeln!(prompt, "Your task:");
    for instruction in request.instructions {
        let _ = writeln!(prompt, "{}", instruction);
    }
    let _ = writeln!(prompt, "\n{}\n", RESPONSE_CONTRACT);
    let _ = writeln!(prompt, "File path: {}\n", request.relative_path);
    let _ = writeln!(prompt, "Original file contents:\n----------------");
    let _ = writeln!(prompt, "{}", request.code);
    let _ = writeln!(prompt, "----------------\n");
    let _ = writeln!(prompt, "Hardcoded string hits (line:column - text):");
    let hits: Vec<String> = request.hits.iter().map(format_hit).collect();
    prompt.push_str(&hits.join("\n"));
    prompt.push('\n');
    prompt
}
