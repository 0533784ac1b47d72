//! Hardcoded UI string detection.
//!
//! Source files are parsed with a [`SourceParser`] into a [`SyntaxTree`], then
//! walked with an ancestor stack. A literal becomes a [`StringHit`] when it
//! is markup text, a string value of a user-visible attribute, or any other
//! string literal, provided it is not already passed to the translation
//! function and its trimmed text is worth translating.

mod files;
mod parser;
mod syntax;
mod visit;

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use files::{discover_source_files, SourceFilter};
pub use parser::{decode_entities, ParseError, Parser, TolerantParser};
pub use syntax::{Attribute, AttributeItem, AttributeValue, Element, Node, Position, SyntaxTree};
pub use visit::{walk, Ancestor, Visitor};

/// Attributes whose string values are shown to users.
pub const DEFAULT_TRANSLATABLE_ATTRIBUTES: &[&str] = &["alt", "placeholder", "title", "aria-label"];

static RE_NUMERIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9\s]+$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringHitKind {
    #[serde(rename = "JSXText")]
    JsxText,
    #[serde(rename = "JSXAttribute")]
    JsxAttribute,
    #[serde(rename = "StringLiteral")]
    StringLiteral,
}

impl StringHitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringHitKind::JsxText => "JSXText",
            StringHitKind::JsxAttribute => "JSXAttribute",
            StringHitKind::StringLiteral => "StringLiteral",
        }
    }
}

/// A literal that should be moved into the message catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringHit {
    /// Trimmed literal text.
    pub value: String,
    /// 1-based line.
    pub line: usize,
    /// 0-based column.
    pub column: usize,
    #[serde(rename = "type")]
    pub kind: StringHitKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
}

/// Which syntax extensions a file is parsed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    pub jsx: bool,
    pub typescript: bool,
}

impl ParseOptions {
    pub fn tsx() -> Self {
        Self {
            jsx: true,
            typescript: true,
        }
    }

    /// Markup is enabled for every script extension except `.ts`, where
    /// `<T>x` is a type assertion.
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        Self {
            jsx: ext != "ts" && ext != "mts" && ext != "cts",
            typescript: matches!(ext.as_str(), "ts" | "tsx" | "mts" | "cts"),
        }
    }
}

/// Turns source text into a syntax tree.
pub trait SourceParser: Send + Sync {
    fn parse(&self, source: &str, options: ParseOptions) -> Result<SyntaxTree, ParseError>;
}

/// What counts as a translatable literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitRules {
    /// Callee whose arguments are already translated, e.g. `t`.
    pub translation_fn: String,
    pub attributes: Vec<String>,
}

impl Default for HitRules {
    fn default() -> Self {
        Self {
            translation_fn: "t".to_string(),
            attributes: DEFAULT_TRANSLATABLE_ATTRIBUTES
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }
}

/// Returns the trimmed text if it is worth translating.
pub fn translatable_text(raw: &str) -> Option<&str> {
    let text = raw.trim();
    if text.chars().nth(1).is_none() || RE_NUMERIC.is_match(text) {
        None
    } else {
        Some(text)
    }
}

struct HitCollector<'r> {
    rules: &'r HitRules,
    hits: Vec<StringHit>,
}

impl HitCollector<'_> {
    fn inside_translation_call(&self, ancestors: &[Ancestor<'_>]) -> bool {
        ancestors
            .iter()
            .any(|a| matches!(a, Ancestor::Call(callee) if *callee == self.rules.translation_fn))
    }

    fn push(&mut self, text: &str, pos: Position, kind: StringHitKind, attribute_name: Option<&str>) {
        self.hits.push(StringHit {
            value: text.to_string(),
            line: pos.line as usize,
            column: pos.column as usize,
            kind,
            attribute_name: attribute_name.map(str::to_string),
        });
    }
}

impl<'ast> Visitor<'ast> for HitCollector<'_> {
    fn visit_text(&mut self, value: &'ast str, pos: Position, ancestors: &[Ancestor<'ast>]) {
        if self.inside_translation_call(ancestors) {
            return;
        }
        if let Some(text) = translatable_text(value) {
            self.push(text, pos, StringHitKind::JsxText, None);
        }
    }

    fn visit_string(&mut self, value: &'ast str, pos: Position, ancestors: &[Ancestor<'ast>]) {
        if self.inside_translation_call(ancestors) {
            return;
        }
        if let Some(text) = translatable_text(value) {
            self.push(text, pos, StringHitKind::StringLiteral, None);
        }
    }

    fn visit_attribute(&mut self, attribute: &'ast Attribute, ancestors: &[Ancestor<'ast>]) {
        let Some(AttributeValue::String { value, pos }) = &attribute.value else {
            return;
        };
        if !self.rules.attributes.iter().any(|a| *a == attribute.name)
            || self.inside_translation_call(ancestors)
        {
            return;
        }
        if let Some(text) = translatable_text(value) {
            self.push(text, *pos, StringHitKind::JsxAttribute, Some(&attribute.name));
        }
    }
}

/// Collects hits from a parsed tree in source order.
pub fn find_hits(tree: &SyntaxTree, rules: &HitRules) -> Vec<StringHit> {
    let mut collector = HitCollector {
        rules,
        hits: Vec::new(),
    };
    walk(&tree.nodes, &mut collector);
    collector.hits
}

/// Parses `source` (options picked from `path`) and collects its hits.
pub fn scan_source(
    parser: &dyn SourceParser,
    path: &Path,
    source: &str,
    rules: &HitRules,
) -> Result<Vec<StringHit>, ParseError> {
    let tree = parser.parse(source, ParseOptions::for_path(path))?;
    Ok(find_hits(&tree, rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> Vec<StringHit> {
        scan_source(&TolerantParser, Path::new("app/page.tsx"), src, &HitRules::default())
            .unwrap()
    }

    fn values(hits: &[StringHit]) -> Vec<&str> {
        hits.iter().map(|h| h.value.as_str()).collect()
    }

    // ── Filters ──

    #[test]
    fn test_translatable_text_filters() {
        assert_eq!(translatable_text("  Hello  "), Some("Hello"));
        assert_eq!(translatable_text("   "), None);
        assert_eq!(translatable_text(" x "), None);
        assert_eq!(translatable_text("42"), None);
        assert_eq!(translatable_text("1 000"), None);
        assert_eq!(translatable_text("v2"), Some("v2"));
        assert_eq!(translatable_text("é!"), Some("é!"));
    }

    // ── Hits ──

    #[test]
    fn test_page_hits_in_source_order() {
        let hits = scan(
            r#"export default function Page() {
  return (
    <main>
      <h1>Welcome to our app</h1>
      <input placeholder="Search" className="w-full" />
      <img alt="Company logo" src="/logo.png" />
      <p>{count} items</p>
    </main>
  );
}"#,
        );
        assert_eq!(
            values(&hits),
            vec!["Welcome to our app", "Search", "Company logo", "items"]
        );
        assert_eq!(hits[0].kind, StringHitKind::JsxText);
        assert_eq!((hits[0].line, hits[0].column), (4, 10));
        assert_eq!(hits[1].kind, StringHitKind::JsxAttribute);
        assert_eq!(hits[1].attribute_name.as_deref(), Some("placeholder"));
        assert_eq!(hits[2].attribute_name.as_deref(), Some("alt"));
    }

    #[test]
    fn test_translation_calls_excluded() {
        let hits = scan(
            r#"const a = t("Already done");
const b = t(cond ? "Also done" : `x${"nested too"}`);
const c = i18n.t("Member call is not excluded");
const d = notT("Other call");
const e = <p title={t("skip")}>Keep me</p>;"#,
        );
        assert_eq!(
            values(&hits),
            vec!["Member call is not excluded", "Other call", "Keep me"]
        );
    }

    #[test]
    fn test_custom_translation_function() {
        let rules = HitRules {
            translation_fn: "translate".to_string(),
            ..HitRules::default()
        };
        let hits = scan_source(
            &TolerantParser,
            Path::new("lib/copy.ts"),
            r#"const a = translate("done"); const b = t("not excluded");"#,
            &rules,
        )
        .unwrap();
        assert_eq!(values(&hits), vec!["not excluded"]);
    }

    #[test]
    fn test_short_and_numeric_values_excluded() {
        let hits = scan(r#"const x = <div>  {"a"} 123 <span title="1">-</span></div>;"#);
        assert!(hits.is_empty(), "unexpected hits: {:?}", hits);
    }

    #[test]
    fn test_attribute_string_reported_once() {
        let hits = scan(r#"const x = <img alt="Profile photo" />;"#);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, StringHitKind::JsxAttribute);
    }

    #[test]
    fn test_expression_attribute_string_is_literal() {
        let hits = scan(r#"const x = <img alt={"Profile photo"} />;"#);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, StringHitKind::StringLiteral);
    }

    #[test]
    fn test_generic_arrow_functions_in_tsx() {
        let hits = scan(
            r#"const first = <T,>(x: T) => x;
const second = <T extends unknown>(x: T) => x;
export default function Page() {
  return <p title="Greeting">Hello there</p>;
}"#,
        );
        assert_eq!(values(&hits), vec!["Greeting", "Hello there"]);
        assert_eq!(hits[1].line, 4);
    }

    #[test]
    fn test_parse_error_propagates() {
        let err = scan_source(
            &TolerantParser,
            Path::new("app/page.tsx"),
            "const x = <div>",
            &HitRules::default(),
        )
        .unwrap_err();
        assert!(err.message.contains("Unterminated"));
    }

    // ── Serialization ──

    #[test]
    fn test_hit_serializes_with_type_tag() {
        let hit = StringHit {
            value: "Search".to_string(),
            line: 3,
            column: 7,
            kind: StringHitKind::JsxAttribute,
            attribute_name: Some("placeholder".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&hit).unwrap(),
            serde_json::json!({
                "value": "Search",
                "line": 3,
                "column": 7,
                "type": "JSXAttribute",
                "attributeName": "placeholder"
            })
        );

        let text = StringHit {
            kind: StringHitKind::JsxText,
            attribute_name: None,
            ..hit
        };
        assert!(serde_json::to_value(&text)
            .unwrap()
            .get("attributeName")
            .is_none());
    }

    #[test]
    fn test_parse_options_for_path() {
        assert!(ParseOptions::for_path(Path::new("a.tsx")).jsx);
        assert!(ParseOptions::for_path(Path::new("a.jsx")).jsx);
        assert!(ParseOptions::for_path(Path::new("a.js")).jsx);
        assert!(!ParseOptions::for_path(Path::new("a.ts")).jsx);
        assert!(!ParseOptions::for_path(Path::new("a.js")).typescript);
    }
}
