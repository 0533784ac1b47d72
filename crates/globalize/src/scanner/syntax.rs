//! Syntax tree produced by the tolerant parser.
//!
//! The tree keeps only what literal scanning needs: markup structure,
//! literal text with positions, and call sites with bare-identifier callees.
//! Everything else in the source is skipped.

/// 1-based line, 0-based column (in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    /// Raw text between markup tags, entities decoded.
    Text { value: String, pos: Position },
    /// `{ ... }` inside markup.
    Expression(Vec<Node>),
    StringLiteral { value: String, pos: Position },
    /// Template literal; only the `${}` expressions are kept.
    Template { expressions: Vec<Vec<Node>> },
    /// Call whose callee is a bare identifier, e.g. `t(...)`.
    Call { callee: String, arguments: Vec<Node> },
    /// Any other bracketed region: `( )`, `[ ]`, `{ }`.
    Group(Vec<Node>),
}

/// Markup element; `name` is `None` for fragments.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: Option<String>,
    pub attributes: Vec<AttributeItem>,
    pub children: Vec<Node>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeItem {
    Named(Attribute),
    /// `{...props}`
    Spread(Vec<Node>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: Option<AttributeValue>,
    pub pos: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    String { value: String, pos: Position },
    Expression(Vec<Node>),
    Element(Box<Element>),
}

/// Parsed source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyntaxTree {
    pub nodes: Vec<Node>,
}
