//! Tolerant JSX/TypeScript parser.
//!
//! This is not a full ECMAScript parser. It tokenizes just enough to tell
//! markup from comparisons and regexes from division, reads string and
//! template literals with their escapes, and records bracket structure and
//! bare-identifier calls. Type annotations, operators and statements are
//! skipped. Unbalanced brackets, unterminated literals and malformed markup
//! are reported as [`ParseError`].

use thiserror::Error;

use super::syntax::{
    Attribute, AttributeItem, AttributeValue, Element, Node, Position, SyntaxTree,
};
use super::{ParseOptions, SourceParser};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} ({line}:{column})")]
pub struct ParseError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}

/// Keywords after which an expression (and so markup or a regex) may start.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case",
    "do", "else", "yield", "await", "default", "extends",
];

/// Identifiers whose string argument or operand is a module path.
const MODULE_KEYWORDS: &[&str] = &["import", "from"];

const DIRECTIVES: &[&str] = &["use client", "use server", "use strict"];

/// Deepest bracket, template or markup nesting accepted before giving up.
const MAX_DEPTH: usize = 256;

/// [`SourceParser`] backed by [`Parser`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TolerantParser;

impl SourceParser for TolerantParser {
    fn parse(&self, source: &str, options: ParseOptions) -> Result<SyntaxTree, ParseError> {
        Parser::new(source, options).parse_program()
    }
}

/// Class of the last significant token.
#[derive(Debug, Clone, PartialEq)]
enum Prev {
    Start,
    Punct(char),
    Word(String),
    Value,
    Dot,
}

pub struct Parser {
    src: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    prev: Prev,
    depth: usize,
    options: ParseOptions,
}

impl Parser {
    pub fn new(source: &str, options: ParseOptions) -> Self {
        Self {
            src: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 0,
            prev: Prev::Start,
            depth: 0,
            options,
        }
    }

    pub fn parse_program(mut self) -> Result<SyntaxTree, ParseError> {
        if self.peek() == Some('#') && self.peek_at(1) == Some('!') {
            while let Some(c) = self.peek() {
                if c == '\n' {
                    break;
                }
                self.bump();
            }
        }
        let nodes = self.parse_items(None)?;
        Ok(SyntaxTree { nodes })
    }

    // ── Cursor ──

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            line: self.line,
            column: self.column,
        }
    }

    /// Runs `f` one nesting level deeper.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("Nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn expect(&mut self, expected: char) -> Result<(), ParseError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => Err(self.error(format!("Expected '{}', found '{}'", expected, c))),
            None => Err(self.error(format!("Expected '{}', found end of file", expected))),
        }
    }

    /// Skips whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.error("Unterminated comment")),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn expression_allowed(&self) -> bool {
        match &self.prev {
            Prev::Start | Prev::Punct(_) => true,
            Prev::Word(w) => EXPRESSION_KEYWORDS.contains(&w.as_str()),
            Prev::Value | Prev::Dot => false,
        }
    }

    // ── Code ──

    /// Parses until the matching `close` bracket (consumed) or end of file.
    fn parse_items(&mut self, close: Option<char>) -> Result<Vec<Node>, ParseError> {
        let mut nodes = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(c) = self.peek() else {
                return match close {
                    Some(close) => Err(self.error(format!("Expected '{}' before end of file", close))),
                    None => Ok(nodes),
                };
            };

            match c {
                ')' | ']' | '}' => {
                    if Some(c) != close {
                        return Err(self.error(format!("Unexpected '{}'", c)));
                    }
                    self.bump();
                    self.prev = if c == '}' { Prev::Punct('}') } else { Prev::Value };
                    return Ok(nodes);
                }
                '(' | '[' | '{' => {
                    self.bump();
                    self.prev = Prev::Punct(c);
                    let inner = self.nested(|p| p.parse_items(Some(closing(c))))?;
                    nodes.push(Node::Group(inner));
                }
                '\'' | '"' => {
                    let statement_start = self.depth == 0
                        && matches!(self.prev, Prev::Start | Prev::Punct(';'));
                    let module_path = matches!(&self.prev, Prev::Word(w) if MODULE_KEYWORDS.contains(&w.as_str()));
                    let pos = self.position();
                    let value = self.read_string(c)?;
                    self.prev = Prev::Value;
                    let directive = statement_start && DIRECTIVES.contains(&value.as_str());
                    if !module_path && !directive {
                        nodes.push(Node::StringLiteral { value, pos });
                    }
                }
                '`' => {
                    let expressions = self.parse_template()?;
                    self.prev = Prev::Value;
                    nodes.push(Node::Template { expressions });
                }
                '/' => {
                    if self.expression_allowed() {
                        self.skip_regex()?;
                        self.prev = Prev::Value;
                    } else {
                        self.bump();
                        self.prev = Prev::Punct('/');
                    }
                }
                '<' if self.options.typescript
                    && self.expression_allowed()
                    && self.type_parameters_ahead() =>
                {
                    self.skip_type_parameters()?;
                    self.prev = Prev::Value;
                }
                '<' if self.options.jsx && self.expression_allowed() && self.starts_markup() => {
                    let element = self.parse_element()?;
                    self.prev = Prev::Value;
                    nodes.push(Node::Element(element));
                }
                '.' => {
                    if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) {
                        self.skip_number();
                        self.prev = Prev::Value;
                    } else if self.peek_at(1) == Some('.') && self.peek_at(2) == Some('.') {
                        self.bump();
                        self.bump();
                        self.bump();
                        self.prev = Prev::Punct('.');
                    } else {
                        self.bump();
                        self.prev = Prev::Dot;
                    }
                }
                '?' if self.peek_at(1) == Some('.')
                    && !self.peek_at(2).is_some_and(|d| d.is_ascii_digit()) =>
                {
                    self.bump();
                    self.bump();
                    self.prev = Prev::Dot;
                }
                c if c.is_ascii_digit() => {
                    self.skip_number();
                    self.prev = Prev::Value;
                }
                c if is_ident_start(c) || (c == '#' && self.peek_at(1).is_some_and(is_ident_start)) => {
                    self.parse_word(&mut nodes)?;
                }
                _ => {
                    self.bump();
                    self.prev = Prev::Punct(c);
                }
            }
        }
    }

    /// Identifier, keyword, or a call with a bare-identifier callee.
    fn parse_word(&mut self, nodes: &mut Vec<Node>) -> Result<(), ParseError> {
        let after_dot = self.prev == Prev::Dot;
        let mut word = String::new();
        if self.peek() == Some('#') {
            self.bump();
            word.push('#');
        }
        while let Some(c) = self.peek().filter(|&c| is_ident_part(c)) {
            word.push(c);
            self.bump();
        }

        if after_dot {
            self.prev = Prev::Value;
            return Ok(());
        }

        self.skip_trivia()?;
        if self.peek() != Some('(') || EXPRESSION_KEYWORDS.contains(&word.as_str()) {
            self.prev = Prev::Word(word);
            return Ok(());
        }

        self.bump();
        self.prev = Prev::Punct('(');
        let mut arguments = self.nested(|p| p.parse_items(Some(')')))?;
        if word == "import" || word == "require" {
            arguments.retain(|n| !matches!(n, Node::StringLiteral { .. }));
        }
        nodes.push(Node::Call {
            callee: word,
            arguments,
        });
        self.prev = Prev::Value;
        Ok(())
    }

    fn skip_number(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn skip_regex(&mut self) -> Result<(), ParseError> {
        self.bump();
        let mut in_class = false;
        loop {
            match self.bump() {
                Some('\\') => {
                    self.bump();
                }
                Some('[') => in_class = true,
                Some(']') => in_class = false,
                Some('/') if !in_class => break,
                Some('\n') | None => return Err(self.error("Unterminated regular expression")),
                Some(_) => {}
            }
        }
        while self.peek().is_some_and(is_ident_part) {
            self.bump();
        }
        Ok(())
    }

    /// Reads a quoted string literal and decodes its escapes.
    fn read_string(&mut self, quote: char) -> Result<String, ParseError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.bump() {
                Some(c) if c == quote => return Ok(value),
                Some('\\') => self.read_escape(&mut value)?,
                Some('\n') | None => return Err(self.error("Unterminated string literal")),
                Some(c) => value.push(c),
            }
        }
    }

    fn read_escape(&mut self, out: &mut String) -> Result<(), ParseError> {
        let Some(c) = self.bump() else {
            return Err(self.error("Unterminated escape sequence"));
        };
        match c {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek().is_some_and(|d| d.is_ascii_digit()) => out.push('\0'),
            '\r' => {
                if self.peek() == Some('\n') {
                    self.bump();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            'x' => {
                let code = self.read_hex(2)?;
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            'u' => {
                let code = if self.peek() == Some('{') {
                    self.bump();
                    let mut code = 0u32;
                    loop {
                        match self.bump() {
                            Some('}') => break,
                            Some(h) if h.is_ascii_hexdigit() => {
                                code = code.saturating_mul(16).saturating_add(h.to_digit(16).unwrap_or(0));
                            }
                            _ => return Err(self.error("Invalid unicode escape")),
                        }
                    }
                    code
                } else {
                    self.read_hex(4)?
                };
                out.push(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER));
            }
            other => out.push(other),
        }
        Ok(())
    }

    fn read_hex(&mut self, digits: usize) -> Result<u32, ParseError> {
        let mut code = 0u32;
        for _ in 0..digits {
            match self.bump().and_then(|h| h.to_digit(16)) {
                Some(d) => code = code * 16 + d,
                None => return Err(self.error("Invalid hexadecimal escape")),
            }
        }
        Ok(code)
    }

    /// Skips a template literal, parsing each `${...}` substitution.
    fn parse_template(&mut self) -> Result<Vec<Vec<Node>>, ParseError> {
        self.bump();
        let mut expressions = Vec::new();
        loop {
            match self.peek() {
                None => return Err(self.error("Unterminated template literal")),
                Some('`') => {
                    self.bump();
                    return Ok(expressions);
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    self.prev = Prev::Punct('{');
                    expressions.push(self.nested(|p| p.parse_items(Some('}')))?);
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    /// `<T,` or `<T extends` opens the type parameters of a generic arrow.
    fn type_parameters_ahead(&self) -> bool {
        let at = |i: usize| self.src.get(i).copied();
        let mut i = self.pos + 1;
        while at(i).is_some_and(char::is_whitespace) {
            i += 1;
        }
        if !at(i).is_some_and(is_ident_start) {
            return false;
        }
        while at(i).is_some_and(is_ident_part) {
            i += 1;
        }
        while at(i).is_some_and(char::is_whitespace) {
            i += 1;
        }
        if at(i) == Some(',') {
            return true;
        }
        let keyword: Vec<char> = "extends".chars().collect();
        self.src[i..].starts_with(&keyword) && !at(i + keyword.len()).is_some_and(is_ident_part)
    }

    fn skip_type_parameters(&mut self) -> Result<(), ParseError> {
        let mut angles = 0usize;
        loop {
            self.skip_trivia()?;
            match self.peek() {
                None => return Err(self.error("Unterminated type parameter list")),
                Some('<') => {
                    self.bump();
                    angles += 1;
                }
                Some('>') => {
                    self.bump();
                    angles = angles.saturating_sub(1);
                    if angles == 0 {
                        return Ok(());
                    }
                }
                Some('=') if self.peek_at(1) == Some('>') => {
                    self.bump();
                    self.bump();
                }
                Some(quote @ ('\'' | '"' | '`')) => {
                    if quote == '`' {
                        self.parse_template()?;
                    } else {
                        self.read_string(quote)?;
                    }
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
    }

    // ── Markup ──

    /// `<` followed by a tag name or `>` (fragment).
    fn starts_markup(&self) -> bool {
        match self.peek_at(1) {
            Some('>') => true,
            Some(c) => is_ident_start(c),
            None => false,
        }
    }

    fn parse_element(&mut self) -> Result<Element, ParseError> {
        self.nested(Self::parse_element_body)
    }

    fn parse_element_body(&mut self) -> Result<Element, ParseError> {
        let pos = self.position();
        self.expect('<')?;
        self.skip_trivia()?;

        if self.peek() == Some('>') {
            self.bump();
            let children = self.parse_children(None)?;
            return Ok(Element {
                name: None,
                attributes: Vec::new(),
                children,
                pos,
            });
        }

        let name = self.read_markup_name();
        let mut attributes = Vec::new();
        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some('/') => {
                    self.bump();
                    self.skip_trivia()?;
                    self.expect('>')?;
                    return Ok(Element {
                        name: Some(name),
                        attributes,
                        children: Vec::new(),
                        pos,
                    });
                }
                Some('>') => {
                    self.bump();
                    let children = self.parse_children(Some(name.as_str()))?;
                    return Ok(Element {
                        name: Some(name),
                        attributes,
                        children,
                        pos,
                    });
                }
                Some('{') => {
                    self.bump();
                    self.prev = Prev::Punct('{');
                    let inner = self.parse_items(Some('}'))?;
                    attributes.push(AttributeItem::Spread(inner));
                }
                Some(c) if is_ident_start(c) => {
                    attributes.push(AttributeItem::Named(self.parse_attribute()?));
                }
                Some(c) => return Err(self.error(format!("Unexpected '{}' in tag <{}>", c, name))),
                None => return Err(self.error(format!("Unterminated tag <{}>", name))),
            }
        }
    }

    fn parse_attribute(&mut self) -> Result<Attribute, ParseError> {
        let pos = self.position();
        let name = self.read_markup_name();
        self.skip_trivia()?;
        if self.peek() != Some('=') {
            return Ok(Attribute {
                name,
                value: None,
                pos,
            });
        }
        self.bump();
        self.skip_trivia()?;

        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                let value_pos = self.position();
                self.bump();
                let mut raw = String::new();
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some(c) => raw.push(c),
                        None => return Err(self.error("Unterminated attribute value")),
                    }
                }
                AttributeValue::String {
                    value: decode_entities(&raw),
                    pos: value_pos,
                }
            }
            Some('{') => {
                self.bump();
                self.prev = Prev::Punct('{');
                AttributeValue::Expression(self.parse_items(Some('}'))?)
            }
            Some('<') => AttributeValue::Element(Box::new(self.parse_element()?)),
            _ => return Err(self.error(format!("Invalid value for attribute '{}'", name))),
        };

        Ok(Attribute {
            name,
            value: Some(value),
            pos,
        })
    }

    /// Parses children up to and including the closing tag for `name`.
    fn parse_children(&mut self, name: Option<&str>) -> Result<Vec<Node>, ParseError> {
        let mut children = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error(format!(
                        "Unterminated element <{}>",
                        name.unwrap_or_default()
                    )))
                }
                Some('<') => {
                    if self.closing_tag_ahead() {
                        self.parse_closing_tag(name)?;
                        return Ok(children);
                    }
                    self.prev = Prev::Punct('>');
                    children.push(Node::Element(self.parse_element()?));
                }
                Some('{') => {
                    self.bump();
                    self.prev = Prev::Punct('{');
                    children.push(Node::Expression(self.parse_items(Some('}'))?));
                }
                Some(_) => {
                    let pos = self.position();
                    let mut raw = String::new();
                    while let Some(c) = self.peek().filter(|&c| c != '<' && c != '{') {
                        raw.push(c);
                        self.bump();
                    }
                    children.push(Node::Text {
                        value: decode_entities(&raw),
                        pos,
                    });
                }
            }
        }
    }

    fn closing_tag_ahead(&self) -> bool {
        self.src[self.pos + 1..]
            .iter()
            .find(|c| !c.is_whitespace())
            .is_some_and(|&c| c == '/')
    }

    fn parse_closing_tag(&mut self, name: Option<&str>) -> Result<(), ParseError> {
        self.expect('<')?;
        self.skip_trivia()?;
        self.expect('/')?;
        self.skip_trivia()?;
        let closing = self.read_markup_name();
        self.skip_trivia()?;
        self.expect('>')?;
        let expected = name.unwrap_or_default();
        if closing != expected {
            return Err(self.error(format!(
                "Expected closing tag </{}>, found </{}>",
                expected, closing
            )));
        }
        Ok(())
    }

    fn read_markup_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self
            .peek()
            .filter(|&c| is_ident_part(c) || c == '.' || c == ':' || c == '-')
        {
            name.push(c);
            self.bump();
        }
        name
    }
}

fn closing(open: char) -> char {
    match open {
        '(' => ')',
        '[' => ']',
        _ => '}',
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Decodes the HTML entities that commonly appear in markup text.
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail
            .find(';')
            .filter(|&end| end <= 10)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "mdash" => '—',
        "ndash" => '–',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "middot" => '·',
        "bull" => '•',
        "times" => '×',
        "euro" => '€',
        _ => return None,
    })
}
