//! JSONPath-style locators over JSON listings
//!
//! Supported syntax: root `$`, child `.name` / `['name']`, wildcard `*`,
//! index `[n]`, recursive descent `..`, and filters `[?(...)]` with field
//! existence, comparison (`==`, `!=`, `<`, `<=`, `>`, `>=`), regex match
//! (`=~ /re/i`, whole-value), `&&`, `||`, `!` and parentheses.
//!
//! A filter applied to an array keeps the matching elements. Applied to an
//! object it tests the object itself, so a filter written for listing entries
//! also works when evaluated against a single entry.

use super::{is_name_char, locator_error, read_quoted};
use crate::LocatorError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Segment {
    Child(String),
    Wildcard,
    Index(i64),
    Descend,
    Filter(Filter),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
enum Literal {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
}

#[derive(Debug, Clone)]
enum Filter {
    Or(Vec<Filter>),
    And(Vec<Filter>),
    Not(Box<Filter>),
    Exists(Vec<String>),
    Compare {
        field: Vec<String>,
        op: CompareOp,
        value: Literal,
    },
    Matches {
        field: Vec<String>,
        pattern: Regex,
    },
}

impl Filter {
    fn accepts(&self, candidate: &Value) -> bool {
        match self {
            Filter::Or(terms) => terms.iter().any(|term| term.accepts(candidate)),
            Filter::And(terms) => terms.iter().all(|term| term.accepts(candidate)),
            Filter::Not(inner) => !inner.accepts(candidate),
            Filter::Exists(field) => resolve(candidate, field).is_some(),
            Filter::Compare { field, op, value } => resolve(candidate, field)
                .map(|actual| compare(actual, *op, value))
                .unwrap_or(false),
            Filter::Matches { field, pattern } => resolve(candidate, field)
                .map(|actual| pattern.is_match(&render(actual)))
                .unwrap_or(false),
        }
    }
}

fn resolve<'v>(candidate: &'v Value, field: &[String]) -> Option<&'v Value> {
    field
        .iter()
        .try_fold(candidate, |value, key| value.get(key.as_str()))
}

fn compare(actual: &Value, op: CompareOp, expected: &Literal) -> bool {
    let ordering = match (actual, expected) {
        (Value::String(a), Literal::Str(b)) => a.as_str().partial_cmp(b.as_str()),
        (Value::Number(a), Literal::Num(b)) => a.as_f64().and_then(|a| a.partial_cmp(b)),
        (Value::Bool(a), Literal::Bool(b)) => a.partial_cmp(b),
        (Value::Null, Literal::Null) => Some(std::cmp::Ordering::Equal),
        _ => None,
    };

    match (op, ordering) {
        (CompareOp::Ne, None) => true,
        (_, None) => false,
        (CompareOp::Eq, Some(o)) => o.is_eq(),
        (CompareOp::Ne, Some(o)) => o.is_ne(),
        (CompareOp::Lt, Some(o)) => o.is_lt(),
        (CompareOp::Le, Some(o)) => o.is_le(),
        (CompareOp::Gt, Some(o)) => o.is_gt(),
        (CompareOp::Ge, Some(o)) => o.is_ge(),
    }
}

/// Renders a matched value as text: strings unquoted, everything else as JSON
fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// A compiled JSONPath-style locator
#[derive(Debug, Clone)]
pub struct JsonLocator {
    expression: String,
    segments: Vec<Segment>,
}

impl JsonLocator {
    /// Compiles an expression
    ///
    /// # Example
    ///
    /// ```
    /// use nar_harvest::locator::JsonLocator;
    /// use serde_json::json;
    ///
    /// let entries = JsonLocator::compile("$[?(@.type)]").unwrap();
    /// let listing = json!([{"name": "Parent Directory"}, {"name": "a.nar", "type": "blob"}]);
    /// assert_eq!(entries.select(&listing).len(), 1);
    /// ```
    pub fn compile(expression: &str) -> Result<Self, LocatorError> {
        let segments = SegmentParser {
            src: expression,
            pos: 0,
        }
        .parse()?;
        Ok(Self {
            expression: expression.to_string(),
            segments,
        })
    }

    /// The source text of this locator
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Selects every value matched by the path, in document order
    pub fn select<'v>(&self, root: &'v Value) -> Vec<&'v Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                apply(segment, value, &mut next);
            }
            let mut seen = HashSet::new();
            next.retain(|value| seen.insert(*value as *const Value));
            current = next;
        }
        current
    }

    /// Evaluates the locator to the text of its first match
    pub fn evaluate(&self, root: &Value) -> Option<String> {
        self.select(root).first().map(|value| render(value))
    }
}

fn apply<'v>(segment: &Segment, value: &'v Value, out: &mut Vec<&'v Value>) {
    match segment {
        Segment::Child(name) => out.extend(value.as_object().and_then(|object| object.get(name))),
        Segment::Wildcard => match value {
            Value::Object(object) => out.extend(object.values()),
            Value::Array(items) => out.extend(items.iter()),
            _ => {}
        },
        Segment::Index(index) => {
            if let Value::Array(items) = value {
                let resolved = if *index < 0 {
                    items.len().checked_sub(index.unsigned_abs() as usize)
                } else {
                    Some(*index as usize)
                };
                out.extend(resolved.and_then(|i| items.get(i)));
            }
        }
        Segment::Descend => descendants_or_self(value, out),
        Segment::Filter(filter) => match value {
            Value::Array(items) => out.extend(items.iter().filter(|item| filter.accepts(item))),
            Value::Object(_) if filter.accepts(value) => out.push(value),
            _ => {}
        },
    }
}

fn descendants_or_self<'v>(value: &'v Value, out: &mut Vec<&'v Value>) {
    out.push(value);
    match value {
        Value::Object(object) => object.values().for_each(|child| descendants_or_self(child, out)),
        Value::Array(items) => items.iter().for_each(|child| descendants_or_self(child, out)),
        _ => {}
    }
}

struct SegmentParser<'e> {
    src: &'e str,
    pos: usize,
}

impl<'e> SegmentParser<'e> {
    fn error(&self, message: impl Into<String>) -> LocatorError {
        locator_error(self.src, self.pos, message)
    }

    fn rest(&self) -> &'e str {
        &self.src[self.pos..]
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, LocatorError> {
        if !self.eat("$") {
            return Err(self.error("expression must start with '$'"));
        }

        let mut segments = Vec::new();
        while !self.rest().trim().is_empty() {
            if self.eat("..") {
                segments.push(Segment::Descend);
                segments.push(self.selector_after_dot()?);
            } else if self.eat(".") {
                // `$.[...]` is read as `$[...]`
                if !self.rest().starts_with('[') {
                    segments.push(self.selector_after_dot()?);
                }
            } else if self.rest().starts_with('[') {
                segments.push(self.bracket()?);
            } else {
                return Err(self.error("expected '.', '..' or '['"));
            }
        }
        Ok(segments)
    }

    fn selector_after_dot(&mut self) -> Result<Segment, LocatorError> {
        if self.eat("*") {
            return Ok(Segment::Wildcard);
        }
        if self.rest().starts_with('[') {
            return self.bracket();
        }
        Ok(Segment::Child(self.name()?))
    }

    fn name(&mut self) -> Result<String, LocatorError> {
        let length: usize = self
            .rest()
            .chars()
            .take_while(|c| is_name_char(*c) || *c == '$')
            .map(char::len_utf8)
            .sum();
        if length == 0 {
            return Err(self.error("expected field name"));
        }
        let name = self.rest()[..length].to_string();
        self.pos += length;
        Ok(name)
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn bracket(&mut self) -> Result<Segment, LocatorError> {
        self.eat("[");
        self.skip_whitespace();

        let segment = if self.rest().starts_with(['\'', '"']) {
            let (name, end) = read_quoted(self.src, self.pos)?;
            self.pos = end;
            Segment::Child(name)
        } else if self.eat("*") {
            Segment::Wildcard
        } else if self.eat("?(") {
            let (tokens, end) = FilterLexer {
                src: self.src,
                pos: self.pos,
            }
            .lex()?;
            self.pos = end;
            Segment::Filter(FilterParser::new(self.src, end, tokens).parse()?)
        } else {
            let length = self
                .rest()
                .char_indices()
                .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
                .count();
            let index = self.rest()[..length]
                .parse()
                .map_err(|_| self.error("expected name, '*', index or filter"))?;
            self.pos += length;
            Segment::Index(index)
        };

        self.skip_whitespace();
        if !self.eat("]") {
            return Err(self.error("expected ']'"));
        }
        Ok(segment)
    }
}

#[derive(Debug, Clone)]
enum Token {
    Field(Vec<String>),
    Literal(Literal),
    Pattern(Regex),
    Compare(CompareOp),
    MatchOp,
    And,
    Or,
    Not,
    Open,
    Close,
}

struct FilterLexer<'e> {
    src: &'e str,
    pos: usize,
}

impl<'e> FilterLexer<'e> {
    fn error(&self, message: impl Into<String>) -> LocatorError {
        locator_error(self.src, self.pos, message)
    }

    fn rest(&self) -> &'e str {
        &self.src[self.pos..]
    }

    /// Tokenizes up to the `)` closing the filter; returns the offset past it
    fn lex(mut self) -> Result<(Vec<(usize, Token)>, usize), LocatorError> {
        const OPERATORS: [(&str, Option<CompareOp>); 7] = [
            ("==", Some(CompareOp::Eq)),
            ("!=", Some(CompareOp::Ne)),
            ("<=", Some(CompareOp::Le)),
            (">=", Some(CompareOp::Ge)),
            ("=~", None),
            ("<", Some(CompareOp::Lt)),
            (">", Some(CompareOp::Gt)),
        ];

        let mut tokens: Vec<(usize, Token)> = Vec::new();
        let mut depth = 0usize;

        loop {
            let trimmed = self.rest().trim_start();
            self.pos = self.src.len() - trimmed.len();
            let start = self.pos;
            let rest = self.rest();
            let Some(c) = rest.chars().next() else {
                return Err(self.error("unterminated filter"));
            };

            if c == ')' {
                self.pos += 1;
                if depth == 0 {
                    return Ok((tokens, self.pos));
                }
                depth -= 1;
                tokens.push((start, Token::Close));
            } else if c == '(' {
                self.pos += 1;
                depth += 1;
                tokens.push((start, Token::Open));
            } else if c == '@' {
                self.pos += 1;
                let field = self.field()?;
                tokens.push((start, Token::Field(field)));
            } else if c == '\'' || c == '"' {
                let (literal, end) = read_quoted(self.src, self.pos)?;
                self.pos = end;
                tokens.push((start, Token::Literal(Literal::Str(literal))));
            } else if c == '/' && matches!(tokens.last(), Some((_, Token::MatchOp))) {
                let pattern = self.pattern()?;
                tokens.push((start, Token::Pattern(pattern)));
            } else if rest.starts_with("&&") {
                self.pos += 2;
                tokens.push((start, Token::And));
            } else if rest.starts_with("||") {
                self.pos += 2;
                tokens.push((start, Token::Or));
            } else if let Some((token, op)) = OPERATORS.iter().find(|(token, _)| rest.starts_with(token)) {
                self.pos += token.len();
                tokens.push((start, op.map(Token::Compare).unwrap_or(Token::MatchOp)));
            } else if c == '!' {
                self.pos += 1;
                tokens.push((start, Token::Not));
            } else if c.is_ascii_digit() || c == '-' {
                let length = rest
                    .char_indices()
                    .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && *c == '-'))
                    .count();
                let number = rest[..length]
                    .parse()
                    .map_err(|_| self.error("invalid number"))?;
                self.pos += length;
                tokens.push((start, Token::Literal(Literal::Num(number))));
            } else if c.is_ascii_alphabetic() {
                let word: String = rest.chars().take_while(char::is_ascii_alphabetic).collect();
                let literal = match word.as_str() {
                    "true" => Literal::Bool(true),
                    "false" => Literal::Bool(false),
                    "null" => Literal::Null,
                    _ => return Err(self.error(format!("unknown word '{}'", word))),
                };
                self.pos += word.len();
                tokens.push((start, Token::Literal(literal)));
            } else {
                return Err(self.error(format!("unexpected character '{}'", c)));
            }
        }
    }

    fn field(&mut self) -> Result<Vec<String>, LocatorError> {
        let mut field = Vec::new();
        loop {
            if self.rest().starts_with('.') && !self.rest().starts_with("..") {
                self.pos += 1;
                let length: usize = self
                    .rest()
                    .chars()
                    .take_while(|c| is_name_char(*c))
                    .map(char::len_utf8)
                    .sum();
                if length == 0 {
                    return Err(self.error("expected field name"));
                }
                field.push(self.rest()[..length].to_string());
                self.pos += length;
            } else if self.rest().starts_with("['") || self.rest().starts_with("[\"") {
                let (name, end) = read_quoted(self.src, self.pos + 1)?;
                if !self.src[end..].starts_with(']') {
                    return Err(self.error("expected ']'"));
                }
                field.push(name);
                self.pos = end + 1;
            } else {
                return Ok(field);
            }
        }
    }

    fn pattern(&mut self) -> Result<Regex, LocatorError> {
        let start = self.pos;
        let body_start = start + 1;
        let mut escaped = false;
        let mut body_end = None;
        for (index, c) in self.src[body_start..].char_indices() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '/' {
                body_end = Some(body_start + index);
                break;
            }
        }
        let body_end = body_end.ok_or_else(|| self.error("unterminated regular expression"))?;
        let body = self.src[body_start..body_end].replace("\\/", "/");

        self.pos = body_end + 1;
        let flags: String = self
            .rest()
            .chars()
            .take_while(|c| matches!(c, 'i' | 'm' | 's' | 'x'))
            .collect();
        self.pos += flags.len();

        let source = if flags.is_empty() {
            format!("^(?:{})$", body)
        } else {
            format!("(?{})^(?:{})$", flags, body)
        };
        Regex::new(&source).map_err(|e| locator_error(self.src, start, e.to_string()))
    }
}

struct FilterParser<'e> {
    src: &'e str,
    end: usize,
    tokens: Vec<(usize, Token)>,
    index: usize,
}

impl<'e> FilterParser<'e> {
    fn new(src: &'e str, end: usize, tokens: Vec<(usize, Token)>) -> Self {
        Self {
            src,
            end,
            tokens,
            index: 0,
        }
    }

    fn error(&self, message: &str) -> LocatorError {
        let offset = self
            .tokens
            .get(self.index)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.end);
        locator_error(self.src, offset, message)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.index).map(|(_, token)| token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.index).map(|(_, token)| token.clone());
        self.index += 1;
        token
    }

    fn parse(mut self) -> Result<Filter, LocatorError> {
        let filter = self.or()?;
        if self.peek().is_some() {
            return Err(self.error("unexpected token in filter"));
        }
        Ok(filter)
    }

    fn or(&mut self) -> Result<Filter, LocatorError> {
        let mut terms = vec![self.and()?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.index += 1;
            terms.push(self.and()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::Or(terms)
        })
    }

    fn and(&mut self) -> Result<Filter, LocatorError> {
        let mut terms = vec![self.atom()?];
        while matches!(self.peek(), Some(Token::And)) {
            self.index += 1;
            terms.push(self.atom()?);
        }
        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            Filter::And(terms)
        })
    }

    fn atom(&mut self) -> Result<Filter, LocatorError> {
        match self.next() {
            Some(Token::Not) => Ok(Filter::Not(Box::new(self.atom()?))),
            Some(Token::Open) => {
                let inner = self.or()?;
                match self.next() {
                    Some(Token::Close) => Ok(inner),
                    _ => Err(self.error("expected ')'")),
                }
            }
            Some(Token::Field(field)) => match self.peek() {
                Some(Token::Compare(op)) => {
                    let op = *op;
                    self.index += 1;
                    match self.next() {
                        Some(Token::Literal(value)) => Ok(Filter::Compare { field, op, value }),
                        _ => Err(self.error("expected literal after comparison")),
                    }
                }
                Some(Token::MatchOp) => {
                    self.index += 1;
                    match self.next() {
                        Some(Token::Pattern(pattern)) => Ok(Filter::Matches { field, pattern }),
                        _ => Err(self.error("expected /pattern/ after '=~'")),
                    }
                }
                _ => Ok(Filter::Exists(field)),
            },
            _ => {
                self.index = self.index.saturating_sub(1);
                Err(self.error("expected '@' field, '!' or '('"))
            }
        }
    }
}
