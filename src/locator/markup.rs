//! XPath-style locators over HTML listings
//!
//! Supported syntax:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `//tr`, `/html/body`, `./td`, `td` | descendant, absolute, relative child steps |
//! | `*`, `.` | any element, the context element |
//! | `[2]` | 1-based position among the step's matches under one parent |
//! | `[count(td)>2]` | child element count (`>`, `>=`, `<`, `<=`, `=`, `!=`) |
//! | `[contains(text(), '/')]`, `[starts-with(., 'x')]` | text tests |
//! | `[@href]`, `[@class='dir']` | attribute tests |
//! | `text()`, `@href` | final projection to text or attribute |

use super::{is_name_char, locator_error, read_quoted};
use crate::LocatorError;
use scraper::ElementRef;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    Any,
    Current,
}

impl NodeTest {
    fn matches(&self, element: &ElementRef<'_>) -> bool {
        match self {
            NodeTest::Name(name) => element.value().name().eq_ignore_ascii_case(name),
            NodeTest::Any | NodeTest::Current => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparison {
    /// Longest operators first so `>=` is not read as `>`
    const TOKENS: [(&'static str, Comparison); 6] = [
        (">=", Comparison::Ge),
        ("<=", Comparison::Le),
        ("!=", Comparison::Ne),
        (">", Comparison::Gt),
        ("<", Comparison::Lt),
        ("=", Comparison::Eq),
    ];

    fn holds(self, left: usize, right: usize) -> bool {
        match self {
            Comparison::Gt => left > right,
            Comparison::Ge => left >= right,
            Comparison::Lt => left < right,
            Comparison::Le => left <= right,
            Comparison::Eq => left == right,
            Comparison::Ne => left != right,
        }
    }
}

/// Which text of an element a string test reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextSource {
    /// `text()`: the first direct text child
    FirstText,
    /// `.`: all descendant text, concatenated
    StringValue,
}

impl TextSource {
    fn read(self, element: &ElementRef<'_>) -> String {
        match self {
            TextSource::FirstText => first_text(element).unwrap_or_default(),
            TextSource::StringValue => string_value(element),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Position(usize),
    Count {
        name: Option<String>,
        op: Comparison,
        value: usize,
    },
    Contains(TextSource, String),
    StartsWith(TextSource, String),
    HasAttribute(String),
    AttributeEquals(String, String),
}

impl Predicate {
    fn holds(&self, element: &ElementRef<'_>) -> bool {
        match self {
            Predicate::Position(_) => true,
            Predicate::Count { name, op, value } => {
                let count = element
                    .children()
                    .filter_map(ElementRef::wrap)
                    .filter(|child| match name {
                        Some(name) => child.value().name().eq_ignore_ascii_case(name),
                        None => true,
                    })
                    .count();
                op.holds(count, *value)
            }
            Predicate::Contains(source, needle) => source.read(element).contains(needle.as_str()),
            Predicate::StartsWith(source, prefix) => {
                source.read(element).starts_with(prefix.as_str())
            }
            Predicate::HasAttribute(name) => element.value().attr(name).is_some(),
            Predicate::AttributeEquals(name, expected) => {
                element.value().attr(name) == Some(expected.as_str())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Projection {
    Node,
    /// `text()`: the first direct text child of the first selected element
    /// that has one
    Text,
    Attribute(String),
}

/// A position in the tree during evaluation
///
/// `Document` stands for the virtual node above the root element, which is
/// where absolute paths start.
#[derive(Debug, Clone, Copy)]
enum Cursor<'a> {
    Document(ElementRef<'a>),
    Element(ElementRef<'a>),
}

/// A compiled XPath-style locator
#[derive(Debug, Clone)]
pub struct MarkupLocator {
    expression: String,
    absolute: bool,
    steps: Vec<Step>,
    projection: Projection,
}

impl MarkupLocator {
    /// Compiles an expression
    ///
    /// # Example
    ///
    /// ```
    /// use nar_harvest::locator::MarkupLocator;
    ///
    /// let rows = MarkupLocator::compile("//tr[count(td)>2]").unwrap();
    /// assert!(rows.is_node_set());
    /// assert!(MarkupLocator::compile("//tr[").is_err());
    /// ```
    pub fn compile(expression: &str) -> Result<Self, LocatorError> {
        PathParser {
            src: expression,
            pos: 0,
        }
        .parse()
    }

    /// The source text of this locator
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Returns true if the locator selects elements rather than text or attributes
    pub fn is_node_set(&self) -> bool {
        self.projection == Projection::Node
    }

    /// Selects the elements matched by the location path, in document order
    ///
    /// A final `text()` or `@attr` projection is not applied here; the owning
    /// elements are returned.
    pub fn select<'a>(&self, context: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        let start = if self.absolute {
            Cursor::Document(top_element(context))
        } else {
            Cursor::Element(context)
        };

        let mut current = vec![start];
        for step in &self.steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for cursor in &current {
                for element in step.apply(*cursor) {
                    if seen.insert(element.id()) {
                        next.push(Cursor::Element(element));
                    }
                }
            }
            current = next;
        }

        current
            .into_iter()
            .filter_map(|cursor| match cursor {
                Cursor::Element(element) => Some(element),
                Cursor::Document(_) => None,
            })
            .collect()
    }

    /// Evaluates the locator to a string, XPath style
    ///
    /// The result is the string value of the first selected node, or an empty
    /// string when nothing matches.
    pub fn evaluate(&self, context: ElementRef<'_>) -> String {
        let nodes = self.select(context);
        match &self.projection {
            Projection::Node => nodes.first().map(string_value).unwrap_or_default(),
            Projection::Text => nodes.iter().find_map(first_text).unwrap_or_default(),
            Projection::Attribute(name) => nodes
                .iter()
                .find_map(|element| element.value().attr(name).map(str::to_owned))
                .unwrap_or_default(),
        }
    }
}

impl Step {
    fn apply<'a>(&self, cursor: Cursor<'a>) -> Vec<ElementRef<'a>> {
        if self.test == NodeTest::Current {
            return match cursor {
                Cursor::Element(element) => filter_group(vec![element], &self.predicates),
                Cursor::Document(_) => Vec::new(),
            };
        }

        let parents = match self.axis {
            Axis::Child => vec![cursor],
            Axis::Descendant => descendants_or_self(cursor),
        };

        let mut selected = Vec::new();
        for parent in parents {
            let group = child_elements(parent)
                .into_iter()
                .filter(|element| self.test.matches(element))
                .collect();
            selected.extend(filter_group(group, &self.predicates));
        }
        selected
    }
}

/// Applies predicates in order; positions are relative to the preceding filter
fn filter_group<'a>(mut group: Vec<ElementRef<'a>>, predicates: &[Predicate]) -> Vec<ElementRef<'a>> {
    for predicate in predicates {
        group = match predicate {
            Predicate::Position(position) => group.get(position - 1).copied().into_iter().collect(),
            other => group.into_iter().filter(|element| other.holds(element)).collect(),
        };
    }
    group
}

fn child_elements(cursor: Cursor<'_>) -> Vec<ElementRef<'_>> {
    match cursor {
        Cursor::Document(root) => vec![root],
        Cursor::Element(element) => element.children().filter_map(ElementRef::wrap).collect(),
    }
}

fn descendants_or_self(cursor: Cursor<'_>) -> Vec<Cursor<'_>> {
    match cursor {
        Cursor::Document(root) => std::iter::once(cursor)
            .chain(root.descendants().filter_map(ElementRef::wrap).map(Cursor::Element))
            .collect(),
        Cursor::Element(element) => element
            .descendants()
            .filter_map(ElementRef::wrap)
            .map(Cursor::Element)
            .collect(),
    }
}

fn top_element(context: ElementRef<'_>) -> ElementRef<'_> {
    context
        .ancestors()
        .filter_map(ElementRef::wrap)
        .last()
        .unwrap_or(context)
}

fn first_text(element: &ElementRef<'_>) -> Option<String> {
    element
        .children()
        .find_map(|child| child.value().as_text().map(|text| String::from(&**text)))
}

fn string_value(element: &ElementRef<'_>) -> String {
    element.text().collect()
}

struct PathParser<'e> {
    src: &'e str,
    pos: usize,
}

impl<'e> PathParser<'e> {
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

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn parse(mut self) -> Result<MarkupLocator, LocatorError> {
        self.skip_whitespace();
        if self.rest().is_empty() {
            return Err(self.error("empty expression"));
        }

        let absolute = self.rest().starts_with('/');
        let mut axis = if self.eat("//") {
            Axis::Descendant
        } else {
            self.eat("/");
            Axis::Child
        };

        let mut steps = Vec::new();
        let mut projection = Projection::Node;

        loop {
            self.skip_whitespace();
            if projection != Projection::Node {
                return Err(self.error("text() and @attribute must be the last step"));
            }

            if self.eat("text()") {
                if axis == Axis::Descendant {
                    return Err(self.error("descendant text() is not supported"));
                }
                projection = Projection::Text;
            } else if self.eat("@") {
                if axis == Axis::Descendant {
                    return Err(self.error("descendant attributes are not supported"));
                }
                projection = Projection::Attribute(self.name()?);
            } else {
                if self.rest().starts_with("..") {
                    return Err(self.error("parent steps are not supported"));
                }
                let test = if self.eat(".") {
                    NodeTest::Current
                } else if self.eat("*") {
                    NodeTest::Any
                } else {
                    NodeTest::Name(self.name()?)
                };
                let predicates = self.predicates()?;
                steps.push(Step {
                    axis,
                    test,
                    predicates,
                });
            }

            self.skip_whitespace();
            if self.rest().is_empty() {
                break;
            }
            axis = if self.eat("//") {
                Axis::Descendant
            } else if self.eat("/") {
                Axis::Child
            } else {
                return Err(self.error("expected '/'"));
            };
        }

        Ok(MarkupLocator {
            expression: self.src.to_string(),
            absolute,
            steps,
            projection,
        })
    }

    fn name(&mut self) -> Result<String, LocatorError> {
        let length: usize = self
            .rest()
            .chars()
            .take_while(|c| is_name_char(*c))
            .map(char::len_utf8)
            .sum();
        if length == 0 {
            return Err(self.error("expected element name"));
        }
        let name = self.rest()[..length].to_ascii_lowercase();
        self.pos += length;
        Ok(name)
    }

    fn predicates(&mut self) -> Result<Vec<Predicate>, LocatorError> {
        let mut predicates = Vec::new();
        loop {
            self.skip_whitespace();
            if !self.eat("[") {
                return Ok(predicates);
            }
            let start = self.pos;
            let end = self.closing_bracket()?;
            predicates.push(parse_predicate(self.src, start, &self.src[start..end])?);
            self.pos = end + 1;
        }
    }

    /// Finds the `]` closing the predicate that starts at the current offset
    fn closing_bracket(&self) -> Result<usize, LocatorError> {
        let mut depth = 0usize;
        let mut offset = self.pos;
        while offset < self.src.len() {
            let c = self.src[offset..].chars().next().unwrap_or(']');
            match c {
                '\'' | '"' => {
                    let (_, end) = read_quoted(self.src, offset)?;
                    offset = end;
                    continue;
                }
                '[' => depth += 1,
                ']' if depth == 0 => return Ok(offset),
                ']' => depth -= 1,
                _ => {}
            }
            offset += c.len_utf8();
        }
        Err(self.error("unclosed predicate"))
    }
}

fn parse_predicate(expression: &str, offset: usize, inner: &str) -> Result<Predicate, LocatorError> {
    let error = |message: &str| locator_error(expression, offset, message);
    let text = inner.trim();

    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        let position: usize = text.parse().map_err(|_| error("position out of range"))?;
        if position == 0 {
            return Err(error("positions start at 1"));
        }
        return Ok(Predicate::Position(position));
    }

    if let Some(rest) = text.strip_prefix("count(") {
        let close = rest.find(')').ok_or_else(|| error("unclosed count()"))?;
        let name = rest[..close].trim();
        let name = match name {
            "*" => None,
            _ if !name.is_empty() && name.chars().all(is_name_char) => Some(name.to_ascii_lowercase()),
            _ => return Err(error("count() expects an element name")),
        };
        let tail = rest[close + 1..].trim_start();
        let (token, op) = Comparison::TOKENS
            .iter()
            .find(|(token, _)| tail.starts_with(token))
            .copied()
            .ok_or_else(|| error("count() must be compared to a number"))?;
        let value = tail[token.len()..]
            .trim()
            .parse()
            .map_err(|_| error("count() must be compared to a number"))?;
        return Ok(Predicate::Count { name, op, value });
    }

    for (function, contains) in [("contains(", true), ("starts-with(", false)] {
        let Some(rest) = text.strip_prefix(function) else {
            continue;
        };
        let arguments = rest
            .strip_suffix(')')
            .ok_or_else(|| error("unclosed function call"))?;
        let (subject, literal) = arguments
            .split_once(',')
            .ok_or_else(|| error("expected two arguments"))?;
        let source = match subject.trim() {
            "text()" => TextSource::FirstText,
            "." => TextSource::StringValue,
            _ => return Err(error("first argument must be text() or '.'")),
        };
        let literal = literal.trim();
        let (needle, end) = read_quoted(literal, 0).map_err(|_| error("expected quoted literal"))?;
        if end != literal.len() {
            return Err(error("unexpected input after literal"));
        }
        return Ok(if contains {
            Predicate::Contains(source, needle)
        } else {
            Predicate::StartsWith(source, needle)
        });
    }

    if let Some(rest) = text.strip_prefix('@') {
        let length: usize = rest
            .chars()
            .take_while(|c| is_name_char(*c))
            .map(char::len_utf8)
            .sum();
        if length == 0 {
            return Err(error("expected attribute name"));
        }
        let name = rest[..length].to_ascii_lowercase();
        let tail = rest[length..].trim();
        if tail.is_empty() {
            return Ok(Predicate::HasAttribute(name));
        }
        let literal = tail
            .strip_prefix('=')
            .map(str::trim)
            .ok_or_else(|| error("expected '=' after attribute"))?;
        let (value, end) = read_quoted(literal, 0).map_err(|_| error("expected quoted literal"))?;
        if end != literal.len() {
            return Err(error("unexpected input after literal"));
        }
        return Ok(Predicate::AttributeEquals(name, value));
    }

    Err(error("unsupported predicate"))
}
