//! Field-locator expressions
//!
//! A locator is a compiled, format-specific query that pulls one value (or a
//! set of values) out of a parsed listing document:
//!
//! - `MarkupLocator`: an XPath 1.0 subset evaluated over an HTML tree
//! - `JsonLocator`: a JSONPath subset evaluated over a `serde_json::Value`
//!
//! Both are compiled once from configuration strings; compilation failures are
//! reported as `LocatorError` with the offset of the offending token.

mod json;
mod markup;

pub use json::JsonLocator;
pub use markup::MarkupLocator;

use crate::LocatorError;

pub(crate) fn locator_error(expression: &str, offset: usize, message: impl Into<String>) -> LocatorError {
    LocatorError {
        expression: expression.to_string(),
        offset,
        message: message.into(),
    }
}

/// Reads a single- or double-quoted literal starting at `start`
///
/// Returns the literal and the offset just past its closing quote.
pub(crate) fn read_quoted(expression: &str, start: usize) -> Result<(String, usize), LocatorError> {
    let rest = &expression[start..];
    let quote = match rest.chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err(locator_error(expression, start, "expected quoted literal")),
    };

    let mut literal = String::new();
    let mut escaped = false;
    for (index, c) in rest.char_indices().skip(1) {
        if escaped {
            literal.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return Ok((literal, start + index + c.len_utf8()));
        } else {
            literal.push(c);
        }
    }

    Err(locator_error(expression, start, "unterminated literal"))
}

/// Returns true for characters allowed in element and field names
pub(crate) fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '-' | '_' | ':')
}
