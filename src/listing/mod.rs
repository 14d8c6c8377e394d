//! Directory listing parsers
//!
//! A listing parser turns the body of one directory listing response into
//! ordered `ParsedEntry` values. Two formats are supported:
//!
//! - `MarkupListingParser`: HTML tables, located with XPath-style expressions
//! - `JsonListingParser`: JSON arrays, located with JSONPath-style expressions
//!
//! Both are configured with the same four locators (entry list, location,
//! last-modified, directory marker) and a timestamp pattern.

mod entry;
mod json;
mod markup;
mod timestamp;

pub use entry::ParsedEntry;
pub use json::JsonListingParser;
pub use markup::{check_structure, MarkupListingParser};
pub use timestamp::TimestampFormat;

use crate::{ConfigError, ParseResult};
use std::fmt;
use std::str::FromStr;

/// Parses one listing body into entries
///
/// Implementations hold compiled locators and are shared read-only across
/// every listing of a crawl.
pub trait ListingParser: fmt::Debug + Send + Sync {
    /// Parses a response body fetched from `source_path`
    ///
    /// Entries are returned in source order. `source_path` is recorded as the
    /// `path` of every entry.
    fn parse(&self, body: &str, source_path: &str) -> ParseResult<Vec<ParsedEntry>>;
}

/// The rendering format of the remote listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListingFormat {
    /// HTML (or XHTML) table
    #[default]
    Html,
    /// JSON array of objects
    Json,
}

impl FromStr for ListingFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" | "xml" | "xhtml" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Invalid {
                key: crate::config::LISTING_FORMAT.to_string(),
                message: format!("expected 'html' or 'json', got '{}'", other),
            }),
        }
    }
}

impl fmt::Display for ListingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => write!(f, "html"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Locator expressions and timestamp pattern for a listing parser
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfiguration {
    /// Selects the entry fragments of a listing
    pub file_list_identifier: String,
    /// Extracts the entry name from a fragment
    pub location_identifier: String,
    /// Extracts the last-modified text from a fragment
    pub last_modification_identifier: String,
    /// Non-empty result marks the fragment as a directory
    pub directory_identifier: String,
    /// `java.time`-style pattern for the last-modified text
    pub date_time_format: String,
}

impl ListingFormat {
    /// Builds the parser for this format, compiling every expression
    ///
    /// # Returns
    ///
    /// * `Ok(Box<dyn ListingParser>)` - Ready-to-use parser
    /// * `Err(ConfigError)` - An expression or the timestamp pattern is invalid
    pub fn build_parser(
        self,
        configuration: &ParserConfiguration,
    ) -> Result<Box<dyn ListingParser>, ConfigError> {
        Ok(match self {
            ListingFormat::Html => Box::new(MarkupListingParser::new(configuration)?),
            ListingFormat::Json => Box::new(JsonListingParser::new(configuration)?),
        })
    }
}
