//! JSON array listing parser

use super::{ListingParser, ParsedEntry, ParserConfiguration, TimestampFormat};
use crate::locator::JsonLocator;
use crate::{ConfigError, ParseError, ParseResult};
use serde_json::Value;

/// Listing parser for JSON documents
#[derive(Debug, Clone)]
pub struct JsonListingParser {
    file_list: JsonLocator,
    location: JsonLocator,
    last_modified: JsonLocator,
    directory: JsonLocator,
    timestamp: TimestampFormat,
}

impl JsonListingParser {
    /// Compiles the configured expressions
    pub fn new(configuration: &ParserConfiguration) -> Result<Self, ConfigError> {
        Ok(Self {
            file_list: JsonLocator::compile(&configuration.file_list_identifier)?,
            location: JsonLocator::compile(&configuration.location_identifier)?,
            last_modified: JsonLocator::compile(&configuration.last_modification_identifier)?,
            directory: JsonLocator::compile(&configuration.directory_identifier)?,
            timestamp: TimestampFormat::compile(&configuration.date_time_format)?,
        })
    }

    fn required(&self, locator: &JsonLocator, fragment: &Value) -> ParseResult<String> {
        locator.evaluate(fragment).ok_or_else(|| {
            ParseError::Malformed(format!(
                "'{}' matched nothing in entry {}",
                locator.expression(),
                fragment
            ))
        })
    }
}

impl ListingParser for JsonListingParser {
    fn parse(&self, body: &str, source_path: &str) -> ParseResult<Vec<ParsedEntry>> {
        let document: Value = serde_json::from_str(body)
            .map_err(|e| ParseError::Malformed(format!("invalid JSON: {}", e)))?;

        let mut entries = Vec::new();
        for fragment in self.file_list.select(&document) {
            let location = self.required(&self.location, fragment)?.trim().to_string();

            if !self.directory.select(fragment).is_empty() {
                entries.push(ParsedEntry::directory(location, source_path));
            } else {
                let modified = self.required(&self.last_modified, fragment)?;
                let last_modified = self.timestamp.parse_millis(&modified)?;
                entries.push(ParsedEntry::file(location, last_modified, source_path));
            }
        }

        tracing::trace!("Parsed {} entries from JSON listing {}", entries.len(), source_path);
        Ok(entries)
    }
}
