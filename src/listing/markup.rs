//! HTML table listing parser
//!
//! Typical Apache/nginx style listings render one `<tr>` per entry. With the
//! default expressions the entry list is `//tr[count(td)>2]`, which skips the
//! header row and the two-cell "Parent Directory" row without any special
//! casing here.

use super::{ListingParser, ParsedEntry, ParserConfiguration, TimestampFormat};
use crate::config::FILE_LIST_IDENTIFIER;
use crate::locator::MarkupLocator;
use crate::{ConfigError, ParseError, ParseResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use scraper::Html;

/// Elements that never take an end tag in HTML
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Listing parser for HTML tables
#[derive(Debug, Clone)]
pub struct MarkupListingParser {
    file_list: MarkupLocator,
    location: MarkupLocator,
    last_modified: MarkupLocator,
    directory: MarkupLocator,
    timestamp: TimestampFormat,
}

impl MarkupListingParser {
    /// Compiles the configured expressions
    pub fn new(configuration: &ParserConfiguration) -> Result<Self, ConfigError> {
        let file_list = MarkupLocator::compile(&configuration.file_list_identifier)?;
        if !file_list.is_node_set() {
            return Err(ConfigError::Invalid {
                key: FILE_LIST_IDENTIFIER.to_string(),
                message: format!("'{}' must select elements", file_list.expression()),
            });
        }

        Ok(Self {
            file_list,
            location: MarkupLocator::compile(&configuration.location_identifier)?,
            last_modified: MarkupLocator::compile(&configuration.last_modification_identifier)?,
            directory: MarkupLocator::compile(&configuration.directory_identifier)?,
            timestamp: TimestampFormat::compile(&configuration.date_time_format)?,
        })
    }
}

impl ListingParser for MarkupListingParser {
    fn parse(&self, body: &str, source_path: &str) -> ParseResult<Vec<ParsedEntry>> {
        check_structure(body)?;

        let document = Html::parse_document(body);
        let mut entries = Vec::new();

        for fragment in self.file_list.select(document.root_element()) {
            let location = self.location.evaluate(fragment).trim().to_string();

            if !self.directory.evaluate(fragment).is_empty() {
                entries.push(ParsedEntry::directory(location, source_path));
            } else {
                let modified = self.last_modified.evaluate(fragment);
                let last_modified = self.timestamp.parse_millis(&modified)?;
                entries.push(ParsedEntry::file(location, last_modified, source_path));
            }
        }

        tracing::trace!("Parsed {} entries from HTML listing {}", entries.len(), source_path);
        Ok(entries)
    }
}

/// Verifies that every element opened in the document is closed
///
/// Void elements need no end tag, and an end tag implicitly closes any
/// elements still open inside it. Anything open at the end of input, or a
/// lexical error in the markup, is a structure error.
///
/// # Example
///
/// ```
/// use nar_harvest::listing::check_structure;
///
/// assert!(check_structure("<html><body><p>text<br></body></html>").is_ok());
/// assert!(check_structure("<html><body>").is_err());
/// ```
pub fn check_structure(body: &str) -> ParseResult<()> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().check_end_names = false;

    let mut open: Vec<String> = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(tag)) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_ascii_lowercase();
                if !VOID_ELEMENTS.contains(&name.as_str()) {
                    open.push(name);
                }
            }
            Ok(Event::End(tag)) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_ascii_lowercase();
                if let Some(position) = open.iter().rposition(|element| *element == name) {
                    open.truncate(position);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(ParseError::Structure(format!(
                    "invalid markup at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if open.is_empty() {
        Ok(())
    } else {
        Err(ParseError::Structure(format!(
            "unclosed element(s): {}",
            open.iter()
                .map(|name| format!("<{}>", name))
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::fixtures::markup_configuration;

    /// Builds listing pages the way Apache's mod_autoindex lays them out
    struct ListingBuilder {
        rows: Vec<String>,
    }

    impl ListingBuilder {
        fn new() -> Self {
            Self { rows: Vec::new() }
        }

        fn header(mut self) -> Self {
            self.rows
                .push("<tr><th>Name</th><th>Last modified</th><th>Size</th></tr>".to_string());
            self
        }

        fn parent(mut self) -> Self {
            self.rows
                .push(r#"<tr><td><a href="../">Parent Directory</a></td><td>-</td></tr>"#.to_string());
            self
        }

        fn directory(mut self, name: &str) -> Self {
            self.rows.push(format!(
                r#"<tr><td><a href="{0}/">{0}/</a></td><td>-</td><td>-</td></tr>"#,
                name
            ));
            self
        }

        fn file(mut self, name: &str, modified: &str) -> Self {
            self.rows.push(format!(
                r#"<tr><td><a href="{0}">{0}</a></td><td>{1}</td><td>size</td></tr>"#,
                name, modified
            ));
            self
        }

        fn build(self) -> String {
            format!(
                "<html><head><title>Index</title></head><body><table>{}</table><hr></body></html>",
                self.rows.join("\n")
            )
        }
    }

    fn parser() -> MarkupListingParser {
        MarkupListingParser::new(&markup_configuration()).unwrap()
    }

    #[test]
    fn test_empty_document() {
        let html = "<html><body></body></html>";
        assert!(parser().parse(html, "https://test").unwrap().is_empty());
    }

    #[test]
    fn test_parent_row_only() {
        let html = ListingBuilder::new().header().parent().build();
        assert!(parser().parse(&html, "https://test").unwrap().is_empty());
    }

    #[test]
    fn test_single_file() {
        let html = ListingBuilder::new()
            .header()
            .parent()
            .file("file1", "2021-05-17 21:09")
            .build();

        let entries = parser().parse(&html, "https://test").unwrap();
        assert_eq!(
            entries,
            vec![ParsedEntry::file("file1", 1621285740000, "https://test")]
        );
    }

    #[test]
    fn test_single_directory() {
        let html = ListingBuilder::new().header().parent().directory("dir1").build();

        let entries = parser().parse(&html, "https://test").unwrap();
        assert_eq!(entries, vec![ParsedEntry::directory("dir1/", "https://test")]);
    }

    #[test]
    fn test_mixed_entries_keep_source_order() {
        let html = ListingBuilder::new()
            .header()
            .parent()
            .directory("dir1")
            .file("file1", "2021-05-17 21:09")
            .build();

        let entries = parser().parse(&html, "https://test").unwrap();
        assert_eq!(
            entries,
            vec![
                ParsedEntry::directory("dir1/", "https://test"),
                ParsedEntry::file("file1", 1621285740000, "https://test"),
            ]
        );
    }

    #[test]
    fn test_parse_is_idempotent() {
        let html = ListingBuilder::new()
            .header()
            .directory("dir1")
            .file("file1", "2021-05-17 21:09")
            .build();

        let parser = parser();
        assert_eq!(
            parser.parse(&html, "https://test").unwrap(),
            parser.parse(&html, "https://test").unwrap()
        );
    }

    #[test]
    fn test_unclosed_document_is_structure_error() {
        let err = parser().parse("<html><body>", "https://test").unwrap_err();
        assert!(matches!(err, ParseError::Structure(_)));
    }

    #[test]
    fn test_placeholder_date_is_timestamp_error() {
        let html = ListingBuilder::new().header().parent().file("file1", "-").build();
        let err = parser().parse(&html, "https://test").unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { .. }));
    }

    #[test]
    fn test_wrong_date_layout_is_timestamp_error() {
        let html = ListingBuilder::new()
            .header()
            .parent()
            .file("file1", "2021.05.17 21:09")
            .build();
        let err = parser().parse(&html, "https://test").unwrap_err();
        assert!(matches!(err, ParseError::Timestamp { .. }));
    }

    #[test]
    fn test_structure_tolerates_implied_end_tags() {
        assert!(check_structure("<table><tr><td>a<td>b</tr></table>").is_ok());
        assert!(check_structure("<!DOCTYPE html><html><body><img src=\"x\"><hr/></body></html>").is_ok());
        assert!(check_structure("plain text").is_ok());
    }

    #[test]
    fn test_structure_reports_unclosed_elements() {
        let err = check_structure("<html><body><table>").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Markup structure error: unclosed element(s): <html>, <body>, <table>"
        );
    }

    #[test]
    fn test_list_locator_must_select_elements() {
        let mut configuration = markup_configuration();
        configuration.file_list_identifier = "//tr/text()".to_string();
        assert!(matches!(
            MarkupListingParser::new(&configuration),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
