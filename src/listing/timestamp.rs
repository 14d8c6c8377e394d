//! Last-modified timestamp parsing
//!
//! Listing servers render timestamps in many layouts, so the layout is
//! configured as a `java.time`-style pattern (`yyyy-MM-dd HH:mm`) and
//! translated once into a `chrono` format string.

use crate::{ConfigError, ParseError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// A compiled timestamp pattern; parsed values are interpreted as UTC
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampFormat {
    pattern: String,
    format: String,
    has_time: bool,
}

impl TimestampFormat {
    /// Compiles a date-time pattern
    ///
    /// | Letters | Meaning |
    /// |---------|---------|
    /// | `y`, `yyy`, `yyyy` / `yy` | year / two-digit year |
    /// | `M`, `MM` / `MMM` / `MMMM` | month number / short name / full name |
    /// | `d`, `dd` | day of month |
    /// | `E`, `EEEE` | short / full weekday name |
    /// | `H`, `HH` / `h`, `hh` / `a` | 24-hour / 12-hour / AM-PM |
    /// | `m`, `mm` / `s`, `ss` | minute / second |
    /// | `SSS`, `SSSSSS`, `SSSSSSSSS` | fraction of second |
    /// | `'text'` | literal text; `''` is a single quote |
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::Invalid {
            key: crate::config::DATE_TIME_FORMAT.to_string(),
            message,
        };

        let chars: Vec<char> = pattern.chars().collect();
        let mut format = String::new();
        let mut has_time = false;
        let mut index = 0;

        while index < chars.len() {
            let c = chars[index];

            if c == '\'' {
                if chars.get(index + 1) == Some(&'\'') {
                    format.push('\'');
                    index += 2;
                    continue;
                }
                let close = chars[index + 1..]
                    .iter()
                    .position(|&q| q == '\'')
                    .ok_or_else(|| invalid(format!("unterminated quote in '{}'", pattern)))?;
                for &literal in &chars[index + 1..index + 1 + close] {
                    push_literal(&mut format, literal);
                }
                index += close + 2;
                continue;
            }

            if !c.is_ascii_alphabetic() {
                push_literal(&mut format, c);
                index += 1;
                continue;
            }

            let run = chars[index..].iter().take_while(|&&next| next == c).count();
            let directive = match (c, run) {
                ('y' | 'u', 2) => "%y",
                ('y' | 'u', _) => "%Y",
                ('M', 1 | 2) => "%m",
                ('M', 3) => "%b",
                ('M', _) => "%B",
                ('d', 1 | 2) => "%d",
                ('E', 1..=3) => "%a",
                ('E', _) => "%A",
                ('H', 1 | 2) => "%H",
                ('h', 1 | 2) => "%I",
                ('m', 1 | 2) => "%M",
                ('s', 1 | 2) => "%S",
                ('S', 3) => "%3f",
                ('S', 6) => "%6f",
                ('S', 9) => "%9f",
                ('a', 1) => "%p",
                _ => {
                    return Err(invalid(format!(
                        "unsupported pattern letters '{}' in '{}'",
                        c.to_string().repeat(run),
                        pattern
                    )))
                }
            };
            has_time |= matches!(c, 'H' | 'h' | 'm' | 's' | 'S' | 'a');
            format.push_str(directive);
            index += run;
        }

        Ok(Self {
            pattern: pattern.to_string(),
            format,
            has_time,
        })
    }

    /// The pattern this format was compiled from
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Parses a timestamp into epoch milliseconds
    ///
    /// Surrounding whitespace is ignored. Date-only patterns resolve to
    /// midnight UTC.
    ///
    /// # Example
    ///
    /// ```
    /// use nar_harvest::listing::TimestampFormat;
    ///
    /// let format = TimestampFormat::compile("yyy-MM-dd HH:mm").unwrap();
    /// assert_eq!(format.parse_millis("2021-05-17 21:09").unwrap(), 1621285740000);
    /// ```
    pub fn parse_millis(&self, value: &str) -> Result<i64, ParseError> {
        let text = value.trim();
        let parsed = if self.has_time {
            NaiveDateTime::parse_from_str(text, &self.format)
        } else {
            NaiveDate::parse_from_str(text, &self.format)
                .map(|date| date.and_time(NaiveTime::default()))
        };

        parsed
            .map(|datetime| Utc.from_utc_datetime(&datetime).timestamp_millis())
            .map_err(|source| ParseError::Timestamp {
                value: value.to_string(),
                pattern: self.pattern.clone(),
                source,
            })
    }
}

fn push_literal(format: &mut String, c: char) {
    if c == '%' {
        format.push_str("%%");
    } else {
        format.push(c);
    }
}
