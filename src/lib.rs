//! NAR-Harvest: remote extension bundle discovery
//!
//! This crate discovers and retrieves binary extension bundles published on an
//! HTTP-served directory listing. Listings are rendered either as an HTML table
//! or as a JSON array; both are read through configurable field-locator
//! expressions, and the directory tree is walked breadth-first.

pub mod config;
pub mod crawler;
pub mod listing;
pub mod locator;
pub mod url;

use thiserror::Error;

/// Main error type for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider is not initialized")]
    NotInitialized,

    #[error("Listing parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("HTTP {status} returned for {url}")]
    Transport { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Provider cannot list resources: {source}")]
    Discovery { source: Box<ProviderError> },
}

impl ProviderError {
    /// Wraps an error raised while crawling into a discovery failure
    pub fn discovery(source: ProviderError) -> Self {
        match source {
            already @ ProviderError::Discovery { .. } => already,
            other => ProviderError::Discovery {
                source: Box::new(other),
            },
        }
    }

    /// Returns the HTTP status code carried by a transport failure, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Transport { status, .. } => Some(*status),
            ProviderError::Discovery { source } => source.status(),
            _ => None,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required property '{0}'")]
    Missing(&'static str),

    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Invalid locator expression: {0}")]
    Locator(#[from] LocatorError),
}

/// Errors raised while compiling a field-locator expression
#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{expression}' at offset {offset}: {message}")]
pub struct LocatorError {
    pub expression: String,
    pub offset: usize,
    pub message: String,
}

/// Listing-specific errors
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed listing: {0}")]
    Malformed(String),

    #[error("Markup structure error: {0}")]
    Structure(String),

    #[error("Cannot parse timestamp '{value}' with pattern '{pattern}': {source}")]
    Timestamp {
        value: String,
        pattern: String,
        source: chrono::ParseError,
    },
}

/// Result type alias for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for listing parse operations
pub type ParseResult<T> = std::result::Result<T, ParseError>;

// Re-export commonly used types
pub use config::ProviderProperties;
pub use crawler::{HttpsResourceProvider, ResourceDescriptor, ResourceStream};
pub use listing::{ListingFormat, ListingParser, ParsedEntry, ParserConfiguration};
