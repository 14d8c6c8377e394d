use crate::listing::{ListingFormat, ParserConfiguration};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub const BASE_URL: &str = "base.url";
pub const NAR_LOCATION: &str = "nar.location";
pub const FILTER: &str = "filter";
pub const LISTING_FORMAT: &str = "listing.format";
pub const FILE_LIST_IDENTIFIER: &str = "file.list.identifier";
pub const LOCATION_IDENTIFIER: &str = "location.identifier";
pub const LAST_MODIFICATION_IDENTIFIER: &str = "last.modification.identifier";
pub const DIRECTORY_IDENTIFIER: &str = "directory.identifier";
pub const DATE_TIME_FORMAT: &str = "date.time.format";
pub const USER_NAME: &str = "user.name";
pub const PASSWORD: &str = "password";
pub const PROXY_SERVER: &str = "proxy.server";
pub const PROXY_SERVER_PORT: &str = "proxy.server.port";
pub const PROXY_USER: &str = "proxy.user";
pub const PROXY_PASSWORD: &str = "proxy.password";
pub const CONNECT_TIMEOUT: &str = "connect.timeout";
pub const READ_TIMEOUT: &str = "read.timeout";

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Flat, string-keyed provider properties
///
/// This is the raw form handed to `HttpsResourceProvider::initialize`; keys
/// are the dotted names above (`base.url`, `filter`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderProperties {
    values: BTreeMap<String, String>,
}

impl ProviderProperties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value for `key`, if set
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Sets `key`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Removes `key`, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ProviderProperties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// User name and password for HTTP basic authentication
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

/// HTTP proxy to route every request through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl ProxySettings {
    /// The proxy URL, e.g. `http://proxy.local:3128`
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Settings for the shared HTTP client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    pub credentials: Credentials,
    pub proxy: Option<ProxySettings>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// Fully validated provider settings
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Listing root, always ending with a single `/`
    pub base_url: String,
    /// Sub-path appended when descending into a directory; empty or ending with `/`
    pub nar_location: String,
    /// Whole-name filter applied to file entries
    pub filter: Regex,
    /// Filter as configured, before anchoring
    pub filter_pattern: String,
    pub format: ListingFormat,
    pub parser: ParserConfiguration,
    pub transport: TransportSettings,
}
