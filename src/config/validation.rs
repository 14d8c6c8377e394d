use crate::config::duration::parse_duration;
use crate::config::types::*;
use crate::listing::{ListingFormat, ParserConfiguration};
use crate::url::normalize_url;
use crate::{ConfigError, ConfigResult};
use regex::Regex;
use std::time::Duration;
use url::Url;

/// Validates raw properties into provider settings
///
/// # Arguments
///
/// * `properties` - The flat provider properties
///
/// # Returns
///
/// * `Ok(ProviderSettings)` - Every required key present and well-formed
/// * `Err(ConfigError)` - The first missing or invalid property
pub fn validate(properties: &ProviderProperties) -> ConfigResult<ProviderSettings> {
    let base_url = validate_base_url(required(properties, BASE_URL)?)?;
    let filter_pattern = required(properties, FILTER)?.to_string();
    let filter = validate_filter(&filter_pattern)?;
    let nar_location = properties
        .get(NAR_LOCATION)
        .map(with_trailing_slash)
        .unwrap_or_default();

    let parser = ParserConfiguration {
        file_list_identifier: required(properties, FILE_LIST_IDENTIFIER)?.to_string(),
        location_identifier: required(properties, LOCATION_IDENTIFIER)?.to_string(),
        last_modification_identifier: required(properties, LAST_MODIFICATION_IDENTIFIER)?
            .to_string(),
        directory_identifier: required(properties, DIRECTORY_IDENTIFIER)?.to_string(),
        date_time_format: required(properties, DATE_TIME_FORMAT)?.to_string(),
    };

    let format = match properties.get(LISTING_FORMAT) {
        Some(value) => value.parse()?,
        None => ListingFormat::default(),
    };

    Ok(ProviderSettings {
        base_url,
        nar_location,
        filter,
        filter_pattern,
        format,
        parser,
        transport: validate_transport(properties)?,
    })
}

fn required<'a>(properties: &'a ProviderProperties, key: &'static str) -> ConfigResult<&'a str> {
    properties.get(key).ok_or(ConfigError::Missing(key))
}

fn with_trailing_slash(value: &str) -> String {
    if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{}/", value)
    }
}

/// Validates the listing root and normalizes it to end with a single `/`
fn validate_base_url(value: &str) -> ConfigResult<String> {
    let value = value.trim();
    let parsed = Url::parse(value).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", value, e)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{}: scheme must be http or https",
            value
        )));
    }

    Ok(with_trailing_slash(&normalize_url(value)))
}

/// Compiles the filter so that it must match a whole location
fn validate_filter(value: &str) -> ConfigResult<Regex> {
    Ok(Regex::new(&format!("^(?:{})$", value))?)
}

fn validate_transport(properties: &ProviderProperties) -> ConfigResult<TransportSettings> {
    let credentials = match (properties.get(USER_NAME), properties.get(PASSWORD)) {
        (Some(user), Some(password)) => Credentials {
            user: user.to_string(),
            password: password.to_string(),
        },
        (None, _) => return Err(ConfigError::Missing(USER_NAME)),
        (_, None) => return Err(ConfigError::Missing(PASSWORD)),
    };

    Ok(TransportSettings {
        credentials,
        proxy: validate_proxy(properties)?,
        connect_timeout: timeout(properties, CONNECT_TIMEOUT, DEFAULT_CONNECT_TIMEOUT),
        read_timeout: timeout(properties, READ_TIMEOUT, DEFAULT_READ_TIMEOUT),
    })
}

fn validate_proxy(properties: &ProviderProperties) -> ConfigResult<Option<ProxySettings>> {
    let (host, port) = match (properties.get(PROXY_SERVER), properties.get(PROXY_SERVER_PORT)) {
        (Some(host), Some(port)) => (host.trim(), port.trim()),
        _ => return Ok(None),
    };

    let port: u16 = port.parse().map_err(|_| ConfigError::Invalid {
        key: PROXY_SERVER_PORT.to_string(),
        message: format!("'{}' is not a valid port", port),
    })?;

    let credentials = match (properties.get(PROXY_USER), properties.get(PROXY_PASSWORD)) {
        (Some(user), Some(password)) => Some(Credentials {
            user: user.to_string(),
            password: password.to_string(),
        }),
        _ => None,
    };

    Ok(Some(ProxySettings {
        host: host.to_string(),
        port,
        credentials,
    }))
}

/// Reads a timeout, falling back to `default` when absent or unparsable
fn timeout(properties: &ProviderProperties, key: &str, default: Duration) -> Duration {
    match properties.get(key) {
        None => default,
        Some(value) => parse_duration(value).unwrap_or_else(|| {
            tracing::warn!(
                "Cannot parse {} '{}', using default of {:?}",
                key,
                value,
                default
            );
            default
        }),
    }
}
