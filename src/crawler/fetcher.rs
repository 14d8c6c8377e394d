//! HTTP transport
//!
//! One `reqwest::Client` is built per provider from its `TransportSettings`
//! and shared by every request. Requests are plain GETs carrying preemptive
//! basic credentials; any non-2xx status is an error.

use crate::config::{Credentials, TransportSettings};
use crate::url::normalize_url;
use crate::{ProviderError, Result};
use reqwest::{Client, Proxy, Response};

/// Builds the HTTP client for a provider
///
/// # Arguments
///
/// * `settings` - Timeouts and optional proxy
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client (e.g. invalid proxy)
///
/// # Example
///
/// ```
/// use nar_harvest::config::{Credentials, TransportSettings};
/// use nar_harvest::crawler::build_http_client;
/// use std::time::Duration;
///
/// let settings = TransportSettings {
///     credentials: Credentials {
///         user: "user".to_string(),
///         password: "pass".to_string(),
///     },
///     proxy: None,
///     connect_timeout: Duration::from_secs(15),
///     read_timeout: Duration::from_secs(60),
/// };
///
/// let client = build_http_client(&settings).unwrap();
/// ```
pub fn build_http_client(settings: &TransportSettings) -> std::result::Result<Client, reqwest::Error> {
    let builder = Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(settings.connect_timeout)
        .read_timeout(settings.read_timeout)
        .gzip(true)
        .brotli(true);

    let builder = match &settings.proxy {
        Some(proxy) => {
            let mut route = Proxy::all(proxy.url())?;
            if let Some(credentials) = &proxy.credentials {
                route = route.basic_auth(&credentials.user, &credentials.password);
            }
            builder.proxy(route)
        }
        // Only the configured proxy is ever used
        None => builder.no_proxy(),
    };

    builder.build()
}

/// Shared client plus the credentials sent with every request
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    credentials: Credentials,
}

impl HttpTransport {
    pub fn new(settings: &TransportSettings) -> std::result::Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(settings)?,
            credentials: settings.credentials.clone(),
        })
    }

    /// Issues a GET for `url` after collapsing duplicate separators
    ///
    /// # Returns
    ///
    /// * `Ok(Response)` - A 2xx response, body not yet read
    /// * `Err(ProviderError::Transport)` - The server answered with a non-2xx status
    /// * `Err(ProviderError::Http)` - The request could not be completed
    pub async fn get(&self, url: &str) -> Result<Response> {
        let url = normalize_url(url);
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.user, Some(&self.credentials.password))
            .send()
            .await
            .map_err(|source| ProviderError::Http {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("GET {} returned {}", url, status);
            return Err(ProviderError::Transport {
                url,
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    /// Issues a GET and reads the whole body as text
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        let url = response.url().to_string();
        response
            .text()
            .await
            .map_err(|source| ProviderError::Http { url, source })
    }
}
