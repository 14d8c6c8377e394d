//! Breadth-first resource provider
//!
//! The provider walks the listing tree one level at a time: the current
//! frontier is processed in encounter order, directories contribute their
//! children to the next frontier, and files go through conflict resolution.
//! Requests are issued strictly one at a time.

use super::fetcher::HttpTransport;
use super::frontier::CrawlState;
use super::{ResourceDescriptor, ResourceStream};
use crate::config::{validate, ProviderProperties, ProviderSettings};
use crate::listing::{ListingParser, ParsedEntry};
use crate::url::{compose_directory_url, relative_path};
use crate::{ConfigError, ProviderError, Result};
use futures::StreamExt;

/// Discovers and fetches resources from an HTTP directory listing
///
/// A provider starts uninitialized; every operation fails with
/// `ProviderError::NotInitialized` until `initialize` succeeds.
///
/// # Example
///
/// ```no_run
/// use nar_harvest::{HttpsResourceProvider, ProviderProperties};
///
/// # async fn example(properties: ProviderProperties) -> nar_harvest::Result<()> {
/// let provider = HttpsResourceProvider::from_properties(&properties)?;
/// for descriptor in provider.list_resources().await? {
///     println!("{}\t{}", descriptor.last_modified, descriptor.location);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct HttpsResourceProvider {
    ready: Option<Ready>,
}

#[derive(Debug)]
struct Ready {
    settings: ProviderSettings,
    parser: Box<dyn ListingParser>,
    transport: HttpTransport,
}

impl HttpsResourceProvider {
    /// Creates an uninitialized provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and initializes a provider in one step
    pub fn from_properties(properties: &ProviderProperties) -> Result<Self> {
        let mut provider = Self::new();
        provider.initialize(properties)?;
        Ok(provider)
    }

    /// Validates `properties` and builds the parser and HTTP client
    ///
    /// On failure the provider keeps its previous state.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The provider is ready
    /// * `Err(ProviderError::Config)` - A required property is missing or invalid
    pub fn initialize(&mut self, properties: &ProviderProperties) -> Result<()> {
        let settings = validate(properties)?;
        let parser = settings.format.build_parser(&settings.parser)?;
        let transport = HttpTransport::new(&settings.transport).map_err(ConfigError::Transport)?;

        tracing::info!(
            "Provider initialized for {} ({} listings)",
            settings.base_url,
            settings.format
        );

        self.ready = Some(Ready {
            settings,
            parser,
            transport,
        });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.ready.is_some()
    }

    /// The validated settings in effect
    pub fn settings(&self) -> Result<&ProviderSettings> {
        Ok(&self.ready()?.settings)
    }

    fn ready(&self) -> Result<&Ready> {
        self.ready.as_ref().ok_or(ProviderError::NotInitialized)
    }

    /// Crawls the whole listing tree
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<ResourceDescriptor>)` - Surviving descriptors in discovery order
    /// * `Err(ProviderError::Discovery)` - A listing could not be fetched or parsed
    /// * `Err(ProviderError::NotInitialized)` - `initialize` has not succeeded
    pub async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>> {
        self.ready()?
            .crawl()
            .await
            .map_err(ProviderError::discovery)
    }

    /// Lists the filtered children of one directory entry
    pub async fn list_child_resources(&self, directory: &ParsedEntry) -> Result<Vec<ParsedEntry>> {
        self.ready()?
            .list_children(directory)
            .await
            .map_err(ProviderError::discovery)
    }

    /// Streams the body of a discovered resource
    ///
    /// # Returns
    ///
    /// * `Ok(ResourceStream)` - The response body as it arrives
    /// * `Err(ProviderError::Transport)` - The server answered with a non-2xx status
    /// * `Err(ProviderError::Http)` - The request could not be completed
    pub async fn fetch(&self, descriptor: &ResourceDescriptor) -> Result<ResourceStream> {
        let ready = self.ready()?;
        let url = format!("{}{}", ready.settings.base_url, descriptor.location);

        let response = ready.transport.get(&url).await?;
        let url = response.url().to_string();
        tracing::debug!("Streaming {}", url);

        Ok(response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|source| ProviderError::Http {
                    url: url.clone(),
                    source,
                })
            })
            .boxed())
    }
}

impl Ready {
    async fn crawl(&self) -> Result<Vec<ResourceDescriptor>> {
        let mut state = CrawlState::new();
        let mut listings = 1;
        let mut frontier = self.collect(&self.settings.base_url).await?;

        while !frontier.is_empty() {
            let mut next_frontier = Vec::new();
            for entry in frontier {
                if entry.directory {
                    next_frontier.extend(self.list_children(&entry).await?);
                    listings += 1;
                } else {
                    state.admit(entry);
                }
            }
            frontier = next_frontier;
        }

        tracing::info!(
            "Crawled {} listings: {} resources, {} conflicts",
            listings,
            state.results().len(),
            state.conflicts().len()
        );
        Ok(state.finish())
    }

    async fn list_children(&self, directory: &ParsedEntry) -> Result<Vec<ParsedEntry>> {
        let url = compose_directory_url(
            &self.settings.base_url,
            directory,
            &self.settings.nar_location,
        );
        self.collect(&url).await
    }

    /// Fetches and parses one listing, dropping files rejected by the filter
    async fn collect(&self, url: &str) -> Result<Vec<ParsedEntry>> {
        let body = self.transport.get_text(url).await?;
        let path = relative_path(url, &self.settings.base_url);

        let mut entries = self.parser.parse(&body, &path)?;
        entries.retain(|entry| entry.directory || self.settings.filter.is_match(&entry.location));

        tracing::debug!("Listing '{}' yielded {} entries", path, entries.len());
        Ok(entries)
    }
}
