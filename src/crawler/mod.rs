//! Listing crawler
//!
//! This module contains the provider and its supporting pieces:
//! - HTTP transport with basic credentials, proxy and timeouts
//! - Per-crawl deduplication and conflict resolution
//! - The resource descriptor and fetch stream types

mod descriptor;
mod fetcher;
mod frontier;
mod provider;

pub use descriptor::{ResourceDescriptor, ResourceStream};
pub use fetcher::{build_http_client, HttpTransport};
pub use provider::HttpsResourceProvider;
