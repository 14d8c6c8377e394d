use crate::listing::ParsedEntry;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// A discovered resource
///
/// `location` is the entry's listing path joined with its name, relative to
/// the provider's base URL; it is the key passed back to `fetch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub location: String,
    pub last_modified: i64,
}

impl ResourceDescriptor {
    pub fn new(location: impl Into<String>, last_modified: i64) -> Self {
        Self {
            location: location.into(),
            last_modified,
        }
    }
}

impl From<&ParsedEntry> for ResourceDescriptor {
    fn from(entry: &ParsedEntry) -> Self {
        Self::new(format!("{}{}", entry.path, entry.location), entry.last_modified)
    }
}

/// Body of a fetched resource, as a stream of chunks
pub type ResourceStream = BoxStream<'static, crate::Result<Bytes>>;
