//! Per-crawl bookkeeping
//!
//! Files are deduplicated by bare `location`, not by full path. When a
//! location is seen again, every result whose identifier ends with that
//! location is dropped and the entry is recorded as a conflict. The
//! suffix comparison can also drop unrelated results whose name merely ends
//! with the conflicting one.

use super::ResourceDescriptor;
use crate::listing::ParsedEntry;
use std::collections::HashSet;

/// State owned by one `list_resources` call
#[derive(Debug, Default)]
pub(crate) struct CrawlState {
    visited: HashSet<String>,
    results: Vec<ResourceDescriptor>,
    conflicts: Vec<ParsedEntry>,
}

impl CrawlState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a file entry, resolving name conflicts
    pub fn admit(&mut self, entry: ParsedEntry) {
        if self.visited.insert(entry.location.clone()) {
            self.results.push(ResourceDescriptor::from(&entry));
            return;
        }

        tracing::debug!(
            "Conflicting resource {} found at '{}'",
            entry.location,
            entry.path
        );
        self.results
            .retain(|descriptor| !descriptor.location.ends_with(&entry.location));
        self.conflicts.push(entry);
    }

    pub fn results(&self) -> &[ResourceDescriptor] {
        &self.results
    }

    pub fn conflicts(&self) -> &[ParsedEntry] {
        &self.conflicts
    }

    /// Reports conflicts and returns the surviving descriptors in discovery order
    pub fn finish(self) -> Vec<ResourceDescriptor> {
        if !self.conflicts.is_empty() {
            tracing::error!(
                "Resources {} won't be included, as multiple resources with the same name were found",
                join(self.conflicts.iter().map(|entry| entry.location.as_str()))
            );
        }

        tracing::debug!(
            "The following resources were found: {}",
            join(self.results.iter().map(|descriptor| descriptor.location.as_str()))
        );

        self.results
    }
}

fn join<'a>(names: impl Iterator<Item = &'a str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}
