//! URL composition for listing traversal
//!
//! Listing URLs are built by plain string concatenation from the base URL,
//! the path an entry was discovered at, and its location, then normalized
//! by collapsing duplicate separators.

mod normalize;

pub use normalize::normalize_url;

use crate::listing::ParsedEntry;

/// Composes the listing URL of a directory entry
///
/// The URL is `base + entry.path + "/" + entry.location + "/" + nar_location`,
/// normalized.
///
/// # Examples
///
/// ```
/// use nar_harvest::url::compose_directory_url;
/// use nar_harvest::ParsedEntry;
///
/// let entry = ParsedEntry::directory("dir1/", "");
/// assert_eq!(
///     compose_directory_url("https://repo.example.com/", &entry, "nars/"),
///     "https://repo.example.com/dir1/nars/"
/// );
/// ```
pub fn compose_directory_url(base_url: &str, entry: &ParsedEntry, nar_location: &str) -> String {
    normalize_url(&format!(
        "{}{}/{}/{}",
        base_url, entry.path, entry.location, nar_location
    ))
}

/// Returns `url` with every occurrence of `base_url` removed
///
/// For URLs composed from the base this is the path relative to it.
pub fn relative_path(url: &str, base_url: &str) -> String {
    url.replace(base_url, "")
}
