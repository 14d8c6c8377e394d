/// One row of a directory listing
///
/// `path` is the listing URL relative to the provider's base URL, so that
/// `path + location` identifies the entry. Directories carry no meaningful
/// timestamp and always report `last_modified == 0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedEntry {
    pub location: String,
    pub last_modified: i64,
    pub path: String,
    pub directory: bool,
}

impl ParsedEntry {
    /// Creates a directory entry
    pub fn directory(location: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified: 0,
            path: path.into(),
            directory: true,
        }
    }

    /// Creates a file entry
    pub fn file(location: impl Into<String>, last_modified: i64, path: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            last_modified,
            path: path.into(),
            directory: false,
        }
    }
}
