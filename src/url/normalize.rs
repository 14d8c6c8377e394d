/// Collapses duplicate path separators in a URL
///
/// Every run of two or more `/` becomes a single `/`, except the run
/// immediately following an `http:` or `https:` scheme, which becomes `//`.
/// The input is not otherwise parsed or validated.
///
/// # Arguments
///
/// * `url` - The URL text to normalize
///
/// # Returns
///
/// The URL with duplicate separators collapsed
///
/// # Examples
///
/// ```
/// use nar_harvest::url::normalize_url;
///
/// assert_eq!(
///     normalize_url("https://repo.example.com//nars///dir1/"),
///     "https://repo.example.com/nars/dir1/"
/// );
/// ```
pub fn normalize_url(url: &str) -> String {
    let mut normalized = String::with_capacity(url.len());
    let mut chars = url.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '/' {
            normalized.push(c);
            continue;
        }

        let mut run = 1;
        while chars.next_if_eq(&'/').is_some() {
            run += 1;
        }

        let after_scheme = normalized.ends_with("http:") || normalized.ends_with("https:");
        if run > 1 && after_scheme {
            normalized.push_str("//");
        } else {
            normalized.push('/');
        }
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_scheme_separator() {
        assert_eq!(normalize_url("https://example.com/a"), "https://example.com/a");
        assert_eq!(normalize_url("http://example.com/a"), "http://example.com/a");
    }

    #[test]
    fn test_collapses_path_separators() {
        assert_eq!(
            normalize_url("https://example.com//a///b/"),
            "https://example.com/a/b/"
        );
        assert_eq!(normalize_url("https://example.com/a//"), "https://example.com/a/");
    }

    #[test]
    fn test_extra_slashes_after_scheme() {
        assert_eq!(normalize_url("https:///example.com"), "https://example.com");
    }

    #[test]
    fn test_other_schemes_are_collapsed() {
        assert_eq!(normalize_url("ftp://example.com"), "ftp:/example.com");
    }

    #[test]
    fn test_single_slashes_untouched() {
        assert_eq!(normalize_url("a/b/c"), "a/b/c");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn test_is_idempotent() {
        let once = normalize_url("http://localhost:8080//nars//dir1///nar/");
        assert_eq!(normalize_url(&once), once);
    }
}
