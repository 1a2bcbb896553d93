//! Filename extraction from URL path.

/// Extracts the last path segment from a URL for use as a filename hint.
/// The query string and fragment are ignored; percent-escapes are kept as-is.
///
/// Returns `None` if the URL cannot be parsed or the path is empty/root.
pub fn filename_from_url_path(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.filter(|s| !s.is_empty()).last()?;
    if segment == "." || segment == ".." {
        return None;
    }
    Some(segment.to_string())
}
