/// Canonical identity of a listing: its URL with the query string removed.
///
/// Tracking and pagination parameters (`?surface_type=category&page=2`, ...)
/// are the only thing that differs between two links to the same listing, so
/// the query-less form is the dedup key everywhere. Parsed URLs always come
/// back in normalized form (lowercase host, root path); input that does not
/// parse as an absolute URL is returned unchanged.
pub fn canonicalize(raw: &str) -> String {
    let Ok(mut parsed) = url::Url::parse(raw) else {
        return raw.to_string();
    };

    parsed.set_query(None);
    parsed.to_string()
}
