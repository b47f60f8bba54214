use crate::browser::LoadedPage;

/// Host is throttling us: HTTP 429, or a throttling page served with 200.
pub fn is_rate_limited(page: &LoadedPage) -> bool {
    page.status == Some(429)
        || page.title().contains("429")
        || page.visible_text().contains("Too many requests")
}

/// Listing no longer exists: HTTP 404/410, or a not-found page served with 200.
pub fn is_not_found(page: &LoadedPage) -> bool {
    if matches!(page.status, Some(404) | Some(410)) {
        return true;
    }
    let title = page.title();
    title.contains("404") || title.contains("Not Found")
}
