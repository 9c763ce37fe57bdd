use std::collections::HashSet;

use url::Url;

/// Resolve a possibly-relative link against the page it was found on.
/// Unparseable bases or links are passed through unchanged.
pub fn resolve_link(base: &str, link: &str) -> String {
    match Url::parse(base).and_then(|b| b.join(link)) {
        Ok(joined) => joined.to_string(),
        Err(_) => link.to_string(),
    }
}

/// Resolve every link against `base`, dropping repeats but keeping first-seen order.
pub fn resolve_unique(base: &str, links: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .map(|l| resolve_link(base, &l))
        .filter(|l| seen.insert(l.clone()))
        .collect()
}

/// Final non-empty path segment of a link, used as the downloaded file's name.
pub fn file_name_from_url(link: &str) -> Option<String> {
    let segment = match Url::parse(link) {
        Ok(url) => url
            .path_segments()
            .and_then(|mut s| s.next_back())
            .map(str::to_string),
        Err(_) => link
            .split(['?', '#'])
            .next()
            .and_then(|p| p.rsplit('/').next())
            .map(str::to_string),
    }?;
    if segment.is_empty() || segment == "." || segment == ".." {
        None
    } else {
        Some(segment)
    }
}
