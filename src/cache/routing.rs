//! Redirect decisions for locale-qualified storefront URLs.

/// What the routing layer should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Hand the request to the storefront unchanged.
    PassThrough,
    /// The URL already names the region but the client has no correlation
    /// cookie yet: set it and send the client back to the same URL.
    IssueCacheId { location: String },
    /// Send the client to the locale-qualified URL.
    RedirectToLocale { location: String },
}

/// Non-empty first path segment, e.g. `"us"` for `/us/store`.
pub fn locale_segment(path: &str) -> Option<&str> {
    path.split('/').nth(1).filter(|segment| !segment.is_empty())
}

/// Decide how to route a request for `path`/`query` given the resolved
/// country code (if any) and whether the correlation cookie was sent.
pub fn decide(
    path: &str,
    query: Option<&str>,
    resolved_code: Option<&str>,
    has_cache_id: bool,
) -> RoutingDecision {
    let query = query.filter(|q| !q.is_empty());
    let has_locale = match (resolved_code, locale_segment(path)) {
        (Some(code), Some(segment)) => segment.eq_ignore_ascii_case(code),
        _ => false,
    };

    if has_locale {
        if has_cache_id {
            return RoutingDecision::PassThrough;
        }
        return RoutingDecision::IssueCacheId {
            location: with_query(path.to_string(), query),
        };
    }

    if path.contains('.') {
        return RoutingDecision::PassThrough;
    }

    match resolved_code {
        Some(code) => {
            let rest = if path == "/" { "" } else { path };
            RoutingDecision::RedirectToLocale {
                location: with_query(format!("/{code}{rest}"), query),
            }
        }
        None => RoutingDecision::PassThrough,
    }
}

fn with_query(mut location: String, query: Option<&str>) -> String {
    if let Some(query) = query {
        location.push('?');
        location.push_str(query);
    }
    location
}
