//! Region routing middleware.
//!
//! Resolves the request's region once, then either lets the request through
//! (attaching the [`Resolution`] as a request extension) or answers with a
//! 307 redirect to the locale-qualified URL. Resolution problems never fail
//! the request: without a region the request simply passes through.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use metrics::counter;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    RegionCache,
    routing::{RoutingDecision, decide, locale_segment},
};

pub(crate) const METRIC_REGION_REDIRECT_TOTAL: &str = "storefront_region_redirect_total";

pub const DEFAULT_CACHE_ID_COOKIE: &str = "_medusa_cache_id";
pub const DEFAULT_CACHE_ID_MAX_AGE_SECS: u64 = 60 * 60 * 24;
const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "api",
    "_next/static",
    "_next/image",
    "favicon.ico",
    "images",
    "assets",
    "png",
    "svg",
    "jpg",
    "jpeg",
    "gif",
    "webp",
    "_health",
];

/// Which requests take part in region routing and how clients are tagged.
#[derive(Debug, Clone)]
pub struct RoutingPolicy {
    pub cache_id_cookie: String,
    pub cache_id_max_age: Duration,
    /// Paths whose remainder after the leading `/` starts with one of these
    /// bypass region routing entirely.
    pub excluded_prefixes: Vec<String>,
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            cache_id_cookie: DEFAULT_CACHE_ID_COOKIE.to_string(),
            cache_id_max_age: Duration::from_secs(DEFAULT_CACHE_ID_MAX_AGE_SECS),
            excluded_prefixes: default_excluded_prefixes(),
        }
    }
}

impl From<&crate::config::StorefrontSettings> for RoutingPolicy {
    fn from(settings: &crate::config::StorefrontSettings) -> Self {
        Self {
            cache_id_cookie: settings.cache_id_cookie.clone(),
            cache_id_max_age: settings.cache_id_max_age,
            excluded_prefixes: settings.excluded_prefixes.clone(),
        }
    }
}

impl RoutingPolicy {
    pub fn is_excluded(&self, path: &str) -> bool {
        let rest = path.strip_prefix('/').unwrap_or(path);
        self.excluded_prefixes
            .iter()
            .any(|prefix| rest.starts_with(prefix.as_str()))
    }

    fn cache_id_cookie(&self, value: String) -> Cookie<'static> {
        let max_age = time::Duration::try_from(self.cache_id_max_age)
            .unwrap_or(time::Duration::seconds(DEFAULT_CACHE_ID_MAX_AGE_SECS as i64));
        Cookie::build((self.cache_id_cookie.clone(), value))
            .path("/")
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .build()
    }
}

pub fn default_excluded_prefixes() -> Vec<String> {
    DEFAULT_EXCLUDED_PREFIXES
        .iter()
        .map(|prefix| (*prefix).to_string())
        .collect()
}

/// Shared state for [`region_routing_layer`].
#[derive(Clone)]
pub struct RegionState {
    pub cache: Arc<RegionCache>,
    pub policy: Arc<RoutingPolicy>,
}

/// Middleware applying region resolution and locale redirects.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn region_routing_layer(
    State(state): State<RegionState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if state.policy.is_excluded(&path) {
        return next.run(request).await;
    }

    let cookie_value = jar
        .get(&state.policy.cache_id_cookie)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty());
    let has_cache_id = cookie_value.is_some();
    let cache_id = cookie_value.unwrap_or_else(|| Uuid::new_v4().to_string());

    let resolution = state.cache.resolve(locale_segment(&path), &cache_id).await;
    let decision = decide(
        &path,
        request.uri().query(),
        resolution.as_ref().map(|r| r.country_code.as_str()),
        has_cache_id,
    );

    match decision {
        RoutingDecision::PassThrough => {
            debug!(
                region = resolution.as_ref().map(|r| r.region.id.as_str()),
                outcome = "pass_through",
                "region routing"
            );
            if let Some(resolution) = resolution {
                request.extensions_mut().insert(resolution);
            }
            next.run(request).await
        }
        RoutingDecision::IssueCacheId { location } => {
            debug!(outcome = "issue_cache_id", %location, "region routing");
            counter!(METRIC_REGION_REDIRECT_TOTAL, "reason" => "cache_id").increment(1);
            let jar = jar.add(state.policy.cache_id_cookie(cache_id));
            (jar, Redirect::temporary(&location)).into_response()
        }
        RoutingDecision::RedirectToLocale { location } => {
            debug!(outcome = "redirect", %location, "region routing");
            counter!(METRIC_REGION_REDIRECT_TOTAL, "reason" => "locale_missing").increment(1);
            Redirect::temporary(&location).into_response()
        }
    }
}
