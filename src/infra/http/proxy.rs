//! Pass-through to the storefront renderer.
//!
//! Requests that the region layer lets through are replayed against the
//! configured upstream origin. Responses, including redirects, are relayed
//! back verbatim apart from hop-by-hop headers.

use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode, header},
    response::{IntoResponse, Response},
};
use reqwest::{Client, redirect::Policy};
use url::Url;

use crate::{
    application::error::HttpError,
    cache::Resolution,
    config::StorefrontSettings,
    infra::{backend::user_agent, error::InfraError},
};

use super::HttpState;

const SOURCE: &str = "infra::http::proxy";
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

pub const REGION_ID_HEADER: &str = "x-storefront-region-id";
pub const COUNTRY_CODE_HEADER: &str = "x-storefront-country-code";

const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::HOST,
    header::CONTENT_LENGTH,
];

#[derive(Debug, Clone)]
pub struct StorefrontProxy {
    client: Client,
    upstream: Url,
    max_body_bytes: usize,
}

impl StorefrontProxy {
    pub fn new(upstream: Url, max_body_bytes: usize) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .redirect(Policy::none())
            .timeout(UPSTREAM_TIMEOUT)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            upstream,
            max_body_bytes,
        })
    }

    /// Build a proxy from settings; `None` when no upstream is configured.
    pub fn from_settings(settings: &StorefrontSettings) -> Result<Option<Self>, InfraError> {
        let Some(upstream) = settings.upstream_url.clone() else {
            return Ok(None);
        };
        let max_body_bytes = usize::try_from(settings.max_body_bytes.get())
            .map_err(|_| InfraError::configuration("storefront.max_body_bytes exceeds usize"))?;
        Self::new(upstream, max_body_bytes).map(Some)
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Replay `request` against the upstream origin.
    pub async fn forward(&self, request: Request<Body>) -> Result<Response, HttpError> {
        let (parts, body) = request.into_parts();
        let target = self.target_url(parts.uri.path(), parts.uri.query());

        let body = axum::body::to_bytes(body, self.max_body_bytes)
            .await
            .map_err(|err| {
                HttpError::new(
                    SOURCE,
                    StatusCode::PAYLOAD_TOO_LARGE,
                    "Request body too large",
                    err.to_string(),
                )
            })?;

        let mut headers = forwardable_headers(&parts.headers);
        if let Some(resolution) = parts.extensions.get::<Resolution>() {
            annotate_region(&mut headers, resolution);
        }

        let upstream = self
            .client
            .request(parts.method, target)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|err| {
                HttpError::from_error(
                    SOURCE,
                    StatusCode::BAD_GATEWAY,
                    "Storefront unavailable",
                    &err,
                )
            })?;

        let status = upstream.status();
        let headers = forwardable_headers(upstream.headers());
        let bytes = upstream.bytes().await.map_err(|err| {
            HttpError::from_error(
                SOURCE,
                StatusCode::BAD_GATEWAY,
                "Storefront unavailable",
                &err,
            )
        })?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }

    fn target_url(&self, path: &str, query: Option<&str>) -> Url {
        let mut url = self.upstream.clone();
        url.set_path(path);
        url.set_query(query);
        url
    }
}

/// Fallback handler for every request that is not served locally.
pub async fn forward(State(state): State<HttpState>, request: Request<Body>) -> Response {
    let Some(proxy) = state.proxy.as_ref() else {
        return HttpError::new(
            SOURCE,
            StatusCode::SERVICE_UNAVAILABLE,
            "Storefront unavailable",
            "no storefront upstream is configured",
        )
        .into_response();
    };

    match proxy.forward(request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

fn forwardable_headers(source: &HeaderMap) -> HeaderMap {
    let mut headers = source.clone();
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove("keep-alive");
    headers
}

fn annotate_region(headers: &mut HeaderMap, resolution: &Resolution) {
    if let Ok(value) = HeaderValue::from_str(resolution.region_id()) {
        headers.insert(REGION_ID_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&resolution.country_code) {
        headers.insert(COUNTRY_CODE_HEADER, value);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::domain::regions::RegionRecord;

    use super::*;

    #[test]
    fn target_url_replaces_path_and_query() {
        let proxy = StorefrontProxy::new(
            Url::parse("http://renderer:3000").expect("url"),
            1024,
        )
        .expect("proxy");

        assert_eq!(
            proxy.target_url("/us/store", Some("page=2")).as_str(),
            "http://renderer:3000/us/store?page=2"
        );
        assert_eq!(
            proxy.target_url("/us", None).as_str(),
            "http://renderer:3000/us"
        );
    }

    #[test]
    fn hop_by_hop_headers_are_dropped() {
        let mut source = HeaderMap::new();
        source.insert(header::HOST, HeaderValue::from_static("edge.local"));
        source.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        source.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        source.insert(header::COOKIE, HeaderValue::from_static("_medusa_cache_id=abc"));

        let headers = forwardable_headers(&source);
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get("keep-alive").is_none());
        assert_eq!(
            headers.get(header::COOKIE),
            Some(&HeaderValue::from_static("_medusa_cache_id=abc"))
        );
    }

    #[test]
    fn region_headers_are_added() {
        let mut headers = HeaderMap::new();
        let resolution = Resolution {
            country_code: "dk".to_string(),
            region: Arc::new(RegionRecord::new("reg_eu", "Europe")),
        };

        annotate_region(&mut headers, &resolution);
        assert_eq!(
            headers.get(REGION_ID_HEADER),
            Some(&HeaderValue::from_static("reg_eu"))
        );
        assert_eq!(
            headers.get(COUNTRY_CODE_HEADER),
            Some(&HeaderValue::from_static("dk"))
        );
    }
}
