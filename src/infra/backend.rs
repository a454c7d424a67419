//! Commerce backend adapter: the HTTP region source.
//!
//! Successful region listings are kept in a small LRU keyed by the client's
//! cache tag (`regions-{cache_id}`) for the configured revalidate window, so
//! an identical request inside that window never leaves the process.

use std::{
    num::NonZeroUsize,
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use reqwest::{Client, header::ACCEPT};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::{
    cache::{RegionSource, SourceError, mutex_lock},
    config::BackendSettings,
    domain::regions::RegionRecord,
};

use super::error::InfraError;

const SOURCE: &str = "infra::backend";
const PUBLISHABLE_KEY_HEADER: &str = "x-publishable-api-key";
pub(crate) const METRIC_TRANSPORT_CACHE_HIT_TOTAL: &str =
    "storefront_region_transport_cache_hit_total";

#[derive(Debug, Deserialize)]
struct RegionListResponse {
    #[serde(default)]
    regions: Vec<StoreRegion>,
}

#[derive(Debug, Deserialize)]
struct StoreRegion {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    currency_code: Option<String>,
    #[serde(default)]
    countries: Option<Vec<StoreCountry>>,
}

#[derive(Debug, Deserialize)]
struct StoreCountry {
    #[serde(default)]
    iso_2: Option<String>,
}

impl From<StoreRegion> for RegionRecord {
    fn from(region: StoreRegion) -> Self {
        let countries = region
            .countries
            .unwrap_or_default()
            .into_iter()
            .filter_map(|country| country.iso_2);
        let record = RegionRecord::new(region.id, region.name).with_countries(countries);
        match region.currency_code {
            Some(code) => record.with_currency(code),
            None => record,
        }
    }
}

struct TransportEntry {
    fetched_at: Instant,
    regions: Vec<RegionRecord>,
}

/// [`RegionSource`] calling `GET {backend}/store/regions`.
pub struct HttpRegionSource {
    client: Client,
    endpoint: Url,
    publishable_key: Option<String>,
    revalidate: Duration,
    responses: Mutex<LruCache<String, TransportEntry>>,
}

impl HttpRegionSource {
    pub fn new(
        base_url: &Url,
        publishable_key: Option<String>,
        timeout: Duration,
        revalidate: Duration,
        cache_entries: NonZeroUsize,
    ) -> Result<Self, InfraError> {
        let endpoint = regions_endpoint(base_url)?;
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            publishable_key,
            revalidate,
            responses: Mutex::new(LruCache::new(cache_entries)),
        })
    }

    /// Build a source from settings; `None` when no backend URL is configured.
    pub fn from_settings(settings: &BackendSettings) -> Result<Option<Self>, InfraError> {
        settings
            .url
            .as_ref()
            .map(|url| {
                Self::new(
                    url,
                    settings.publishable_key.clone(),
                    settings.timeout,
                    settings.revalidate,
                    settings.transport_cache_entries,
                )
            })
            .transpose()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn cached(&self, tag: &str) -> Option<Vec<RegionRecord>> {
        let mut responses = mutex_lock(&self.responses, SOURCE, "cached");
        let fresh = responses
            .get(tag)
            .map(|entry| entry.fetched_at.elapsed() <= self.revalidate)?;
        if fresh {
            responses.get(tag).map(|entry| entry.regions.clone())
        } else {
            responses.pop(tag);
            None
        }
    }

    fn remember(&self, tag: String, regions: Vec<RegionRecord>) {
        let entry = TransportEntry {
            fetched_at: Instant::now(),
            regions,
        };
        mutex_lock(&self.responses, SOURCE, "remember").put(tag, entry);
    }
}

#[async_trait]
impl RegionSource for HttpRegionSource {
    async fn fetch_regions(&self, cache_id: &str) -> Result<Vec<RegionRecord>, SourceError> {
        let tag = cache_tag(cache_id);
        if let Some(regions) = self.cached(&tag) {
            debug!(target = "storefront_edge::regions", %tag, "region list served from transport cache");
            counter!(METRIC_TRANSPORT_CACHE_HIT_TOTAL).increment(1);
            return Ok(regions);
        }

        let mut request = self
            .client
            .get(self.endpoint.clone())
            .header(ACCEPT, "application/json");
        if let Some(key) = self.publishable_key.as_deref() {
            request = request.header(PUBLISHABLE_KEY_HEADER, key);
        }

        let response = request.send().await.map_err(SourceError::transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }

        let body: RegionListResponse = response.json().await.map_err(SourceError::decode)?;
        let regions: Vec<RegionRecord> = body.regions.into_iter().map(RegionRecord::from).collect();

        if !regions.is_empty() {
            self.remember(tag, regions.clone());
        }
        Ok(regions)
    }
}

/// Transport cache tag for a client correlation id.
pub fn cache_tag(cache_id: &str) -> String {
    format!("regions-{cache_id}")
}

pub fn user_agent() -> &'static str {
    concat!("storefront-edge/", env!("CARGO_PKG_VERSION"))
}

/// `{base}/store/regions`, keeping any path prefix on the base URL.
fn regions_endpoint(base: &Url) -> Result<Url, InfraError> {
    let raw = format!("{}/store/regions", base.as_str().trim_end_matches('/'));
    Url::parse(&raw)
        .map_err(|err| InfraError::configuration(format!("invalid backend URL `{raw}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_appends_store_regions() {
        let base = Url::parse("http://localhost:9000").expect("url");
        assert_eq!(
            regions_endpoint(&base).expect("endpoint").as_str(),
            "http://localhost:9000/store/regions"
        );
    }

    #[test]
    fn endpoint_keeps_path_prefix() {
        let base = Url::parse("https://shop.example.com/commerce/").expect("url");
        assert_eq!(
            regions_endpoint(&base).expect("endpoint").as_str(),
            "https://shop.example.com/commerce/store/regions"
        );
    }

    #[test]
    fn wire_region_converts_to_record() {
        let body: RegionListResponse = serde_json::from_str(
            r#"{"regions":[{"id":"reg_eu","name":"Europe","currency_code":"eur",
                "countries":[{"iso_2":"DE","iso_3":"deu"},{"iso_2":null},{"iso_2":"fr"}]},
                {"id":"reg_bare"}]}"#,
        )
        .expect("valid body");

        let records: Vec<RegionRecord> = body.regions.into_iter().map(RegionRecord::from).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "reg_eu");
        assert_eq!(records[0].currency_code.as_deref(), Some("eur"));
        assert_eq!(records[0].countries, vec!["de", "fr"]);
        assert!(records[1].countries.is_empty());
        assert_eq!(records[1].name, "");
    }

    #[test]
    fn missing_regions_field_is_empty_list() {
        let body: RegionListResponse = serde_json::from_str("{}").expect("valid body");
        assert!(body.regions.is_empty());
    }

    #[test]
    fn cache_tag_format() {
        assert_eq!(cache_tag("abc"), "regions-abc");
    }
}
