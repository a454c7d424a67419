//! Region snapshot storage and lazy refresh.
//!
//! The cache holds at most one published [`RegionSnapshot`]. Requests read it
//! under a short lock and refresh it lazily once it is older than the
//! configured interval. Refreshes are not serialized: concurrent stale
//! requests may each fetch and publish, and the last complete snapshot wins.
//! A failed refresh never replaces what is already published.

use std::sync::{Arc, RwLock};

use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::domain::regions::{RegionIndex, RegionRecord};

use super::{
    clock::Clock,
    config::RegionCacheConfig,
    lock::{rw_read, rw_write},
    resolve::{Resolution, resolve_country},
    source::{RegionSource, SourceError},
};

const SOURCE: &str = "cache::store";
pub(crate) const METRIC_REGION_REFRESH_TOTAL: &str = "storefront_region_refresh_total";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Backend,
    Fallback,
}

impl SnapshotOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            SnapshotOrigin::Backend => "backend",
            SnapshotOrigin::Fallback => "fallback",
        }
    }
}

/// A fully built index plus the time it was built.
#[derive(Debug, Clone)]
pub struct RegionSnapshot {
    pub index: RegionIndex,
    pub refreshed_at: OffsetDateTime,
    pub origin: SnapshotOrigin,
}

impl RegionSnapshot {
    /// True once strictly more than `interval` has passed since the build.
    pub fn is_stale(&self, now: OffsetDateTime, interval: std::time::Duration) -> bool {
        let elapsed = now - self.refreshed_at;
        elapsed > interval
    }
}

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("backend returned no regions with countries")]
    Empty,
}

impl RefreshError {
    fn outcome(&self) -> &'static str {
        match self {
            RefreshError::Source(err) => err.kind(),
            RefreshError::Empty => "empty",
        }
    }
}

/// Country → region cache backed by a [`RegionSource`].
pub struct RegionCache {
    config: RegionCacheConfig,
    source: Option<Arc<dyn RegionSource>>,
    clock: Arc<dyn Clock>,
    published: RwLock<Option<Arc<RegionSnapshot>>>,
    fallback: Arc<RegionSnapshot>,
}

impl RegionCache {
    /// Create a cache. A `None` source means the backend is not configured
    /// and every lookup is answered from the synthetic fallback region.
    pub fn new(
        config: RegionCacheConfig,
        source: Option<Arc<dyn RegionSource>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fallback_code = config.fallback_code();
        let fallback = Arc::new(RegionSnapshot {
            index: RegionIndex::single(
                &fallback_code,
                RegionRecord::new(fallback_code.clone(), config.fallback_name.clone())
                    .with_countries([fallback_code.as_str()]),
            ),
            refreshed_at: clock.now(),
            origin: SnapshotOrigin::Fallback,
        });

        if source.is_none() {
            warn!(
                target = "storefront_edge::regions",
                fallback_region = %fallback_code,
                "commerce backend URL is not configured; serving the default region only"
            );
        }

        Self {
            config,
            source,
            clock,
            published: RwLock::new(None),
            fallback,
        }
    }

    pub fn config(&self) -> &RegionCacheConfig {
        &self.config
    }

    /// The published snapshot, without triggering a refresh.
    pub fn published(&self) -> Option<Arc<RegionSnapshot>> {
        rw_read(&self.published, SOURCE, "published").clone()
    }

    /// Resolve `segment` against the current snapshot, refreshing first if
    /// the snapshot is missing or stale.
    pub async fn resolve(&self, segment: Option<&str>, cache_id: &str) -> Option<Resolution> {
        let snapshot = self.current(cache_id).await;
        resolve_country(
            &snapshot.index,
            segment,
            self.config.default_region.as_deref(),
        )
    }

    /// The snapshot requests should be served from right now.
    ///
    /// Refreshes when needed. On failure returns the previously published
    /// snapshot, or the fallback when nothing has been published yet.
    #[instrument(skip(self), level = "debug")]
    pub async fn current(&self, cache_id: &str) -> Arc<RegionSnapshot> {
        let Some(source) = self.source.as_ref() else {
            counter!(METRIC_REGION_REFRESH_TOTAL, "outcome" => "unconfigured").increment(1);
            return self.fallback.clone();
        };

        let held = self.published();
        if let Some(snapshot) = held.as_ref() {
            if !snapshot.is_stale(self.clock.now(), self.config.refresh_interval) {
                return snapshot.clone();
            }
        }

        match self.refresh_from(source.as_ref(), cache_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                let serving = if held.is_some() { "previous" } else { "fallback" };
                warn!(
                    target = "storefront_edge::regions",
                    error = %err,
                    outcome = err.outcome(),
                    serving,
                    "region refresh failed"
                );
                counter!(METRIC_REGION_REFRESH_TOTAL, "outcome" => err.outcome()).increment(1);
                held.unwrap_or_else(|| self.fallback.clone())
            }
        }
    }

    /// Fetch, build and publish a new snapshot unconditionally.
    pub async fn refresh(&self, cache_id: &str) -> Result<Arc<RegionSnapshot>, RefreshError> {
        match self.source.as_ref() {
            Some(source) => self.refresh_from(source.as_ref(), cache_id).await,
            None => Ok(self.fallback.clone()),
        }
    }

    async fn refresh_from(
        &self,
        source: &dyn RegionSource,
        cache_id: &str,
    ) -> Result<Arc<RegionSnapshot>, RefreshError> {
        debug!(target = "storefront_edge::regions", "refreshing region index");

        let regions = source.fetch_regions(cache_id).await?;
        let region_count = regions.len();
        let index = RegionIndex::build(regions);
        if index.is_empty() {
            return Err(RefreshError::Empty);
        }

        let snapshot = Arc::new(RegionSnapshot {
            index,
            refreshed_at: self.clock.now(),
            origin: SnapshotOrigin::Backend,
        });
        *rw_write(&self.published, SOURCE, "publish") = Some(snapshot.clone());

        info!(
            target = "storefront_edge::regions",
            regions = region_count,
            countries = snapshot.index.len(),
            "region index refreshed"
        );
        counter!(METRIC_REGION_REFRESH_TOTAL, "outcome" => "success").increment(1);

        Ok(snapshot)
    }
}
