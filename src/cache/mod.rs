//! Region resolution cache.
//!
//! Maps a request's locale path segment to a commerce region:
//!
//! - [`RegionCache`] holds the published country → region snapshot and
//!   refreshes it lazily from a [`RegionSource`] once it goes stale.
//! - [`resolve_country`] is the lookup policy (segment, default region,
//!   first-inserted region).
//! - [`region_routing_layer`] applies the result to HTTP requests, issuing
//!   307 redirects to locale-qualified URLs.
//!
//! ## Configuration
//!
//! ```toml
//! [regions]
//! default_region = "us"
//! refresh_interval_seconds = 3600
//! fallback_name = "United States"
//! ```

mod clock;
mod config;
mod lock;
mod middleware;
mod resolve;
mod routing;
mod source;
mod store;

pub(crate) use lock::mutex_lock;

pub use clock::{Clock, SystemClock};
pub use config::{
    DEFAULT_FALLBACK_NAME, DEFAULT_REFRESH_INTERVAL_SECS, DEFAULT_REGION, RegionCacheConfig,
};
pub use middleware::{
    DEFAULT_CACHE_ID_COOKIE, DEFAULT_CACHE_ID_MAX_AGE_SECS, RegionState, RoutingPolicy,
    default_excluded_prefixes, region_routing_layer,
};
pub use resolve::{Resolution, resolve_country};
pub use routing::{RoutingDecision, decide, locale_segment};
pub use source::{RegionSource, SourceError};
pub use store::{RefreshError, RegionCache, RegionSnapshot, SnapshotOrigin};

pub(crate) use middleware::METRIC_REGION_REDIRECT_TOTAL;
pub(crate) use store::METRIC_REGION_REFRESH_TOTAL;
