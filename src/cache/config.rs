//! Region cache configuration.

use std::time::Duration;

use crate::domain::regions::normalize_country_code;

pub const DEFAULT_REGION: &str = "us";
pub const DEFAULT_FALLBACK_NAME: &str = "United States";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;

/// Knobs for [`RegionCache`](super::RegionCache).
#[derive(Debug, Clone)]
pub struct RegionCacheConfig {
    /// Country code preferred when the request names no known country.
    pub default_region: Option<String>,
    /// Maximum age of a snapshot before the next request refreshes it.
    pub refresh_interval: Duration,
    /// Display name of the synthetic region served when no snapshot exists.
    pub fallback_name: String,
}

impl Default for RegionCacheConfig {
    fn default() -> Self {
        Self {
            default_region: Some(DEFAULT_REGION.to_string()),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            fallback_name: DEFAULT_FALLBACK_NAME.to_string(),
        }
    }
}

impl From<&crate::config::RegionSettings> for RegionCacheConfig {
    fn from(settings: &crate::config::RegionSettings) -> Self {
        Self {
            default_region: settings.default_region.clone(),
            refresh_interval: settings.refresh_interval,
            fallback_name: settings.fallback_name.clone(),
        }
    }
}

impl RegionCacheConfig {
    /// Key of the synthetic fallback entry.
    pub fn fallback_code(&self) -> String {
        self.default_region
            .as_deref()
            .and_then(normalize_country_code)
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}
