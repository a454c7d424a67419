//! Locale segment → region resolution over a built index.

use std::sync::Arc;

use crate::domain::regions::{RegionIndex, RegionRecord, normalize_country_code};

/// Outcome of a successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Index key that matched, lower-cased.
    pub country_code: String,
    pub region: Arc<RegionRecord>,
}

impl Resolution {
    pub fn region_id(&self) -> &str {
        &self.region.id
    }
}

/// Pick a region for `segment`.
///
/// Preference order: the segment itself, then `default_region`, then the
/// first key inserted into the index. `None` when the index is empty.
pub fn resolve_country(
    index: &RegionIndex,
    segment: Option<&str>,
    default_region: Option<&str>,
) -> Option<Resolution> {
    let requested = segment.and_then(normalize_country_code);
    let default_region = default_region.and_then(normalize_country_code);

    let code = requested
        .filter(|code| index.contains(code))
        .or_else(|| default_region.filter(|code| index.contains(code)))
        .or_else(|| index.first_key().map(str::to_string))?;

    let region = index.get(&code)?.clone();
    Some(Resolution {
        country_code: code,
        region,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us_only() -> RegionIndex {
        RegionIndex::build([RegionRecord::new("reg_us", "United States").with_countries(["us"])])
    }

    fn two_regions() -> RegionIndex {
        RegionIndex::build([
            RegionRecord::new("reg_eu", "Europe").with_countries(["de", "fr"]),
            RegionRecord::new("reg_us", "United States").with_countries(["us"]),
        ])
    }

    #[test]
    fn known_segment_resolves_to_its_region() {
        let resolution = resolve_country(&us_only(), Some("us"), None).expect("resolution");
        assert_eq!(resolution.region_id(), "reg_us");
        assert_eq!(resolution.country_code, "us");
    }

    #[test]
    fn segment_is_lower_cased() {
        let resolution = resolve_country(&two_regions(), Some("FR"), Some("us")).expect("resolution");
        assert_eq!(resolution.country_code, "fr");
        assert_eq!(resolution.region_id(), "reg_eu");
    }

    #[test]
    fn unknown_segment_uses_default_region() {
        let resolution = resolve_country(&us_only(), Some("ca"), Some("us")).expect("resolution");
        assert_eq!(resolution.region_id(), "reg_us");
        assert_eq!(resolution.country_code, "us");
    }

    #[test]
    fn unknown_default_falls_back_to_first_key() {
        let resolution = resolve_country(&two_regions(), Some("ca"), Some("jp")).expect("resolution");
        assert_eq!(resolution.country_code, "de");
        assert_eq!(resolution.region_id(), "reg_eu");
    }

    #[test]
    fn missing_segment_without_default_uses_first_key() {
        let resolution = resolve_country(&two_regions(), None, None).expect("resolution");
        assert_eq!(resolution.country_code, "de");
    }

    #[test]
    fn empty_index_fails_closed() {
        assert!(resolve_country(&RegionIndex::default(), Some("ca"), None).is_none());
        assert!(resolve_country(&RegionIndex::default(), Some("us"), Some("us")).is_none());
    }

    #[test]
    fn every_indexed_country_resolves_to_its_owner() {
        let index = two_regions();
        for (code, region) in index.countries() {
            let resolution = resolve_country(&index, Some(code), None).expect("resolution");
            assert_eq!(resolution.region_id(), region.id);
        }
    }
}
