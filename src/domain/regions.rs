//! Region records and the country-code index built from them.

use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tracing::warn;

/// A commerce-platform region as served by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionRecord {
    pub id: String,
    pub name: String,
    pub currency_code: Option<String>,
    /// ISO-3166 alpha-2 codes, lower-cased, in backend order.
    pub countries: Vec<String>,
}

impl RegionRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            currency_code: None,
            countries: Vec::new(),
        }
    }

    pub fn with_currency(mut self, currency_code: impl Into<String>) -> Self {
        self.currency_code = Some(currency_code.into());
        self
    }

    pub fn with_countries<I, S>(mut self, countries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.countries = countries
            .into_iter()
            .filter_map(|code| normalize_country_code(code.as_ref()))
            .collect();
        self
    }
}

/// Lower-case and trim a country code. Returns `None` for blank input.
pub fn normalize_country_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_ascii_lowercase())
}

/// True for a normalized ISO-3166 alpha-2 code: exactly two ASCII letters.
pub fn is_country_code(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_alphabetic())
}

/// Country code → region lookup table.
///
/// Built in one pass and never mutated afterwards. The first key inserted is
/// remembered so callers can fall back to "some" region when nothing better
/// matches.
#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    entries: HashMap<String, Arc<RegionRecord>>,
    regions: Vec<Arc<RegionRecord>>,
    first_key: Option<String>,
}

impl RegionIndex {
    /// Build an index with one entry per country claimed by each region.
    ///
    /// A country claimed by several regions points at the last claimant.
    /// Codes that are not two ASCII letters are skipped.
    pub fn build(regions: impl IntoIterator<Item = RegionRecord>) -> Self {
        let mut index = Self::default();
        for region in regions {
            let region = Arc::new(region);
            let mut claimed = false;
            for code in &region.countries {
                let Some(key) = normalize_country_code(code) else {
                    continue;
                };
                if !is_country_code(&key) {
                    warn!(
                        target = "storefront_edge::regions",
                        region = %region.id,
                        code = ?key,
                        "skipping invalid country code"
                    );
                    continue;
                }
                if index.first_key.is_none() {
                    index.first_key = Some(key.clone());
                }
                index.entries.insert(key, region.clone());
                claimed = true;
            }
            if claimed {
                index.regions.push(region);
            }
        }
        index
    }

    /// A single-entry index mapping `code` to `region`.
    pub fn single(code: &str, region: RegionRecord) -> Self {
        let key = normalize_country_code(code).unwrap_or_default();
        let region = Arc::new(region);
        let mut entries = HashMap::with_capacity(1);
        entries.insert(key.clone(), region.clone());
        Self {
            entries,
            regions: vec![region],
            first_key: Some(key),
        }
    }

    pub fn get(&self, code: &str) -> Option<&Arc<RegionRecord>> {
        let key = normalize_country_code(code)?;
        self.entries.get(&key)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    pub fn first_key(&self) -> Option<&str> {
        self.first_key.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Regions that own at least one country, in backend order.
    pub fn regions(&self) -> &[Arc<RegionRecord>] {
        &self.regions
    }

    /// `(country code, region)` pairs in unspecified order.
    pub fn countries(&self) -> impl Iterator<Item = (&str, &Arc<RegionRecord>)> {
        self.entries.iter().map(|(code, region)| (code.as_str(), region))
    }
}
