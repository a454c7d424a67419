use std::collections::BTreeMap;

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

use crate::{cache::RegionSnapshot, domain::regions::RegionRecord};

use super::HttpState;

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RegionsView {
    pub origin: &'static str,
    pub refreshed_at: Option<String>,
    pub countries: BTreeMap<String, String>,
    pub regions: Vec<RegionRecord>,
}

impl RegionsView {
    pub fn empty() -> Self {
        Self {
            origin: "none",
            refreshed_at: None,
            countries: BTreeMap::new(),
            regions: Vec::new(),
        }
    }
}

impl From<&RegionSnapshot> for RegionsView {
    fn from(snapshot: &RegionSnapshot) -> Self {
        let countries = snapshot
            .index
            .countries()
            .map(|(code, region)| (code.to_string(), region.id.clone()))
            .collect();
        let regions = snapshot
            .index
            .regions()
            .iter()
            .map(|region| RegionRecord::clone(region))
            .collect();

        Self {
            origin: snapshot.origin.as_str(),
            refreshed_at: snapshot.refreshed_at.format(&Rfc3339).ok(),
            countries,
            regions,
        }
    }
}

pub async fn health() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// The held snapshot; never triggers a refresh.
pub async fn list_regions(State(state): State<HttpState>) -> Json<RegionsView> {
    let view = state
        .regions
        .cache
        .published()
        .map(|snapshot| RegionsView::from(snapshot.as_ref()))
        .unwrap_or_else(RegionsView::empty);
    Json(view)
}
