mod introspection;
mod middleware;
pub mod proxy;

use std::sync::Arc;

use axum::{Router, middleware as axum_middleware, routing::get};

use crate::cache::{RegionState, region_routing_layer};

pub use introspection::RegionsView;
pub use middleware::RequestContext;
pub use proxy::{COUNTRY_CODE_HEADER, REGION_ID_HEADER, StorefrontProxy};

#[derive(Clone)]
pub struct HttpState {
    pub regions: RegionState,
    pub proxy: Option<Arc<StorefrontProxy>>,
}

/// The edge router.
///
/// Introspection routes are served locally and skip region routing. Every
/// other request goes through [`region_routing_layer`] and, when let
/// through, to the storefront upstream.
pub fn build_router(state: HttpState) -> Router {
    let introspection = Router::new()
        .route("/_health", get(introspection::health))
        .route("/api/regions", get(introspection::list_regions))
        .with_state(state.clone());

    let storefront = Router::new()
        .fallback(proxy::forward)
        .with_state(state.clone())
        .layer(axum_middleware::from_fn_with_state(
            state.regions.clone(),
            region_routing_layer,
        ));

    introspection
        .merge(storefront)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}
