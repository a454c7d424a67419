//! Region-aware edge for a commerce storefront.
//!
//! Resolves the locale segment of each request to a commerce region, keeps
//! visitors on locale-qualified URLs, and forwards everything else to the
//! storefront renderer.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
