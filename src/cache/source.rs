//! Where region lists come from.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::regions::RegionRecord;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("region request failed: {0}")]
    Transport(String),
    #[error("backend answered with status {status}")]
    Status { status: u16 },
    #[error("region response could not be decoded: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }

    /// Short label used for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Transport(_) => "transport",
            SourceError::Status { .. } => "status",
            SourceError::Decode(_) => "decode",
        }
    }
}

/// Fetches the full region list from the commerce backend.
///
/// `cache_id` correlates the call with a client so transport-level caches can
/// tag their entries per client.
#[async_trait]
pub trait RegionSource: Send + Sync {
    async fn fetch_regions(&self, cache_id: &str) -> Result<Vec<RegionRecord>, SourceError>;
}
