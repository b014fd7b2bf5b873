//! The request store trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{ObservationRequest, RequestStatus};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("request {0} not found")]
    NotFound(i64),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed request row: {0}")]
    Malformed(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Access to the pending-request store. The scheduler is the only
/// writer of request status during the night.
#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn health_check(&self) -> RepositoryResult<()>;

    /// Requests eligible for tonight: `PENDING`, already inside their
    /// validity window at `now`, and not expiring before tomorrow.
    async fn fetch_pending(&self, now: DateTime<Utc>)
        -> RepositoryResult<Vec<ObservationRequest>>;

    /// Transition one request to a new lifecycle status.
    async fn update_request(&self, req_id: i64, status: RequestStatus) -> RepositoryResult<()>;
}
