//! In-memory request store, for tests and standalone deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use super::repository::{RepositoryError, RepositoryResult, RequestRepository};
use crate::models::{ObservationRequest, RequestStatus};

#[derive(Debug, Default)]
pub struct LocalRepository {
    rows: RwLock<HashMap<i64, ObservationRequest>>,
}

impl LocalRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: ObservationRequest) {
        self.rows.write().insert(request.req_id, request);
    }

    pub fn get(&self, req_id: i64) -> Option<ObservationRequest> {
        self.rows.read().get(&req_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Load a store from a JSON snapshot: an array of requests as
    /// exported from the facility database.
    pub fn from_snapshot(path: &std::path::Path) -> RepositoryResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RepositoryError::Unavailable(format!("{}: {}", path.display(), e)))?;
        let rows: Vec<ObservationRequest> = serde_json::from_str(&text)
            .map_err(|e| RepositoryError::Malformed(format!("{}: {}", path.display(), e)))?;
        let repo = Self::new();
        for row in rows {
            repo.insert(row);
        }
        Ok(repo)
    }
}

#[async_trait]
impl RequestRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<()> {
        Ok(())
    }

    async fn fetch_pending(
        &self,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<ObservationRequest>> {
        let tomorrow = now + Duration::days(1);
        let mut rows: Vec<ObservationRequest> = self
            .rows
            .read()
            .values()
            .filter(|r| {
                r.status == RequestStatus::Pending && r.inidate <= now && r.enddate >= tomorrow
            })
            .cloned()
            .collect();
        // Deterministic order for callers that iterate before ranking.
        rows.sort_by_key(|r| r.req_id);
        Ok(rows)
    }

    async fn update_request(&self, req_id: i64, status: RequestStatus) -> RepositoryResult<()> {
        let mut rows = self.rows.write();
        match rows.get_mut(&req_id) {
            Some(row) => {
                row.status = status;
                Ok(())
            }
            None => Err(RepositoryError::NotFound(req_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RawSequence, TargetKind};
    use chrono::TimeZone;

    fn request(req_id: i64, inidate: DateTime<Utc>, enddate: DateTime<Utc>) -> ObservationRequest {
        ObservationRequest {
            req_id,
            obj_id: req_id,
            name: format!("local-{}", req_id),
            ra_deg: 10.0,
            dec_deg: 10.0,
            equinox: 2000.0,
            kind: TargetKind::Fixed,
            motion: None,
            priority: 5,
            max_airmass: 2.5,
            min_moon_dist_deg: 10.0,
            max_moon_illum: 1.0,
            inidate,
            enddate,
            sequence: RawSequence::new(&["1r"], &[300], 1),
            status: RequestStatus::Pending,
            program: None,
        }
    }

    #[tokio::test]
    async fn fetch_filters_by_validity_window() {
        let repo = LocalRepository::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 16, 6, 0, 0).unwrap();
        let far = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();

        // Valid.
        repo.insert(request(1, now - Duration::days(2), far));
        // Not started yet.
        repo.insert(request(2, now + Duration::hours(5), far));
        // Expires before tomorrow.
        repo.insert(request(3, now - Duration::days(2), now + Duration::hours(2)));

        let rows = repo.fetch_pending(now).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].req_id, 1);
    }

    #[tokio::test]
    async fn completed_requests_drop_out() {
        let repo = LocalRepository::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 16, 6, 0, 0).unwrap();
        let far = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        repo.insert(request(1, now - Duration::days(1), far));

        repo.update_request(1, RequestStatus::Completed).await.unwrap();
        assert!(repo.fetch_pending(now).await.unwrap().is_empty());
        assert_eq!(repo.get(1).unwrap().status, RequestStatus::Completed);
    }

    #[tokio::test]
    async fn snapshot_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("targets.json");
        let rows = vec![request(
            1,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap(),
        )];
        std::fs::write(&path, serde_json::to_string(&rows).unwrap()).unwrap();

        let repo = LocalRepository::from_snapshot(&path).unwrap();
        assert_eq!(repo.len(), 1);
        assert!(matches!(
            LocalRepository::from_snapshot(&dir.path().join("missing.json")),
            Err(RepositoryError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn updating_a_missing_row_is_an_error() {
        let repo = LocalRepository::new();
        let err = repo.update_request(99, RequestStatus::Active).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(99)));
    }
}
