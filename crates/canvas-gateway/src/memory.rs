//! In-memory version log
//!
//! Rows live in a [`DashMap`] keyed by document id. Timestamps are issued
//! from a single clock that never repeats, so `created_at` is a total order
//! even for writes landing in the same millisecond.

use crate::error::GatewayError;
use crate::PersistenceGateway;
use async_trait::async_trait;
use canvas_artifact::{DocumentId, DocumentVersion, NewVersion};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

/// Reference [`PersistenceGateway`] backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    rows: DashMap<DocumentId, Vec<DocumentVersion>>,
    clock: Mutex<Option<DateTime<Utc>>>,
}

impl InMemoryGateway {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of versions stored for a document
    #[must_use]
    pub fn version_count(&self, document_id: &DocumentId) -> usize {
        self.rows.get(document_id).map_or(0, |rows| rows.len())
    }

    /// Every document with at least one version
    #[must_use]
    pub fn document_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.rows.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Next strictly increasing timestamp
    fn tick(&self) -> DateTime<Utc> {
        let mut last = self.clock.lock();
        let now = Utc::now();
        let next = match *last {
            Some(previous) if now <= previous => previous + Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryGateway {
    async fn list_versions(
        &self,
        document_id: &DocumentId,
    ) -> Result<Vec<DocumentVersion>, GatewayError> {
        Ok(self
            .rows
            .get(document_id)
            .map(|rows| rows.value().clone())
            .unwrap_or_default())
    }

    async fn create_version(
        &self,
        document_id: &DocumentId,
        version: NewVersion,
    ) -> Result<DocumentVersion, GatewayError> {
        if !document_id.is_initialized() {
            return Err(GatewayError::UnboundDocument(document_id.clone()));
        }
        if version.payload().is_none() {
            return Err(GatewayError::MissingPayload { kind: version.kind });
        }

        let row = DocumentVersion::from_new(document_id.clone(), version, self.tick());
        self.rows
            .entry(document_id.clone())
            .or_default()
            .push(row.clone());

        tracing::debug!(
            document_id = %document_id,
            created_at = %row.created_at,
            "appended version"
        );
        Ok(row)
    }
}
