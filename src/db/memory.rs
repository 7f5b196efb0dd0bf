use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    db::DatasetStore,
    error::AppResult,
    models::{
        BootstrapMarker, CuratedCollectionSnapshot, MediaKind, RecommendationRecord, RecordFilter,
        RejectedSuggestion, ResetMarker,
    },
};

/// In-process dataset store
///
/// Used for dry experiments and tests. Records keep insertion order, which
/// doubles as discovery order for `list_users`.
#[derive(Clone, Default)]
pub struct MemoryDatasetStore {
    inner: Arc<RwLock<MemoryInner>>,
}

#[derive(Default)]
struct MemoryInner {
    records: Vec<RecommendationRecord>,
    rejections: Vec<RejectedSuggestion>,
    markers: Vec<ResetMarker>,
    bootstrapped: Vec<BootstrapMarker>,
    snapshots: HashMap<(String, String, String), CuratedCollectionSnapshot>,
}

impl MemoryDatasetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with records, in the given order
    pub async fn seeded(records: Vec<RecommendationRecord>) -> AppResult<Self> {
        let store = Self::new();
        for record in &records {
            store.upsert_record(record).await?;
        }
        Ok(store)
    }

    pub async fn snapshot(
        &self,
        user_id: &str,
        library_id: &str,
    ) -> Option<CuratedCollectionSnapshot> {
        let inner = self.inner.read().await;
        inner
            .snapshots
            .values()
            .find(|s| s.user_id == user_id && s.library_id == library_id)
            .cloned()
    }
}

#[async_trait::async_trait]
impl DatasetStore for MemoryDatasetStore {
    async fn upsert_record(&self, record: &RecommendationRecord) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.records.iter_mut().find(|r| {
            r.user_id == record.user_id
                && r.library_id == record.library_id
                && r.external_id == record.external_id
        }) {
            Some(existing) => {
                let created_at = existing.created_at;
                *existing = record.clone();
                existing.created_at = created_at;
            }
            None => inner.records.push(record.clone()),
        }
        Ok(())
    }

    async fn find_records(&self, filter: &RecordFilter) -> AppResult<Vec<RecommendationRecord>> {
        let inner = self.inner.read().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    async fn delete_records(&self, filter: &RecordFilter) -> AppResult<u64> {
        let mut inner = self.inner.write().await;
        let before = inner.records.len();
        inner.records.retain(|r| !filter.matches(r));
        Ok((before - inner.records.len()) as u64)
    }

    async fn count_records(&self, filter: &RecordFilter) -> AppResult<u64> {
        let inner = self.inner.read().await;
        Ok(inner.records.iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn upsert_rejection(&self, rejection: &RejectedSuggestion) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.rejections.retain(|r| {
            !(r.user_id == rejection.user_id
                && r.media_kind == rejection.media_kind
                && r.external_source == rejection.external_source
                && r.external_id == rejection.external_id)
        });
        inner.rejections.push(rejection.clone());
        Ok(())
    }

    async fn delete_rejection(
        &self,
        user_id: &str,
        kind: MediaKind,
        external_source: &str,
        external_id: &str,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let before = inner.rejections.len();
        inner.rejections.retain(|r| {
            !(r.user_id == user_id
                && r.media_kind == kind
                && r.external_source == external_source
                && r.external_id == external_id)
        });
        Ok(inner.rejections.len() != before)
    }

    async fn find_rejections(
        &self,
        user_id: &str,
        kind: MediaKind,
    ) -> AppResult<Vec<RejectedSuggestion>> {
        let inner = self.inner.read().await;
        Ok(inner
            .rejections
            .iter()
            .filter(|r| r.user_id == user_id && r.media_kind == kind)
            .cloned()
            .collect())
    }

    async fn reset_marker(
        &self,
        kind: MediaKind,
        library_id: &str,
    ) -> AppResult<Option<ResetMarker>> {
        let inner = self.inner.read().await;
        Ok(inner
            .markers
            .iter()
            .find(|m| m.media_kind == kind && m.library_id == library_id)
            .cloned())
    }

    async fn put_reset_marker(&self, marker: &ResetMarker) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if !inner
            .markers
            .iter()
            .any(|m| m.media_kind == marker.media_kind && m.library_id == marker.library_id)
        {
            inner.markers.push(marker.clone());
        }
        Ok(())
    }

    async fn bootstrap_marker(
        &self,
        user_id: &str,
        kind: MediaKind,
        library_id: &str,
    ) -> AppResult<Option<BootstrapMarker>> {
        let inner = self.inner.read().await;
        Ok(inner
            .bootstrapped
            .iter()
            .find(|m| m.user_id == user_id && m.media_kind == kind && m.library_id == library_id)
            .cloned())
    }

    async fn put_bootstrap_marker(&self, marker: &BootstrapMarker) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if !inner.bootstrapped.iter().any(|m| {
            m.user_id == marker.user_id
                && m.media_kind == marker.media_kind
                && m.library_id == marker.library_id
        }) {
            inner.bootstrapped.push(marker.clone());
        }
        Ok(())
    }

    async fn replace_snapshot(&self, snapshot: &CuratedCollectionSnapshot) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.snapshots.insert(
            (
                snapshot.user_id.clone(),
                snapshot.library_id.clone(),
                snapshot.collection_name.clone(),
            ),
            snapshot.clone(),
        );
        Ok(())
    }

    async fn list_users(&self) -> AppResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut users: Vec<String> = Vec::new();
        let mut ordered: Vec<&RecommendationRecord> = inner.records.iter().collect();
        // stable: equal timestamps keep insertion order
        ordered.sort_by_key(|r| r.created_at);
        for record in ordered {
            if !users.contains(&record.user_id) {
                users.push(record.user_id.clone());
            }
        }
        Ok(users)
    }
}
