use crate::{
    error::AppResult,
    models::{
        BootstrapMarker, CuratedCollectionSnapshot, MediaKind, RecommendationRecord, RecordFilter,
        RejectedSuggestion, ResetMarker,
    },
};

/// Durable record storage used by the run engine
///
/// Every run reads what it needs through this trait and writes its results
/// back; implementations must not rely on state surviving between runs.
/// Records are unique per (user, library, external id).
#[async_trait::async_trait]
pub trait DatasetStore: Send + Sync {
    /// Inserts or replaces the record with the same (user, library, external id).
    /// `created_at` of an existing record is preserved.
    async fn upsert_record(&self, record: &RecommendationRecord) -> AppResult<()>;

    async fn find_records(&self, filter: &RecordFilter) -> AppResult<Vec<RecommendationRecord>>;

    /// Returns the number of deleted records
    async fn delete_records(&self, filter: &RecordFilter) -> AppResult<u64>;

    async fn count_records(&self, filter: &RecordFilter) -> AppResult<u64>;

    async fn upsert_rejection(&self, rejection: &RejectedSuggestion) -> AppResult<()>;

    /// Returns whether a rejection was removed
    async fn delete_rejection(
        &self,
        user_id: &str,
        kind: MediaKind,
        external_source: &str,
        external_id: &str,
    ) -> AppResult<bool>;

    async fn find_rejections(
        &self,
        user_id: &str,
        kind: MediaKind,
    ) -> AppResult<Vec<RejectedSuggestion>>;

    async fn reset_marker(&self, kind: MediaKind, library_id: &str)
        -> AppResult<Option<ResetMarker>>;

    async fn put_reset_marker(&self, marker: &ResetMarker) -> AppResult<()>;

    async fn bootstrap_marker(
        &self,
        user_id: &str,
        kind: MediaKind,
        library_id: &str,
    ) -> AppResult<Option<BootstrapMarker>>;

    /// Keeps the first marker of a scope
    async fn put_bootstrap_marker(&self, marker: &BootstrapMarker) -> AppResult<()>;

    /// Replaces the snapshot of the same (user, library, collection) wholesale
    async fn replace_snapshot(&self, snapshot: &CuratedCollectionSnapshot) -> AppResult<()>;

    /// Users owning at least one record, in discovery order (first record created)
    async fn list_users(&self) -> AppResult<Vec<String>>;
}
