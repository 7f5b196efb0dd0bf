/// One-shot adoption of pre-existing collections, and explicit resets
///
/// A library that already carries a hand-made collection under the curated
/// name is seeded from it the first time the engine sees the scope, and a
/// `BootstrapMarker` records that the scope has been looked at. A reset
/// wipes a library's recommendation state and collections and leaves a
/// `ResetMarker` behind so the seeding never happens again there.
use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;

use crate::{
    db::DatasetStore,
    error::AppResult,
    models::{
        BootstrapMarker, LibraryItem, MediaKind, RecommendationRecord, RecordFilter, ResetMarker,
    },
    services::{context::RunContext, providers::MediaServer},
};

/// Seeds records from an existing collection the first time a scope is seen,
/// unless the scope already has records or the library was reset. Returns the
/// seeded records, which in a dry run exist only in the returned list.
///
/// Outside a dry run the scope is marked on the first call whatever the
/// outcome, so records evicted later are never re-seeded from a collection
/// left on the server.
#[allow(clippy::too_many_arguments)]
pub async fn seed_from_existing_collection(
    store: &dyn DatasetStore,
    media: &dyn MediaServer,
    ctx: &RunContext,
    user_id: &str,
    library_id: &str,
    kind: MediaKind,
    collection_name: &str,
    library: &HashMap<String, LibraryItem>,
    max_points: u32,
) -> AppResult<Vec<RecommendationRecord>> {
    if store.bootstrap_marker(user_id, kind, library_id).await?.is_some() {
        return Ok(Vec::new());
    }

    let seeded = adopt_collection(
        store,
        media,
        ctx,
        user_id,
        library_id,
        kind,
        collection_name,
        library,
        max_points,
    )
    .await?;

    if !ctx.dry_run {
        store
            .put_bootstrap_marker(&BootstrapMarker {
                user_id: user_id.to_string(),
                media_kind: kind,
                library_id: library_id.to_string(),
                created_at: Utc::now(),
            })
            .await?;
    }
    Ok(seeded)
}

#[allow(clippy::too_many_arguments)]
async fn adopt_collection(
    store: &dyn DatasetStore,
    media: &dyn MediaServer,
    ctx: &RunContext,
    user_id: &str,
    library_id: &str,
    kind: MediaKind,
    collection_name: &str,
    library: &HashMap<String, LibraryItem>,
    max_points: u32,
) -> AppResult<Vec<RecommendationRecord>> {
    if store.reset_marker(kind, library_id).await?.is_some() {
        return Ok(Vec::new());
    }
    let scope = RecordFilter::scope(user_id, library_id).with_kind(kind);
    if store.count_records(&scope).await? > 0 {
        return Ok(Vec::new());
    }
    let Some(collection) = media.find_collection_by_name(collection_name, library_id).await? else {
        return Ok(Vec::new());
    };

    let by_ref: HashMap<&str, &LibraryItem> = library
        .values()
        .map(|item| (item.item_ref.as_str(), item))
        .collect();
    let members = media.get_collection_items(&collection.id).await?;

    let mut seeded = Vec::new();
    for item_ref in &members {
        let Some(item) = by_ref.get(item_ref.as_str()) else {
            tracing::debug!(item_ref = %item_ref, "Collection member has no external id; not seeded");
            continue;
        };
        let mut record = RecommendationRecord::new(user_id, library_id, kind, item.external_id.clone());
        record.title = Some(item.title.clone()).filter(|t| !t.is_empty());
        record.activate(max_points);
        if !ctx.dry_run {
            store.upsert_record(&record).await?;
        }
        seeded.push(record);
    }

    if !seeded.is_empty() {
        tracing::info!(
            user_id = %user_id,
            library_id = %library_id,
            collection = %collection_name,
            seeded = seeded.len(),
            dry_run = ctx.dry_run,
            "Seeded recommendations from existing collection"
        );
    }
    Ok(seeded)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetSummary {
    pub library_id: String,
    pub media_kind: Option<MediaKind>,
    pub records_deleted: u64,
    pub collections_deleted: u32,
    pub marker_written: bool,
}

/// Clears a library: every user's records of `kind`, the named collections,
/// then writes the reset marker
pub async fn reset_library(
    store: &dyn DatasetStore,
    media: &dyn MediaServer,
    ctx: &RunContext,
    kind: MediaKind,
    library_id: &str,
    collection_names: &[String],
) -> AppResult<ResetSummary> {
    let scope = RecordFilter::library(library_id).with_kind(kind);
    let mut summary = ResetSummary {
        library_id: library_id.to_string(),
        media_kind: Some(kind),
        ..Default::default()
    };

    for name in collection_names {
        if let Some(collection) = media.find_collection_by_name(name, library_id).await? {
            if !ctx.dry_run {
                media.delete_collection(&collection.id).await?;
            }
            summary.collections_deleted += 1;
        }
    }

    if ctx.dry_run {
        summary.records_deleted = store.count_records(&scope).await?;
    } else {
        summary.records_deleted = store.delete_records(&scope).await?;
        store
            .put_reset_marker(&ResetMarker {
                media_kind: kind,
                library_id: library_id.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        summary.marker_written = true;
    }

    tracing::info!(
        library_id = %library_id,
        kind = %kind,
        records_deleted = summary.records_deleted,
        collections_deleted = summary.collections_deleted,
        dry_run = ctx.dry_run,
        "Library reset"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatasetStore;
    use crate::services::providers::InMemoryMediaServer;

    const NAME: &str = "Inspired by your Immaculate Taste";

    fn server() -> InMemoryMediaServer {
        InMemoryMediaServer::new()
            .with_section("1", "Movies", MediaKind::Movie)
            .with_item("1", "101", "603", "The Matrix")
            .with_item("1", "102", "680", "Pulp Fiction")
    }

    async fn library_map(server: &InMemoryMediaServer) -> HashMap<String, LibraryItem> {
        server
            .list_items_with_external_ids("1")
            .await
            .unwrap()
            .into_iter()
            .map(|i| (i.external_id.clone(), i))
            .collect()
    }

    #[tokio::test]
    async fn test_seeds_existing_collection_once() {
        let server = server();
        server.seed_collection("1", NAME, &["101", "102", "999"]);
        let store = MemoryDatasetStore::new();
        let ctx = RunContext::new(false);
        let library = library_map(&server).await;

        let seeded = seed_from_existing_collection(
            &store, &server, &ctx, "admin", "1", MediaKind::Movie, NAME, &library, 50,
        )
        .await
        .unwrap();
        assert_eq!(seeded.len(), 2);

        let records = store.find_records(&RecordFilter::scope("admin", "1")).await.unwrap();
        assert!(records.iter().all(|r| r.is_active() && r.points == 50));

        let again = seed_from_existing_collection(
            &store, &server, &ctx, "admin", "1", MediaKind::Movie, NAME, &library, 50,
        )
        .await
        .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_evicted_scope_is_not_seeded_again() {
        let server = server();
        server.seed_collection("1", NAME, &["101"]);
        let store = MemoryDatasetStore::seeded(vec![RecommendationRecord::new(
            "admin",
            "1",
            MediaKind::Movie,
            "603",
        )])
        .await
        .unwrap();
        let ctx = RunContext::new(false);
        let library = library_map(&server).await;

        let first = seed_from_existing_collection(
            &store, &server, &ctx, "admin", "1", MediaKind::Movie, NAME, &library, 50,
        )
        .await
        .unwrap();
        assert!(first.is_empty());
        assert!(store.bootstrap_marker("admin", MediaKind::Movie, "1").await.unwrap().is_some());

        store.delete_records(&RecordFilter::scope("admin", "1")).await.unwrap();
        let again = seed_from_existing_collection(
            &store, &server, &ctx, "admin", "1", MediaKind::Movie, NAME, &library, 50,
        )
        .await
        .unwrap();
        assert!(again.is_empty());
        assert_eq!(store.count_records(&RecordFilter::scope("admin", "1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dry_run_seeding_leaves_no_marker() {
        let server = server();
        server.seed_collection("1", NAME, &["101"]);
        let store = MemoryDatasetStore::new();
        let library = library_map(&server).await;

        let seeded = seed_from_existing_collection(
            &store, &server, &RunContext::new(true), "admin", "1", MediaKind::Movie, NAME, &library, 50,
        )
        .await
        .unwrap();
        assert_eq!(seeded.len(), 1);
        assert!(store.bootstrap_marker("admin", MediaKind::Movie, "1").await.unwrap().is_none());
        assert_eq!(store.count_records(&RecordFilter::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_reset_marker_blocks_seeding() {
        let server = server();
        server.seed_collection("1", NAME, &["101"]);
        let store = MemoryDatasetStore::new();
        let ctx = RunContext::new(false);

        let summary = reset_library(&store, &server, &ctx, MediaKind::Movie, "1", &[NAME.to_string()])
            .await
            .unwrap();
        assert_eq!(summary.collections_deleted, 1);
        assert!(summary.marker_written);
        assert!(server.collection("1", NAME).is_none());

        server.seed_collection("1", NAME, &["101"]);
        let library = library_map(&server).await;
        let seeded = seed_from_existing_collection(
            &store, &server, &ctx, "admin", "1", MediaKind::Movie, NAME, &library, 50,
        )
        .await
        .unwrap();
        assert!(seeded.is_empty());
    }

    #[tokio::test]
    async fn test_reset_deletes_every_users_records() {
        let server = server();
        let store = MemoryDatasetStore::seeded(vec![
            RecommendationRecord::new("admin", "1", MediaKind::Movie, "603"),
            RecommendationRecord::new("friend", "1", MediaKind::Movie, "680"),
            RecommendationRecord::new("friend", "2", MediaKind::Movie, "11"),
        ])
        .await
        .unwrap();

        let summary = reset_library(&store, &server, &RunContext::new(false), MediaKind::Movie, "1", &[])
            .await
            .unwrap();
        assert_eq!(summary.records_deleted, 2);
        assert_eq!(store.count_records(&RecordFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dry_run_reset_changes_nothing() {
        let server = server();
        server.seed_collection("1", NAME, &["101"]);
        let store = MemoryDatasetStore::seeded(vec![RecommendationRecord::new(
            "admin",
            "1",
            MediaKind::Movie,
            "603",
        )])
        .await
        .unwrap();

        let summary = reset_library(&store, &server, &RunContext::new(true), MediaKind::Movie, "1", &[NAME.to_string()])
            .await
            .unwrap();
        assert_eq!(summary.records_deleted, 1);
        assert!(!summary.marker_written);
        assert!(server.collection("1", NAME).is_some());
        assert!(store.reset_marker(MediaKind::Movie, "1").await.unwrap().is_none());
    }
}
