/// Per-library run pipeline
///
/// `Engine` owns the collaborators of a run and drives one (user, library)
/// scope through bootstrap, the points ledger, activation, download
/// requests, the tiered shuffle and collection reconciliation.
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::{
    config::{clamp_max_points, Config},
    db::DatasetStore,
    error::{AppError, AppResult},
    models::{
        ActivationSummary, CuratedCollectionSnapshot, ItemRef, LibraryItem, LibraryReport,
        LibrarySection, MediaKind, RecommendationRecord, RecordFilter, ScopeStatus, Suggestion,
        UserReport,
    },
    services::{
        activation, bootstrap,
        bootstrap::ResetSummary,
        context::RunContext,
        downloads,
        ledger::{self, LedgerScope},
        providers::{DownloadRequester, MediaServer, MetadataProvider},
        reconciler::{self, CollectionTarget},
        report,
        retry::RetryPolicy,
        shuffle::{self, RankedItem},
    },
};

pub const DEFAULT_COLLECTION_NAME: &str = "Inspired by your Immaculate Taste";

/// Artwork slug for the collection names shipped with artwork
const KNOWN_ARTWORK: &[(&str, &str)] = &[(DEFAULT_COLLECTION_NAME, "immaculate_taste_collection")];

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub max_points: u32,
    pub collection_name: String,
    pub admin_user_id: String,
    pub pin_position: Option<u32>,
    pub artwork_dir: Option<PathBuf>,
    pub unmonitor_on_arrival: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_points: crate::config::DEFAULT_MAX_POINTS,
            collection_name: DEFAULT_COLLECTION_NAME.to_string(),
            admin_user_id: "admin".to_string(),
            pin_position: None,
            artwork_dir: None,
            unmonitor_on_arrival: false,
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_points: config.clamped_max_points(),
            collection_name: config.collection_name.clone(),
            admin_user_id: config.admin_user_id.clone(),
            pin_position: config.pin_position,
            artwork_dir: config.artwork_dir.as_deref().map(resolve_artwork_dir),
            unmonitor_on_arrival: config.unmonitor_on_arrival,
        }
    }

    pub fn max_points(&self) -> u32 {
        clamp_max_points(self.max_points)
    }

    /// The admin owns the base collection; everyone else gets a suffixed copy
    pub fn collection_name_for(&self, user_id: &str) -> String {
        if user_id == self.admin_user_id {
            self.collection_name.clone()
        } else {
            format!("{} ({})", self.collection_name, user_id)
        }
    }

    /// Every collection name the engine may have created for `users`
    pub fn collection_names(&self, users: &[String]) -> Vec<String> {
        let mut names = vec![self.collection_name.clone()];
        for user in users {
            let name = self.collection_name_for(user);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// `<artwork_dir>/posters/<slug>.png`, falling back to `.jpg`
    pub fn poster_path(&self) -> Option<PathBuf> {
        let dir = self.artwork_dir.as_ref()?;
        let slug = artwork_slug(&self.collection_name);
        ["png", "jpg"]
            .iter()
            .map(|ext| dir.join("posters").join(format!("{}.{}", slug, ext)))
            .find(|path| path.is_file())
    }
}

pub fn artwork_slug(collection_name: &str) -> String {
    if let Some((_, slug)) = KNOWN_ARTWORK.iter().find(|(name, _)| *name == collection_name) {
        return slug.to_string();
    }
    let mut slug = String::new();
    for c in collection_name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    format!("{}_collection", slug.trim_end_matches('_'))
}

pub struct Engine {
    store: Arc<dyn DatasetStore>,
    media: Arc<dyn MediaServer>,
    metadata: Option<Arc<dyn MetadataProvider>>,
    movie_downloads: Option<Arc<dyn DownloadRequester>>,
    show_downloads: Option<Arc<dyn DownloadRequester>>,
    settings: EngineSettings,
    retry: RetryPolicy,
}

impl Engine {
    pub fn new(
        store: Arc<dyn DatasetStore>,
        media: Arc<dyn MediaServer>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            media,
            metadata: None,
            movie_downloads: None,
            show_downloads: None,
            settings,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_metadata(mut self, provider: Arc<dyn MetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    pub fn with_download_requester(
        mut self,
        kind: MediaKind,
        requester: Arc<dyn DownloadRequester>,
    ) -> Self {
        match kind {
            MediaKind::Movie => self.movie_downloads = Some(requester),
            MediaKind::Show => self.show_downloads = Some(requester),
        }
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn store(&self) -> &dyn DatasetStore {
        self.store.as_ref()
    }

    pub fn media(&self) -> &dyn MediaServer {
        self.media.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn requester(&self, kind: MediaKind) -> Option<&dyn DownloadRequester> {
        match kind {
            MediaKind::Movie => self.movie_downloads.as_deref(),
            MediaKind::Show => self.show_downloads.as_deref(),
        }
    }

    /// Runs every library of one user
    ///
    /// Library failures are captured in the report. Only errors that make
    /// the whole run pointless (configuration, invalid input) are returned.
    #[tracing::instrument(skip(self, ctx, batches), fields(run_id = %ctx.run_id))]
    pub async fn run_user(
        &self,
        ctx: &RunContext,
        user_id: &str,
        library_id: Option<&str>,
        batches: Option<&HashMap<String, Vec<Suggestion>>>,
    ) -> AppResult<UserReport> {
        let (sections, mut libraries) = match self.target_sections(user_id, library_id, batches).await
        {
            Ok(targets) => targets,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Cannot resolve libraries");
                return Ok(UserReport {
                    user_id: user_id.to_string(),
                    status: ScopeStatus::Failed,
                    error: Some(e.to_string()),
                    libraries: Vec::new(),
                });
            }
        };

        for section in &sections {
            if ctx.is_cancelled() {
                tracing::warn!(user_id = %user_id, "Run cancelled; remaining libraries not processed");
                break;
            }
            ctx.update_progress(|p| p.current_library = Some(section.key.clone()));

            let batch = batches.and_then(|b| b.get(&section.key)).map(Vec::as_slice);
            let library = match self.run_library(ctx, user_id, section, batch).await {
                Ok(library) => library,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!(
                        user_id = %user_id,
                        library_id = %section.key,
                        error = %e,
                        "Library run failed"
                    );
                    self.failed_library(user_id, &section.key, section.kind, &e)
                }
            };
            tracing::info!(user_id = %user_id, "{}", library.status_line);
            libraries.push(library);
            ctx.update_progress(|p| p.libraries_done += 1);
        }

        let status = report::user_status(&libraries);
        let error = libraries
            .iter()
            .find(|l| l.status == ScopeStatus::Failed)
            .and_then(|l| l.error.as_ref().map(|e| format!("library {}: {}", l.library_id, e)));

        Ok(UserReport {
            user_id: user_id.to_string(),
            status,
            error,
            libraries,
        })
    }

    /// Sections to process for a user, plus already-failed reports for
    /// libraries the user has records in but the server no longer has
    async fn target_sections(
        &self,
        user_id: &str,
        library_id: Option<&str>,
        batches: Option<&HashMap<String, Vec<Suggestion>>>,
    ) -> AppResult<(Vec<LibrarySection>, Vec<LibraryReport>)> {
        let sections = self.media.list_library_sections().await?;

        if let Some(batches) = batches {
            if let Some(unknown) = batches.keys().find(|k| !sections.iter().any(|s| &s.key == *k)) {
                return Err(AppError::NotFound(format!("Library section {}", unknown)));
            }
        }

        if let Some(library_id) = library_id {
            let section = sections
                .into_iter()
                .find(|s| s.key == library_id)
                .ok_or_else(|| AppError::NotFound(format!("Library section {}", library_id)))?;
            return Ok((vec![section], Vec::new()));
        }

        let records = self.store.find_records(&RecordFilter::user(user_id)).await?;
        let mut wanted: HashMap<String, MediaKind> = records
            .iter()
            .map(|r| (r.library_id.clone(), r.media_kind))
            .collect();
        for section in &sections {
            if batches.is_some_and(|b| b.contains_key(&section.key)) {
                wanted.insert(section.key.clone(), section.kind);
            }
        }

        let targets: Vec<LibrarySection> = sections
            .iter()
            .filter(|s| wanted.contains_key(&s.key))
            .cloned()
            .collect();

        let mut gone: Vec<(&String, &MediaKind)> = wanted
            .iter()
            .filter(|(key, _)| !sections.iter().any(|s| &s.key == *key))
            .collect();
        gone.sort();
        let missing = gone
            .into_iter()
            .map(|(key, kind)| {
                let e = AppError::NotFound(format!("Library section {}", key));
                self.failed_library(user_id, key, *kind, &e)
            })
            .collect();

        Ok((targets, missing))
    }

    fn failed_library(
        &self,
        user_id: &str,
        library_id: &str,
        kind: MediaKind,
        error: &AppError,
    ) -> LibraryReport {
        let mut library = LibraryReport {
            library_id: library_id.to_string(),
            media_kind: kind,
            collection_name: self.settings.collection_name_for(user_id),
            status: ScopeStatus::Failed,
            error: Some(error.to_string()),
            bootstrapped: 0,
            ledger: None,
            activation: Default::default(),
            downloads: Default::default(),
            reconcile: Default::default(),
            active: 0,
            pending: 0,
            missing_from_library: 0,
            status_line: String::new(),
        };
        library.status_line = report::status_line(&library);
        library
    }

    /// One (user, library) scope end to end
    ///
    /// `batch` of `None` only refreshes the collection from stored state;
    /// `Some` runs the ledger, where an empty batch decays everything.
    #[tracing::instrument(skip(self, ctx, section, batch), fields(library_id = %section.key, kind = %section.kind))]
    pub async fn run_library(
        &self,
        ctx: &RunContext,
        user_id: &str,
        section: &LibrarySection,
        batch: Option<&[Suggestion]>,
    ) -> AppResult<LibraryReport> {
        let library_id = section.key.as_str();
        let kind = section.kind;
        let max_points = self.settings.max_points();
        let collection_name = self.settings.collection_name_for(user_id);
        let scope = RecordFilter::scope(user_id, library_id).with_kind(kind);

        let library: HashMap<String, LibraryItem> = self
            .media
            .list_items_with_external_ids(library_id)
            .await?
            .into_iter()
            .map(|item| (item.external_id.clone(), item))
            .collect();

        let seeded = bootstrap::seed_from_existing_collection(
            self.store.as_ref(),
            self.media.as_ref(),
            ctx,
            user_id,
            library_id,
            kind,
            &collection_name,
            &library,
            max_points,
        )
        .await?;
        let bootstrapped = seeded.len() as u32;

        let mut records = self.store.find_records(&scope).await?;
        if ctx.dry_run {
            records.extend(seeded);
        }

        let mut newly_active: HashSet<String> = HashSet::new();
        let ledger_summary = match batch {
            Some(batch) => {
                let batch: Vec<Suggestion> = batch
                    .iter()
                    .cloned()
                    .map(|mut s| {
                        s.present_in_library |= library.contains_key(s.external_id.trim());
                        s
                    })
                    .collect();
                let rejected: HashSet<String> = self
                    .store
                    .find_rejections(user_id, kind)
                    .await?
                    .into_iter()
                    .map(|r| r.external_id)
                    .collect();

                let outcome = ledger::apply(
                    LedgerScope {
                        user_id,
                        library_id,
                        media_kind: kind,
                    },
                    &batch,
                    std::mem::take(&mut records),
                    &rejected,
                    max_points,
                    Utc::now(),
                );

                if !ctx.dry_run {
                    for record in &outcome.upserts {
                        self.store.upsert_record(record).await?;
                    }
                    if !outcome.deletions.is_empty() {
                        self.store
                            .delete_records(&scope.clone().with_ids(outcome.deletions.clone()))
                            .await?;
                    }
                }
                newly_active.extend(outcome.newly_active);
                records = outcome.records;
                Some(outcome.summary)
            }
            None => None,
        };

        let arrivals = activation::promote_arrivals(&mut records, &library, max_points, Utc::now());
        self.persist(ctx, &records, &arrivals.promoted).await?;
        newly_active.extend(arrivals.promoted.iter().cloned());

        let mut activation_summary = ActivationSummary {
            promoted: arrivals.promoted.len() as u32,
            awaiting_download: arrivals.awaiting_download,
            ..Default::default()
        };

        if let Some(metadata) = &self.metadata {
            let (enrichment, changed) =
                activation::enrich(metadata.as_ref(), kind, &mut records, &newly_active).await;
            activation_summary.enriched = enrichment.enriched;
            activation_summary.enrichment_failed = enrichment.failed;
            self.persist(ctx, &records, &changed).await?;
        }

        if self.settings.unmonitor_on_arrival {
            if let Some(requester) = self.requester(kind) {
                let mut arrived: Vec<String> = newly_active.iter().cloned().collect();
                arrived.sort();
                activation_summary.unmonitored =
                    activation::unmonitor_arrivals(requester, &arrived, ctx.dry_run).await;
            }
        }

        let download_summary =
            downloads::apply(self.store.as_ref(), self.requester(kind), ctx, &mut records).await?;

        let active: Vec<&RecommendationRecord> = records.iter().filter(|r| r.is_active()).collect();
        let candidates: Vec<RankedItem> = active
            .iter()
            .filter(|r| library.contains_key(&r.external_id))
            .map(|r| RankedItem {
                external_id: r.external_id.clone(),
                vote_average: r.vote_average,
                vote_count: r.vote_count,
            })
            .collect();
        let missing_from_library = (active.len() - candidates.len()) as u32;

        let order = {
            let mut rng = ctx.rng_for(&format!("{}/{}", user_id, library_id));
            shuffle::tiered_order(&candidates, &mut rng)
        };
        let desired: Vec<ItemRef> = order
            .iter()
            .filter_map(|id| library.get(id).map(|item| item.item_ref.clone()))
            .collect();

        let poster = self.settings.poster_path();
        let target = CollectionTarget {
            name: &collection_name,
            section_key: library_id,
            kind,
            desired: &desired,
            pin_position: self.settings.pin_position,
            poster: poster.as_deref(),
        };
        let reconcile =
            reconciler::reconcile_with_policy(self.media.as_ref(), ctx, &target, &self.retry)
                .await?;

        if !ctx.dry_run && reconcile.skip_reason.is_none() {
            self.store
                .replace_snapshot(&CuratedCollectionSnapshot {
                    user_id: user_id.to_string(),
                    library_id: library_id.to_string(),
                    collection_name: collection_name.clone(),
                    external_ids: order,
                    item_refs: desired,
                    applied_at: Utc::now(),
                })
                .await?;
        }

        let status = if reconcile.skip_reason.is_some() {
            ScopeStatus::Skipped
        } else {
            ScopeStatus::Success
        };
        let mut library_report = LibraryReport {
            library_id: library_id.to_string(),
            media_kind: kind,
            collection_name,
            status,
            error: None,
            bootstrapped,
            ledger: ledger_summary,
            activation: activation_summary,
            downloads: download_summary,
            reconcile,
            active: active.len() as u32,
            pending: (records.len() - active.len()) as u32,
            missing_from_library,
            status_line: String::new(),
        };
        library_report.status_line = report::status_line(&library_report);
        Ok(library_report)
    }

    async fn persist(
        &self,
        ctx: &RunContext,
        records: &[RecommendationRecord],
        ids: &[String],
    ) -> AppResult<()> {
        if ctx.dry_run || ids.is_empty() {
            return Ok(());
        }
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        for record in records.iter().filter(|r| ids.contains(r.external_id.as_str())) {
            self.store.upsert_record(record).await?;
        }
        Ok(())
    }

    /// Wipes a library's recommendation state and curated collections
    pub async fn reset(&self, ctx: &RunContext, library_id: &str) -> AppResult<ResetSummary> {
        let section = self
            .media
            .list_library_sections()
            .await?
            .into_iter()
            .find(|s| s.key == library_id)
            .ok_or_else(|| AppError::NotFound(format!("Library section {}", library_id)))?;
        let users = self.store.list_users().await?;
        let names = self.settings.collection_names(&users);
        bootstrap::reset_library(
            self.store.as_ref(),
            self.media.as_ref(),
            ctx,
            section.kind,
            library_id,
            &names,
        )
        .await
    }
}

/// Relative artwork directories are taken from the working directory
fn resolve_artwork_dir(dir: &str) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatasetStore;
    use crate::models::{DownloadApproval, RecommendationStatus, VoteStats};
    use crate::services::providers::{InMemoryMediaServer, MockMetadataProvider};

    fn server() -> InMemoryMediaServer {
        InMemoryMediaServer::new()
            .with_section("1", "Movies", MediaKind::Movie)
            .with_item("1", "101", "603", "The Matrix")
            .with_item("1", "102", "680", "Pulp Fiction")
            .with_item("1", "103", "550", "Fight Club")
    }

    fn engine(store: Arc<MemoryDatasetStore>, media: Arc<InMemoryMediaServer>) -> Engine {
        Engine::new(store, media, EngineSettings::default())
            .with_retry_policy(RetryPolicy::immediate(0))
    }

    fn movies() -> LibrarySection {
        LibrarySection {
            key: "1".to_string(),
            title: "Movies".to_string(),
            kind: MediaKind::Movie,
        }
    }

    #[test]
    fn test_collection_name_per_user() {
        let settings = EngineSettings::default();
        assert_eq!(settings.collection_name_for("admin"), DEFAULT_COLLECTION_NAME);
        assert_eq!(
            settings.collection_name_for("friend"),
            "Inspired by your Immaculate Taste (friend)"
        );
        let names = settings.collection_names(&["admin".to_string(), "friend".to_string()]);
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn test_artwork_slug() {
        assert_eq!(artwork_slug(DEFAULT_COLLECTION_NAME), "immaculate_taste_collection");
        assert_eq!(artwork_slug("Because You Watched!"), "because_you_watched_collection");
    }

    #[test]
    fn test_poster_path_requires_file() {
        let settings = EngineSettings {
            artwork_dir: Some(PathBuf::from("/nonexistent/artwork")),
            ..Default::default()
        };
        assert!(settings.poster_path().is_none());
        assert!(EngineSettings::default().poster_path().is_none());
    }

    #[tokio::test]
    async fn test_run_library_builds_collection() {
        let store = Arc::new(MemoryDatasetStore::new());
        let media = Arc::new(server());
        let engine = engine(store.clone(), media.clone());
        let ctx = RunContext::new(false).with_shuffle_seed(Some(7));

        let batch = vec![
            Suggestion::new("603"),
            Suggestion::new("680"),
            Suggestion::new("999").titled("Not Here Yet"),
        ];
        let report = engine
            .run_library(&ctx, "admin", &movies(), Some(batch.as_slice()))
            .await
            .unwrap();

        assert_eq!(report.status, ScopeStatus::Success);
        let ledger = report.ledger.unwrap();
        assert_eq!(ledger.created_active, 2);
        assert_eq!(ledger.created_pending, 1);
        assert_eq!(report.active, 2);
        assert_eq!(report.pending, 1);
        assert!(report.reconcile.created);

        let collection = media.collection("1", DEFAULT_COLLECTION_NAME).unwrap();
        let mut items = collection.items.clone();
        items.sort();
        assert_eq!(items, vec!["101".to_string(), "102".to_string()]);
    }

    #[tokio::test]
    async fn test_refresh_only_leaves_points_alone() {
        let mut record = RecommendationRecord::new("admin", "1", MediaKind::Movie, "603");
        record.activate(50);
        record.points = 20;
        let store = Arc::new(MemoryDatasetStore::seeded(vec![record]).await.unwrap());
        let media = Arc::new(server());
        let engine = engine(store.clone(), media.clone());

        let report = engine
            .run_library(&RunContext::new(false), "admin", &movies(), None)
            .await
            .unwrap();
        assert!(report.ledger.is_none());

        let stored = store.find_records(&RecordFilter::user("admin")).await.unwrap();
        assert_eq!(stored[0].points, 20);
        assert_eq!(
            media.collection("1", DEFAULT_COLLECTION_NAME).unwrap().items,
            vec!["101".to_string()]
        );
    }

    #[tokio::test]
    async fn test_arrival_is_promoted_and_enriched() {
        let mut record = RecommendationRecord::new("admin", "1", MediaKind::Movie, "550");
        record.download_approval = DownloadApproval::Approved;
        record.sent_at = Some(Utc::now());
        let store = Arc::new(MemoryDatasetStore::seeded(vec![record]).await.unwrap());
        let media = Arc::new(server());

        let mut metadata = MockMetadataProvider::new();
        metadata.expect_vote_stats().returning(|_, _| {
            Ok(Some(VoteStats {
                average: 8.4,
                count: 2000,
                poster_path: None,
            }))
        });

        let engine = engine(store.clone(), media).with_metadata(Arc::new(metadata));
        let report = engine
            .run_library(&RunContext::new(false), "admin", &movies(), None)
            .await
            .unwrap();

        assert_eq!(report.activation.promoted, 1);
        assert_eq!(report.activation.enriched, 1);
        let stored = store.find_records(&RecordFilter::user("admin")).await.unwrap();
        assert_eq!(stored[0].status, RecommendationStatus::Active);
        assert_eq!(stored[0].vote_average, Some(8.4));
    }

    #[tokio::test]
    async fn test_no_matches_is_skipped_without_snapshot() {
        let store = Arc::new(MemoryDatasetStore::new());
        let media = Arc::new(server());
        let engine = engine(store.clone(), media.clone());

        let report = engine
            .run_library(
                &RunContext::new(false),
                "admin",
                &movies(),
                Some(&[Suggestion::new("999")][..]),
            )
            .await
            .unwrap();

        assert_eq!(report.status, ScopeStatus::Skipped);
        assert_eq!(report.reconcile.skip_reason.as_deref(), Some(reconciler::SKIP_NO_MATCHES));
        assert!(media.collection("1", DEFAULT_COLLECTION_NAME).is_none());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = Arc::new(MemoryDatasetStore::new());
        let media = Arc::new(server());
        let engine = engine(store.clone(), media.clone());

        let report = engine
            .run_library(
                &RunContext::new(true),
                "admin",
                &movies(),
                Some(&[Suggestion::new("603")][..]),
            )
            .await
            .unwrap();

        assert_eq!(report.reconcile.added, 1);
        assert_eq!(store.count_records(&RecordFilter::default()).await.unwrap(), 0);
        assert_eq!(media.mutations(), 0);
    }

    #[tokio::test]
    async fn test_targeted_unknown_library_fails_user() {
        let store = Arc::new(MemoryDatasetStore::new());
        let engine = engine(store, Arc::new(server()));

        let report = engine
            .run_user(&RunContext::new(false), "admin", Some("9"), None)
            .await
            .unwrap();
        assert_eq!(report.status, ScopeStatus::Failed);
        assert!(report.error.unwrap().contains("9"));
    }

    #[tokio::test]
    async fn test_reset_removes_user_collections() {
        let mut record = RecommendationRecord::new("friend", "1", MediaKind::Movie, "603");
        record.activate(50);
        let store = Arc::new(MemoryDatasetStore::seeded(vec![record]).await.unwrap());
        let media = Arc::new(server());
        media.seed_collection("1", "Inspired by your Immaculate Taste (friend)", &["101"]);
        let engine = engine(store.clone(), media.clone());

        let summary = engine.reset(&RunContext::new(false), "1").await.unwrap();
        assert_eq!(summary.collections_deleted, 1);
        assert_eq!(summary.records_deleted, 1);
        assert!(engine.reset(&RunContext::new(false), "9").await.is_err());
    }
}
