/// External collaborators of the run engine
///
/// Each service the engine talks to sits behind a trait so runs can be
/// driven against real servers (Plex, TMDB, Radarr/Sonarr) or in-memory
/// stand-ins. The engine only relies on the contracts below.
use crate::{
    error::AppResult,
    models::{
        AddItemSpec, AddedItem, CollectionRef, DownloadItem, ItemRef, LibraryItem,
        LibrarySection, MediaKind, VoteStats,
    },
};

pub mod arr;
pub mod memory;
pub mod plex;
pub mod tmdb;

pub use arr::ArrClient;
pub use memory::InMemoryMediaServer;
pub use plex::PlexClient;
pub use tmdb::TmdbProvider;

/// Media server holding the libraries and curated collections
#[async_trait::async_trait]
pub trait MediaServer: Send + Sync {
    async fn list_library_sections(&self) -> AppResult<Vec<LibrarySection>>;

    /// Items of a section that carry an external id
    async fn list_items_with_external_ids(&self, section_key: &str)
        -> AppResult<Vec<LibraryItem>>;

    async fn find_collection_by_name(
        &self,
        name: &str,
        section_key: &str,
    ) -> AppResult<Option<CollectionRef>>;

    /// Members in display order
    async fn get_collection_items(&self, collection_id: &str) -> AppResult<Vec<ItemRef>>;

    /// Creates a collection seeded with `items`; its sort is set to custom
    async fn create_collection(
        &self,
        name: &str,
        section_key: &str,
        kind: MediaKind,
        items: &[ItemRef],
    ) -> AppResult<CollectionRef>;

    /// Appends items to the end of the collection
    async fn add_collection_items(&self, collection_id: &str, items: &[ItemRef]) -> AppResult<()>;

    async fn remove_collection_items(&self, collection_id: &str, items: &[ItemRef])
        -> AppResult<()>;

    /// Moves `item` right after `after`, or to the front when `after` is `None`
    async fn move_collection_item(
        &self,
        collection_id: &str,
        item: &str,
        after: Option<&str>,
    ) -> AppResult<()>;

    async fn delete_collection(&self, collection_id: &str) -> AppResult<()>;

    /// Pins the collection as a hub row of its section at `position`
    async fn pin_collection(
        &self,
        collection_id: &str,
        section_key: &str,
        position: u32,
    ) -> AppResult<()>;

    async fn upload_collection_poster(&self, collection_id: &str, image: Vec<u8>)
        -> AppResult<()>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Source of rating signals used to order the curated set
///
/// Missing titles yield `Ok(None)`; errors are reserved for transport failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn vote_stats(&self, kind: MediaKind, external_id: &str) -> AppResult<Option<VoteStats>>;

    fn name(&self) -> &'static str;
}

/// Download-request service (Radarr for movies, Sonarr for shows)
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait DownloadRequester: Send + Sync {
    /// Adds and searches for an item. `Ok(None)` when the service cannot
    /// resolve the external id.
    async fn add_item(&self, spec: &AddItemSpec) -> AppResult<Option<AddedItem>>;

    async fn set_item_monitored(&self, item: &DownloadItem, monitored: bool) -> AppResult<()>;

    async fn list_items(&self) -> AppResult<Vec<DownloadItem>>;

    fn name(&self) -> &'static str;
}
