use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::{
    error::{AppError, AppResult},
    models::{CollectionRef, ItemRef, LibraryItem, LibrarySection, MediaKind},
    services::providers::MediaServer,
};

/// In-process media server
///
/// Holds sections, items and collections in memory and counts every
/// mutating call, which makes it suitable for dry experiments and for
/// checking that a reconciliation converges. Sections can be marked as
/// failing to simulate an unreachable library.
#[derive(Default)]
pub struct InMemoryMediaServer {
    state: Mutex<ServerState>,
}

#[derive(Default)]
struct ServerState {
    sections: Vec<LibrarySection>,
    items: HashMap<String, Vec<LibraryItem>>,
    collections: Vec<StoredCollection>,
    failing_sections: HashSet<String>,
    next_id: u64,
    mutations: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredCollection {
    pub id: String,
    pub title: String,
    pub section_key: String,
    pub items: Vec<ItemRef>,
    pub pinned_at: Option<u32>,
    pub has_poster: bool,
}

impl ServerState {
    fn collection_mut(&mut self, id: &str) -> AppResult<&mut StoredCollection> {
        self.collections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound(format!("collection {}", id)))
    }
}

impl InMemoryMediaServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_section(self, key: &str, title: &str, kind: MediaKind) -> Self {
        self.state().sections.push(LibrarySection {
            key: key.to_string(),
            title: title.to_string(),
            kind,
        });
        self
    }

    pub fn with_item(self, section_key: &str, item_ref: &str, external_id: &str, title: &str) -> Self {
        self.add_library_item(section_key, item_ref, external_id, title);
        self
    }

    /// Makes an item show up in a section, as after a finished download
    pub fn add_library_item(&self, section_key: &str, item_ref: &str, external_id: &str, title: &str) {
        self.state()
            .items
            .entry(section_key.to_string())
            .or_default()
            .push(LibraryItem {
                item_ref: item_ref.to_string(),
                external_id: external_id.to_string(),
                title: title.to_string(),
            });
    }

    /// Creates a collection directly, bypassing the mutation counter
    pub fn seed_collection(&self, section_key: &str, title: &str, items: &[&str]) -> String {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.collections.push(StoredCollection {
            id: id.clone(),
            title: title.to_string(),
            section_key: section_key.to_string(),
            items: items.iter().map(|i| i.to_string()).collect(),
            pinned_at: None,
            has_poster: false,
        });
        id
    }

    pub fn fail_section(&self, section_key: &str) {
        self.state().failing_sections.insert(section_key.to_string());
    }

    /// Number of mutating calls served so far
    pub fn mutations(&self) -> u64 {
        self.state().mutations
    }

    pub fn collection(&self, section_key: &str, title: &str) -> Option<StoredCollection> {
        self.state()
            .collections
            .iter()
            .find(|c| c.section_key == section_key && c.title == title)
            .cloned()
    }
}

#[async_trait::async_trait]
impl MediaServer for InMemoryMediaServer {
    async fn list_library_sections(&self) -> AppResult<Vec<LibrarySection>> {
        Ok(self.state().sections.clone())
    }

    async fn list_items_with_external_ids(&self, section_key: &str) -> AppResult<Vec<LibraryItem>> {
        let state = self.state();
        if state.failing_sections.contains(section_key) {
            return Err(AppError::external(
                "media-server",
                503,
                format!("section {} unavailable", section_key),
            ));
        }
        Ok(state.items.get(section_key).cloned().unwrap_or_default())
    }

    async fn find_collection_by_name(
        &self,
        name: &str,
        section_key: &str,
    ) -> AppResult<Option<CollectionRef>> {
        Ok(self
            .state()
            .collections
            .iter()
            .find(|c| c.section_key == section_key && c.title == name)
            .map(|c| CollectionRef {
                id: c.id.clone(),
                title: c.title.clone(),
            }))
    }

    async fn get_collection_items(&self, collection_id: &str) -> AppResult<Vec<ItemRef>> {
        Ok(self.state().collection_mut(collection_id)?.items.clone())
    }

    async fn create_collection(
        &self,
        name: &str,
        section_key: &str,
        _kind: MediaKind,
        items: &[ItemRef],
    ) -> AppResult<CollectionRef> {
        let mut state = self.state();
        state.mutations += 1;
        state.next_id += 1;
        let id = format!("c{}", state.next_id);
        state.collections.push(StoredCollection {
            id: id.clone(),
            title: name.to_string(),
            section_key: section_key.to_string(),
            items: items.to_vec(),
            pinned_at: None,
            has_poster: false,
        });
        Ok(CollectionRef {
            id,
            title: name.to_string(),
        })
    }

    async fn add_collection_items(&self, collection_id: &str, items: &[ItemRef]) -> AppResult<()> {
        let mut state = self.state();
        state.mutations += 1;
        let collection = state.collection_mut(collection_id)?;
        for item in items {
            if !collection.items.contains(item) {
                collection.items.push(item.clone());
            }
        }
        Ok(())
    }

    async fn remove_collection_items(&self, collection_id: &str, items: &[ItemRef]) -> AppResult<()> {
        let mut state = self.state();
        state.mutations += 1;
        let collection = state.collection_mut(collection_id)?;
        collection.items.retain(|i| !items.contains(i));
        Ok(())
    }

    async fn move_collection_item(
        &self,
        collection_id: &str,
        item: &str,
        after: Option<&str>,
    ) -> AppResult<()> {
        let mut state = self.state();
        state.mutations += 1;
        let collection = state.collection_mut(collection_id)?;
        let from = collection
            .items
            .iter()
            .position(|i| i == item)
            .ok_or_else(|| AppError::NotFound(format!("item {} in collection", item)))?;
        let moved = collection.items.remove(from);
        let to = match after {
            None => 0,
            Some(anchor) => {
                collection
                    .items
                    .iter()
                    .position(|i| i == anchor)
                    .ok_or_else(|| AppError::NotFound(format!("item {} in collection", anchor)))?
                    + 1
            }
        };
        collection.items.insert(to, moved);
        Ok(())
    }

    async fn delete_collection(&self, collection_id: &str) -> AppResult<()> {
        let mut state = self.state();
        state.mutations += 1;
        state.collections.retain(|c| c.id != collection_id);
        Ok(())
    }

    async fn pin_collection(
        &self,
        collection_id: &str,
        _section_key: &str,
        position: u32,
    ) -> AppResult<()> {
        let mut state = self.state();
        state.mutations += 1;
        state.collection_mut(collection_id)?.pinned_at = Some(position);
        Ok(())
    }

    async fn upload_collection_poster(&self, collection_id: &str, _image: Vec<u8>) -> AppResult<()> {
        let mut state = self.state();
        state.mutations += 1;
        state.collection_mut(collection_id)?.has_poster = true;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_move_semantics() {
        let server = InMemoryMediaServer::new();
        let id = server.seed_collection("1", "Picks", &["a", "b", "c"]);

        server.move_collection_item(&id, "c", None).await.unwrap();
        assert_eq!(server.get_collection_items(&id).await.unwrap(), vec!["c", "a", "b"]);

        server.move_collection_item(&id, "c", Some("b")).await.unwrap();
        assert_eq!(server.get_collection_items(&id).await.unwrap(), vec!["a", "b", "c"]);
        assert_eq!(server.mutations(), 2);
    }

    #[tokio::test]
    async fn test_failing_section() {
        let server = InMemoryMediaServer::new()
            .with_section("2", "Friend Movies", MediaKind::Movie)
            .with_item("2", "201", "603", "The Matrix");
        assert_eq!(server.list_items_with_external_ids("2").await.unwrap().len(), 1);

        server.fail_section("2");
        let err = server.list_items_with_external_ids("2").await.unwrap_err();
        assert!(err.is_retryable());
    }
}
