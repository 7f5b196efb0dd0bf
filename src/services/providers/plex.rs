/// Plex Media Server client
///
/// Talks to the server's JSON API (`Accept: application/json`) with the
/// admin token. Collections are addressed by rating key; items are attached
/// through `server://<machine>/…/library/metadata/<keys>` URIs, which is why
/// the server's machine identifier is fetched once and kept.
use std::time::Duration;

use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tokio::sync::OnceCell;

use crate::{
    error::{AppError, AppResult},
    models::{CollectionRef, ItemRef, LibraryItem, LibrarySection, MediaKind},
    services::providers::MediaServer,
};

const SHORT_TIMEOUT: Duration = Duration::from_secs(30);
const LONG_TIMEOUT: Duration = Duration::from_secs(60);

pub struct PlexClient {
    http_client: HttpClient,
    base_url: String,
    token: String,
    machine_id: OnceCell<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    container: T,
}

#[derive(Deserialize, Default)]
struct DirectoryContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<Directory>,
}

#[derive(Deserialize)]
struct Directory {
    key: String,
    title: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize, Default)]
struct MetadataContainer {
    #[serde(rename = "Metadata", default)]
    metadata: Vec<Metadata>,
}

#[derive(Deserialize)]
struct Metadata {
    #[serde(rename = "ratingKey")]
    rating_key: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "Guid", default)]
    guids: Vec<Guid>,
}

#[derive(Deserialize)]
struct Guid {
    id: String,
}

#[derive(Deserialize)]
struct Identity {
    #[serde(rename = "machineIdentifier")]
    machine_identifier: String,
}

#[derive(Deserialize, Default)]
struct HubContainer {
    #[serde(rename = "Hub", default)]
    hubs: Vec<Hub>,
}

#[derive(Deserialize)]
struct Hub {
    identifier: String,
}

impl PlexClient {
    pub fn new(base_url: String, token: String) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(SHORT_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            machine_id: OnceCell::new(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.token)
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external("plex", status, body));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned + Default>(
        &self,
        path: &str,
        timeout: Duration,
    ) -> AppResult<T> {
        let response = self
            .send(self.request(Method::GET, path).timeout(timeout))
            .await?;
        // Plex answers empty containers with an empty body on some endpoints.
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(T::default());
        }
        let envelope: Envelope<T> = serde_json::from_str(&body)
            .map_err(|e| AppError::Internal(format!("Invalid Plex response for {}: {}", path, e)))?;
        Ok(envelope.container)
    }

    async fn machine_id(&self) -> AppResult<&str> {
        let id = self
            .machine_id
            .get_or_try_init(|| async {
                let response = self
                    .send(self.request(Method::GET, "/identity"))
                    .await?;
                let identity: Envelope<Identity> = response.json().await?;
                Ok::<_, AppError>(identity.container.machine_identifier)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn metadata_uri(&self, items: &[ItemRef]) -> AppResult<String> {
        let machine_id = self.machine_id().await?;
        Ok(format!(
            "server://{}/com.plexapp.plugins.library/library/metadata/{}",
            machine_id,
            items.join(",")
        ))
    }
}

/// Plex collection `type` parameter for a section kind
fn plex_type(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "1",
        MediaKind::Show => "2",
    }
}

fn parse_section_kind(kind: &str) -> Option<MediaKind> {
    match kind {
        "movie" => Some(MediaKind::Movie),
        "show" => Some(MediaKind::Show),
        _ => None,
    }
}

/// Extracts the TMDB id from Plex guids such as `tmdb://603`
fn tmdb_id(guids: &[Guid]) -> Option<String> {
    guids
        .iter()
        .find_map(|g| g.id.strip_prefix("tmdb://"))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait::async_trait]
impl MediaServer for PlexClient {
    async fn list_library_sections(&self) -> AppResult<Vec<LibrarySection>> {
        let container: DirectoryContainer =
            self.get_json("/library/sections", SHORT_TIMEOUT).await?;

        Ok(container
            .directories
            .into_iter()
            .filter_map(|d| {
                parse_section_kind(&d.kind).map(|kind| LibrarySection {
                    key: d.key,
                    title: d.title,
                    kind,
                })
            })
            .collect())
    }

    #[tracing::instrument(skip(self))]
    async fn list_items_with_external_ids(&self, section_key: &str) -> AppResult<Vec<LibraryItem>> {
        let path = format!("/library/sections/{}/all?includeGuids=1", section_key);
        let container: MetadataContainer = self.get_json(&path, LONG_TIMEOUT).await?;
        let total = container.metadata.len();

        let items: Vec<LibraryItem> = container
            .metadata
            .into_iter()
            .filter_map(|m| {
                tmdb_id(&m.guids).map(|external_id| LibraryItem {
                    item_ref: m.rating_key,
                    external_id,
                    title: m.title,
                })
            })
            .collect();

        tracing::debug!(total, with_external_id = items.len(), "Listed Plex library items");
        Ok(items)
    }

    async fn find_collection_by_name(
        &self,
        name: &str,
        section_key: &str,
    ) -> AppResult<Option<CollectionRef>> {
        let path = format!("/library/sections/{}/collections", section_key);
        let container: MetadataContainer = self.get_json(&path, SHORT_TIMEOUT).await?;

        Ok(container
            .metadata
            .into_iter()
            .find(|m| m.title == name)
            .map(|m| CollectionRef {
                id: m.rating_key,
                title: m.title,
            }))
    }

    async fn get_collection_items(&self, collection_id: &str) -> AppResult<Vec<ItemRef>> {
        let path = format!("/library/collections/{}/children", collection_id);
        let container: MetadataContainer = self.get_json(&path, SHORT_TIMEOUT).await?;
        Ok(container.metadata.into_iter().map(|m| m.rating_key).collect())
    }

    #[tracing::instrument(skip(self, items), fields(items = items.len()))]
    async fn create_collection(
        &self,
        name: &str,
        section_key: &str,
        kind: MediaKind,
        items: &[ItemRef],
    ) -> AppResult<CollectionRef> {
        let uri = self.metadata_uri(items).await?;
        let response = self
            .send(self.request(Method::POST, "/library/collections").query(&[
                ("type", plex_type(kind)),
                ("title", name),
                ("smart", "0"),
                ("sectionId", section_key),
                ("uri", uri.as_str()),
            ]))
            .await?;

        let container: Envelope<MetadataContainer> = response.json().await?;
        let created = container
            .container
            .metadata
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal(format!("Plex did not return collection {}", name)))?;

        // Custom sort so explicit moves stick.
        self.send(
            self.request(Method::PUT, &format!("/library/metadata/{}/prefs", created.rating_key))
                .query(&[("collectionSort", "2")]),
        )
        .await?;

        tracing::info!(collection_id = %created.rating_key, "Created Plex collection");
        Ok(CollectionRef {
            id: created.rating_key,
            title: name.to_string(),
        })
    }

    async fn add_collection_items(&self, collection_id: &str, items: &[ItemRef]) -> AppResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let uri = self.metadata_uri(items).await?;
        self.send(
            self.request(Method::PUT, &format!("/library/collections/{}/items", collection_id))
                .query(&[("uri", uri.as_str())]),
        )
        .await?;
        Ok(())
    }

    async fn remove_collection_items(&self, collection_id: &str, items: &[ItemRef]) -> AppResult<()> {
        for item in items {
            self.send(self.request(
                Method::DELETE,
                &format!("/library/collections/{}/items/{}", collection_id, item),
            ))
            .await?;
        }
        Ok(())
    }

    async fn move_collection_item(
        &self,
        collection_id: &str,
        item: &str,
        after: Option<&str>,
    ) -> AppResult<()> {
        let mut request = self.request(
            Method::PUT,
            &format!("/library/collections/{}/items/{}/move", collection_id, item),
        );
        if let Some(after) = after {
            request = request.query(&[("after", after)]);
        }
        self.send(request).await?;
        Ok(())
    }

    async fn delete_collection(&self, collection_id: &str) -> AppResult<()> {
        self.send(self.request(Method::DELETE, &format!("/library/collections/{}", collection_id)))
            .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn pin_collection(
        &self,
        collection_id: &str,
        section_key: &str,
        position: u32,
    ) -> AppResult<()> {
        let manage = format!("/hubs/sections/{}/manage", section_key);
        self.send(self.request(Method::POST, &manage).query(&[
            ("metadataItemId", collection_id),
            ("promotedToRecommended", "1"),
            ("promotedToOwnHome", "1"),
            ("promotedToSharedHome", "1"),
        ]))
        .await?;

        let container: HubContainer = self.get_json(&manage, SHORT_TIMEOUT).await?;
        let suffix = format!(".{}", collection_id);
        let ours = container
            .hubs
            .iter()
            .position(|h| h.identifier.ends_with(&suffix))
            .ok_or_else(|| AppError::NotFound(format!("hub for collection {}", collection_id)))?;

        let others: Vec<&Hub> = container
            .hubs
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != ours)
            .map(|(_, h)| h)
            .collect();
        let target = (position as usize).min(others.len());

        let mut request = self.request(
            Method::PUT,
            &format!("{}/{}/move", manage, container.hubs[ours].identifier),
        );
        if target > 0 {
            request = request.query(&[("after", others[target - 1].identifier.as_str())]);
        }
        self.send(request).await?;
        Ok(())
    }

    async fn upload_collection_poster(&self, collection_id: &str, image: Vec<u8>) -> AppResult<()> {
        self.send(
            self.request(Method::POST, &format!("/library/metadata/{}/posters", collection_id))
                .timeout(LONG_TIMEOUT)
                .body(image),
        )
        .await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Plex"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tmdb_id_from_guids() {
        let guids = vec![
            Guid {
                id: "imdb://tt0133093".to_string(),
            },
            Guid {
                id: "tmdb://603".to_string(),
            },
        ];
        assert_eq!(tmdb_id(&guids).as_deref(), Some("603"));
        assert_eq!(tmdb_id(&guids[..1]), None);
    }

    #[test]
    fn test_parse_library_items_payload() {
        let body = r#"{"MediaContainer":{"size":2,"Metadata":[
            {"ratingKey":"101","title":"The Matrix","Guid":[{"id":"tmdb://603"}]},
            {"ratingKey":"102","title":"Home Video"}
        ]}}"#;
        let envelope: Envelope<MetadataContainer> = serde_json::from_str(body).unwrap();
        let items: Vec<_> = envelope
            .container
            .metadata
            .iter()
            .filter_map(|m| tmdb_id(&m.guids).map(|id| (m.rating_key.clone(), id)))
            .collect();
        assert_eq!(items, vec![("101".to_string(), "603".to_string())]);
    }

    #[test]
    fn test_section_kinds() {
        assert_eq!(parse_section_kind("movie"), Some(MediaKind::Movie));
        assert_eq!(parse_section_kind("show"), Some(MediaKind::Show));
        assert_eq!(parse_section_kind("artist"), None);
        assert_eq!(plex_type(MediaKind::Show), "2");
    }

    #[test]
    fn test_base_url_is_normalised() {
        let client = PlexClient::new("http://plex.local:32400/".to_string(), "t".to_string()).unwrap();
        assert_eq!(client.base_url, "http://plex.local:32400");
    }
}
