/// Radarr / Sonarr download-request client
///
/// Both services share the v3 API shape; only the resource name (`movie` vs
/// `series`), the lookup endpoint and the add options differ.
use std::time::Duration;

use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::ArrSettings,
    error::{AppError, AppResult},
    models::{AddItemSpec, AddedItem, DownloadItem, MediaKind},
    services::providers::DownloadRequester,
};

const SHORT_TIMEOUT: Duration = Duration::from_secs(30);
const LONG_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ArrClient {
    http_client: HttpClient,
    settings: ArrSettings,
    kind: MediaKind,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArrItem {
    id: i64,
    #[serde(default)]
    tmdb_id: Option<i64>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    monitored: bool,
}

#[derive(Deserialize)]
struct ArrTag {
    id: i64,
    label: String,
}

impl ArrClient {
    pub fn radarr(settings: ArrSettings) -> AppResult<Self> {
        Self::new(settings, MediaKind::Movie)
    }

    pub fn sonarr(settings: ArrSettings) -> AppResult<Self> {
        Self::new(settings, MediaKind::Show)
    }

    fn new(settings: ArrSettings, kind: MediaKind) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(SHORT_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            settings,
            kind,
        })
    }

    fn service(&self) -> &'static str {
        match self.kind {
            MediaKind::Movie => "radarr",
            MediaKind::Show => "sonarr",
        }
    }

    fn resource(&self) -> &'static str {
        match self.kind {
            MediaKind::Movie => "movie",
            MediaKind::Show => "series",
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}/api/v3/{}", self.settings.url, path))
            .header("X-Api-Key", &self.settings.api_key)
    }

    async fn send(&self, request: RequestBuilder) -> AppResult<Response> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external(self.service(), status, body));
        }
        Ok(response)
    }

    /// Resolves a TMDB id to the service's lookup payload
    async fn lookup(&self, external_id: &str) -> AppResult<Option<Value>> {
        let request = match self.kind {
            MediaKind::Movie => self
                .request(Method::GET, "movie/lookup/tmdb")
                .query(&[("tmdbId", external_id)]),
            MediaKind::Show => {
                let term = format!("tmdb:{}", external_id);
                self.request(Method::GET, "series/lookup")
                    .query(&[("term", term.as_str())])
            }
        };

        let body: Value = self.send(request.timeout(LONG_TIMEOUT)).await?.json().await?;
        let found = match body {
            Value::Array(results) => results.into_iter().next(),
            found @ Value::Object(_) => Some(found),
            _ => None,
        };
        Ok(found)
    }

    /// Maps configured tag labels to ids, creating missing tags
    async fn tag_ids(&self) -> AppResult<Vec<i64>> {
        if self.settings.tags.is_empty() {
            return Ok(Vec::new());
        }

        let existing: Vec<ArrTag> = self.send(self.request(Method::GET, "tag")).await?.json().await?;
        let mut ids = Vec::with_capacity(self.settings.tags.len());
        for label in &self.settings.tags {
            match existing.iter().find(|t| t.label.eq_ignore_ascii_case(label)) {
                Some(tag) => ids.push(tag.id),
                None => {
                    let created: ArrTag = self
                        .send(self.request(Method::POST, "tag").json(&json!({ "label": label })))
                        .await?
                        .json()
                        .await?;
                    ids.push(created.id);
                }
            }
        }
        Ok(ids)
    }

    fn add_payload(&self, mut lookup: Value, spec: &AddItemSpec, tags: Vec<i64>) -> Value {
        let add_options = match self.kind {
            MediaKind::Movie => json!({ "searchForMovie": spec.search }),
            MediaKind::Show => json!({ "searchForMissingEpisodes": spec.search }),
        };

        if let Value::Object(map) = &mut lookup {
            map.insert("qualityProfileId".into(), json!(self.settings.quality_profile_id));
            map.insert("rootFolderPath".into(), json!(self.settings.root_folder));
            map.insert("monitored".into(), json!(true));
            map.insert("tags".into(), json!(tags));
            map.insert("addOptions".into(), add_options);
            if self.kind == MediaKind::Show {
                map.insert("seasonFolder".into(), json!(true));
            }
        }
        lookup
    }
}

#[async_trait::async_trait]
impl DownloadRequester for ArrClient {
    #[tracing::instrument(skip(self, spec), fields(external_id = %spec.external_id))]
    async fn add_item(&self, spec: &AddItemSpec) -> AppResult<Option<AddedItem>> {
        let Some(lookup) = self.lookup(&spec.external_id).await? else {
            tracing::warn!("Lookup returned nothing; cannot request download");
            return Ok(None);
        };

        // Lookup results for items the service already tracks carry their id.
        if let Some(id) = lookup.get("id").and_then(Value::as_i64).filter(|id| *id > 0) {
            let title = lookup
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or(spec.title.as_str())
                .to_string();
            tracing::info!(id, "Already tracked by download service");
            return Ok(Some(AddedItem {
                id,
                title,
                existed: true,
            }));
        }

        let tags = self.tag_ids().await?;
        let payload = self.add_payload(lookup, spec, tags);
        let added: ArrItem = self
            .send(
                self.request(Method::POST, self.resource())
                    .timeout(LONG_TIMEOUT)
                    .json(&payload),
            )
            .await?
            .json()
            .await?;

        tracing::info!(id = added.id, title = %added.title, "Download requested");
        Ok(Some(AddedItem {
            id: added.id,
            title: added.title,
            existed: false,
        }))
    }

    async fn set_item_monitored(&self, item: &DownloadItem, monitored: bool) -> AppResult<()> {
        let path = format!("{}/{}", self.resource(), item.id);
        let mut current: Value = self.send(self.request(Method::GET, &path)).await?.json().await?;
        if let Value::Object(map) = &mut current {
            map.insert("monitored".into(), json!(monitored));
        }
        self.send(self.request(Method::PUT, &path).json(&current))
            .await?;
        Ok(())
    }

    async fn list_items(&self) -> AppResult<Vec<DownloadItem>> {
        let items: Vec<ArrItem> = self
            .send(self.request(Method::GET, self.resource()).timeout(LONG_TIMEOUT))
            .await?
            .json()
            .await?;

        Ok(items
            .into_iter()
            .filter_map(|i| {
                i.tmdb_id.filter(|id| *id > 0).map(|tmdb| DownloadItem {
                    id: i.id,
                    external_id: tmdb.to_string(),
                    title: i.title,
                    monitored: i.monitored,
                })
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        match self.kind {
            MediaKind::Movie => "Radarr",
            MediaKind::Show => "Sonarr",
        }
    }
}
