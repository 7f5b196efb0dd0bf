/// TMDB metadata provider
///
/// Supplies vote average, vote count and poster path for movies (`/movie/{id}`)
/// and shows (`/tv/{id}`). Lookups, including misses, are cached for a week.
use std::time::Duration;

use reqwest::{Client as HttpClient, StatusCode};
use serde::Deserialize;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{MediaKind, VoteStats},
    services::providers::MetadataProvider,
};

const VOTE_CACHE_TTL: u64 = 604800; // 1 week
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct TmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Option<Cache>,
}

#[derive(Deserialize)]
struct TmdbDetails {
    #[serde(default)]
    vote_average: Option<f64>,
    #[serde(default)]
    vote_count: Option<i64>,
    #[serde(default)]
    poster_path: Option<String>,
}

impl TmdbDetails {
    /// `None` when TMDB has no average, so the item stays unrated
    fn into_vote_stats(self) -> Option<VoteStats> {
        let average = self.vote_average?;
        Some(VoteStats {
            average,
            count: self.vote_count.unwrap_or(0),
            poster_path: self.poster_path,
        })
    }
}

fn details_path(kind: MediaKind) -> &'static str {
    match kind {
        MediaKind::Movie => "movie",
        MediaKind::Show => "tv",
    }
}

impl TmdbProvider {
    pub fn new(api_key: String, api_url: String, cache: Option<Cache>) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
        })
    }

    async fn fetch_vote_stats(&self, kind: MediaKind, external_id: &str) -> AppResult<Option<VoteStats>> {
        let url = format!("{}/{}/{}", self.api_url, details_path(kind), external_id);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(kind = %kind, external_id, "TMDB has no entry");
            return Ok(None);
        }

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external("tmdb", status, body));
        }

        let details: TmdbDetails = response.json().await?;
        let stats = details.into_vote_stats();
        if stats.is_none() {
            tracing::debug!(kind = %kind, external_id, "TMDB entry has no votes");
        }
        Ok(stats)
    }
}

#[async_trait::async_trait]
impl MetadataProvider for TmdbProvider {
    async fn vote_stats(&self, kind: MediaKind, external_id: &str) -> AppResult<Option<VoteStats>> {
        match &self.cache {
            Some(cache) => {
                cached!(
                    cache,
                    CacheKey::VoteStats(kind, external_id.to_string()),
                    VOTE_CACHE_TTL,
                    self.fetch_vote_stats(kind, external_id)
                )
            }
            None => self.fetch_vote_stats(kind, external_id).await,
        }
    }

    fn name(&self) -> &'static str {
        "TMDB"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_into_vote_stats() {
        let details: TmdbDetails = serde_json::from_str(
            r#"{"id":603,"title":"The Matrix","vote_average":8.2,"vote_count":25000,"poster_path":"/f89U3ADr1oiB1s9GkdPOEpXUk5H.jpg"}"#,
        )
        .unwrap();
        let stats = details.into_vote_stats().unwrap();
        assert_eq!(stats.average, 8.2);
        assert_eq!(stats.count, 25000);
        assert!(stats.poster_path.is_some());
    }

    #[test]
    fn test_missing_average_leaves_item_unrated() {
        let details: TmdbDetails =
            serde_json::from_str(r#"{"id":1,"vote_count":12,"poster_path":"/x.jpg"}"#).unwrap();
        assert!(details.into_vote_stats().is_none());

        let details: TmdbDetails = serde_json::from_str(r#"{"id":2,"vote_average":6.5}"#).unwrap();
        let stats = details.into_vote_stats().unwrap();
        assert_eq!(stats.average, 6.5);
        assert_eq!(stats.count, 0);
    }

    #[test]
    fn test_details_path_per_kind() {
        assert_eq!(details_path(MediaKind::Movie), "movie");
        assert_eq!(details_path(MediaKind::Show), "tv");
    }
}
