use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::{ItemRef, MediaKind};
use crate::error::AppError;

/// Whether a recommendation is already on the media server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationStatus {
    /// Recommended but not yet in the library
    Pending,
    /// In the library and part of the curated set
    Active,
}

impl RecommendationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Active => "active",
        }
    }
}

impl FromStr for RecommendationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RecommendationStatus::Pending),
            "active" => Ok(RecommendationStatus::Active),
            other => Err(AppError::Internal(format!("Unknown record status: {}", other))),
        }
    }
}

/// Gate for issuing a download request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DownloadApproval {
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
}

impl DownloadApproval {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadApproval::None => "none",
            DownloadApproval::Pending => "pending",
            DownloadApproval::Approved => "approved",
            DownloadApproval::Rejected => "rejected",
        }
    }
}

impl FromStr for DownloadApproval {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(DownloadApproval::None),
            "pending" => Ok(DownloadApproval::Pending),
            "approved" => Ok(DownloadApproval::Approved),
            "rejected" => Ok(DownloadApproval::Rejected),
            other => Err(AppError::Internal(format!("Unknown download approval: {}", other))),
        }
    }
}

/// Per-user, per-library recommendation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRecord {
    pub user_id: String,
    pub library_id: String,
    pub media_kind: MediaKind,
    pub external_id: String,
    pub title: Option<String>,
    pub status: RecommendationStatus,
    pub points: u32,
    pub download_approval: DownloadApproval,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
    pub poster_ref: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecommendationRecord {
    pub fn new(
        user_id: impl Into<String>,
        library_id: impl Into<String>,
        media_kind: MediaKind,
        external_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            library_id: library_id.into(),
            media_kind,
            external_id: external_id.into(),
            title: None,
            status: RecommendationStatus::Pending,
            points: 0,
            download_approval: DownloadApproval::None,
            vote_average: None,
            vote_count: None,
            poster_ref: None,
            sent_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RecommendationStatus::Active
    }

    pub fn activate(&mut self, max_points: u32) {
        self.status = RecommendationStatus::Active;
        self.points = max_points;
    }

    /// Fills fields the record is missing; never clears known values.
    pub fn absorb(&mut self, suggestion: &Suggestion) {
        if let Some(title) = &suggestion.title {
            if self.title.as_deref().map_or(true, str::is_empty) {
                self.title = Some(title.clone());
            }
        }
        if self.vote_average.is_none() {
            self.vote_average = suggestion.vote_average;
        }
        if self.vote_count.is_none() {
            self.vote_count = suggestion.vote_count;
        }
    }

    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.external_id)
    }
}

/// One entry of an upstream suggestion batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub external_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
    #[serde(default)]
    pub vote_count: Option<i64>,
    #[serde(default)]
    pub present_in_library: bool,
}

impl Suggestion {
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: None,
            vote_average: None,
            vote_count: None,
            present_in_library: false,
        }
    }

    pub fn present(mut self) -> Self {
        self.present_in_library = true;
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Combines a duplicate entry: non-null fields win, presence is OR-ed.
    pub fn merge(&mut self, other: &Suggestion) {
        if self.title.is_none() {
            self.title = other.title.clone();
        }
        if self.vote_average.is_none() {
            self.vote_average = other.vote_average;
        }
        if self.vote_count.is_none() {
            self.vote_count = other.vote_count;
        }
        self.present_in_library |= other.present_in_library;
    }
}

/// Permanent dismissal of an external id for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedSuggestion {
    pub user_id: String,
    pub media_kind: MediaKind,
    pub external_source: String,
    pub external_id: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Presence suppresses the legacy bootstrap for a (kind, library) scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetMarker {
    pub media_kind: MediaKind,
    pub library_id: String,
    pub created_at: DateTime<Utc>,
}

/// Written the first time a (user, kind, library) scope is looked at for
/// legacy adoption; the bootstrap never runs there again
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapMarker {
    pub user_id: String,
    pub media_kind: MediaKind,
    pub library_id: String,
    pub created_at: DateTime<Utc>,
}

/// Last applied ordering of a curated collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CuratedCollectionSnapshot {
    pub user_id: String,
    pub library_id: String,
    pub collection_name: String,
    pub external_ids: Vec<String>,
    pub item_refs: Vec<ItemRef>,
    pub applied_at: DateTime<Utc>,
}

/// Record selector; `None` fields match anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub user_id: Option<String>,
    pub library_id: Option<String>,
    pub media_kind: Option<MediaKind>,
    pub status: Option<RecommendationStatus>,
    pub external_ids: Option<Vec<String>>,
}

impl RecordFilter {
    pub fn scope(user_id: &str, library_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            library_id: Some(library_id.to_string()),
            ..Default::default()
        }
    }

    pub fn user(user_id: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            ..Default::default()
        }
    }

    pub fn library(library_id: &str) -> Self {
        Self {
            library_id: Some(library_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = Some(kind);
        self
    }

    pub fn with_status(mut self, status: RecommendationStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_ids(mut self, ids: Vec<String>) -> Self {
        self.external_ids = Some(ids);
        self
    }

    pub fn matches(&self, record: &RecommendationRecord) -> bool {
        self.user_id.as_ref().map_or(true, |u| *u == record.user_id)
            && self.library_id.as_ref().map_or(true, |l| *l == record.library_id)
            && self.media_kind.map_or(true, |k| k == record.media_kind)
            && self.status.map_or(true, |s| s == record.status)
            && self
                .external_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&record.external_id))
    }
}
