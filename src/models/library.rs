use serde::{Deserialize, Serialize};

use super::MediaKind;

/// Media-server local item reference (Plex rating key)
pub type ItemRef = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibrarySection {
    pub key: String,
    pub title: String,
    pub kind: MediaKind,
}

/// Library item resolved to its external id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryItem {
    pub item_ref: ItemRef,
    pub external_id: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionRef {
    pub id: String,
    pub title: String,
}

/// Rating signals and poster from the metadata provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStats {
    pub average: f64,
    pub count: i64,
    #[serde(default)]
    pub poster_path: Option<String>,
}

/// Request to add an item to a download service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemSpec {
    pub kind: MediaKind,
    pub external_id: String,
    pub title: String,
    pub search: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddedItem {
    pub id: i64,
    pub title: String,
    /// Already present before this request
    pub existed: bool,
}

/// Item tracked by a download service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadItem {
    pub id: i64,
    pub external_id: String,
    pub title: String,
    pub monitored: bool,
}
