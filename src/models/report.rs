use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::MediaKind;

/// Outcome of one scope (user or library) of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeStatus {
    Success,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Flat, human-reviewable problem entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub severity: Severity,
    /// `user` or `user/library`
    pub scope: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Targeted,
    Sweep,
}

/// Overall verdict, mirrored by the CLI exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failed,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Partial => 10,
            RunStatus::Failed => 30,
        }
    }
}

/// Counts produced by the points ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSummary {
    pub created_active: u32,
    pub created_pending: u32,
    pub refreshed_active: u32,
    pub promoted: u32,
    pub updated_pending: u32,
    pub decayed: u32,
    pub removed: u32,
    pub skipped_rejected: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationSummary {
    pub promoted: u32,
    pub awaiting_download: u32,
    pub enriched: u32,
    pub enrichment_failed: u32,
    pub unmonitored: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSummary {
    pub requested: u32,
    pub request_failed: u32,
    pub purged_rejected: u32,
    pub skipped_no_client: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    pub collection_id: Option<String>,
    pub created: bool,
    pub desired: u32,
    pub added: u32,
    pub removed: u32,
    pub moved: u32,
    pub move_failed: u32,
    pub pinned: bool,
    pub artwork_set: bool,
    pub skip_reason: Option<String>,
}

impl ReconcileSummary {
    pub fn mutations(&self) -> u32 {
        self.added + self.removed + self.moved + u32::from(self.created)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryReport {
    pub library_id: String,
    pub media_kind: MediaKind,
    pub collection_name: String,
    pub status: ScopeStatus,
    pub error: Option<String>,
    pub bootstrapped: u32,
    pub ledger: Option<LedgerSummary>,
    pub activation: ActivationSummary,
    pub downloads: DownloadSummary,
    pub reconcile: ReconcileSummary,
    /// Active and pending records in scope after the run
    pub active: u32,
    pub pending: u32,
    /// Active records whose item is not in the library
    pub missing_from_library: u32,
    pub status_line: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserReport {
    pub user_id: String,
    pub status: ScopeStatus,
    pub error: Option<String>,
    pub libraries: Vec<LibraryReport>,
}

/// Structured summary of a targeted run or a sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub mode: RunMode,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub users_succeeded: u32,
    pub users_failed: u32,
    pub users: Vec<UserReport>,
    pub issues: Vec<Issue>,
}

impl RunReport {
    pub fn user(&self, user_id: &str) -> Option<&UserReport> {
        self.users.iter().find(|u| u.user_id == user_id)
    }
}
