/// Approval state machine
///
/// Gates which pending records may be sent to a download service and keeps
/// the per-user rejection list in step with the record's approval state.
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::DatasetStore,
    error::AppResult,
    models::{DownloadApproval, MediaKind, RecommendationRecord, RecordFilter, RejectedSuggestion},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalAction {
    Approve,
    Reject,
    Remove,
    Undo,
}

impl FromStr for ApprovalAction {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "approve" => Ok(ApprovalAction::Approve),
            "reject" => Ok(ApprovalAction::Reject),
            "remove" => Ok(ApprovalAction::Remove),
            "undo" => Ok(ApprovalAction::Undo),
            _ => Err(()),
        }
    }
}

/// What has to happen to the rejection list after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionEffect {
    Keep,
    Record,
    Clear,
}

/// Moves a record's approval and reports the matching rejection-list change
pub fn transition(record: &mut RecommendationRecord, action: ApprovalAction) -> RejectionEffect {
    let previous = record.download_approval;
    match action {
        ApprovalAction::Approve => {
            record.download_approval = DownloadApproval::Approved;
            RejectionEffect::Clear
        }
        ApprovalAction::Reject | ApprovalAction::Remove => {
            record.download_approval = DownloadApproval::Rejected;
            RejectionEffect::Record
        }
        ApprovalAction::Undo => {
            record.download_approval = if record.is_active() {
                DownloadApproval::None
            } else {
                DownloadApproval::Pending
            };
            if previous == DownloadApproval::Rejected {
                RejectionEffect::Clear
            } else {
                RejectionEffect::Keep
            }
        }
    }
}

/// One requested action, as received over the API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub library_id: String,
    pub external_id: String,
    pub action: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalSummary {
    pub approved: u32,
    pub rejected: u32,
    pub undone: u32,
    pub ignored: u32,
    pub missing: u32,
}

/// Applies a batch of actions for one user and media kind
///
/// Unknown action strings are counted as ignored; ids without a record in
/// the named library are counted as missing. Neither is an error.
pub async fn apply_actions(
    store: &dyn DatasetStore,
    user_id: &str,
    kind: MediaKind,
    requests: &[ApprovalRequest],
    dry_run: bool,
) -> AppResult<ApprovalSummary> {
    let mut summary = ApprovalSummary::default();

    for request in requests {
        let Ok(action) = request.action.parse::<ApprovalAction>() else {
            tracing::debug!(action = %request.action, external_id = %request.external_id, "Ignoring unknown approval action");
            summary.ignored += 1;
            continue;
        };

        let filter = RecordFilter::scope(user_id, &request.library_id)
            .with_kind(kind)
            .with_ids(vec![request.external_id.clone()]);
        let Some(mut record) = store.find_records(&filter).await?.into_iter().next() else {
            summary.missing += 1;
            continue;
        };

        let effect = transition(&mut record, action);
        record.updated_at = Utc::now();

        match action {
            ApprovalAction::Approve => summary.approved += 1,
            ApprovalAction::Reject | ApprovalAction::Remove => summary.rejected += 1,
            ApprovalAction::Undo => summary.undone += 1,
        }

        if dry_run {
            continue;
        }

        store.upsert_record(&record).await?;
        match effect {
            RejectionEffect::Record => {
                store
                    .upsert_rejection(&RejectedSuggestion {
                        user_id: user_id.to_string(),
                        media_kind: kind,
                        external_source: kind.external_source().to_string(),
                        external_id: record.external_id.clone(),
                        reason: request.reason.clone(),
                        created_at: Utc::now(),
                    })
                    .await?;
            }
            RejectionEffect::Clear => {
                store
                    .delete_rejection(user_id, kind, kind.external_source(), &record.external_id)
                    .await?;
            }
            RejectionEffect::Keep => {}
        }
    }

    tracing::info!(
        user_id = %user_id,
        kind = %kind,
        approved = summary.approved,
        rejected = summary.rejected,
        undone = summary.undone,
        ignored = summary.ignored,
        missing = summary.missing,
        dry_run,
        "Applied approval actions"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryDatasetStore;
    use crate::models::RecommendationStatus;

    fn request(id: &str, action: &str) -> ApprovalRequest {
        ApprovalRequest {
            library_id: "1".to_string(),
            external_id: id.to_string(),
            action: action.to_string(),
            reason: None,
        }
    }

    async fn store_with_pending(id: &str) -> MemoryDatasetStore {
        let mut record = RecommendationRecord::new("admin", "1", MediaKind::Movie, id);
        record.download_approval = DownloadApproval::Pending;
        MemoryDatasetStore::seeded(vec![record]).await.unwrap()
    }

    async fn approval_of(store: &MemoryDatasetStore, id: &str) -> DownloadApproval {
        store
            .find_records(&RecordFilter::scope("admin", "1").with_ids(vec![id.to_string()]))
            .await
            .unwrap()[0]
            .download_approval
    }

    #[test]
    fn test_transitions() {
        let mut record = RecommendationRecord::new("admin", "1", MediaKind::Movie, "1");
        record.download_approval = DownloadApproval::Pending;

        assert_eq!(transition(&mut record, ApprovalAction::Reject), RejectionEffect::Record);
        assert_eq!(record.download_approval, DownloadApproval::Rejected);
        assert_eq!(transition(&mut record, ApprovalAction::Undo), RejectionEffect::Clear);
        assert_eq!(record.download_approval, DownloadApproval::Pending);

        record.status = RecommendationStatus::Active;
        assert_eq!(transition(&mut record, ApprovalAction::Approve), RejectionEffect::Clear);
        assert_eq!(transition(&mut record, ApprovalAction::Undo), RejectionEffect::Keep);
        assert_eq!(record.download_approval, DownloadApproval::None);
    }

    #[test]
    fn test_unknown_actions_do_not_parse() {
        assert_eq!("APPROVE".parse::<ApprovalAction>(), Ok(ApprovalAction::Approve));
        assert!("delete-forever".parse::<ApprovalAction>().is_err());
    }

    #[tokio::test]
    async fn test_reject_records_rejection() {
        let store = store_with_pending("42").await;
        let mut reject = request("42", "reject");
        reject.reason = Some("not interested".to_string());

        let summary = apply_actions(&store, "admin", MediaKind::Movie, &[reject], false)
            .await
            .unwrap();
        assert_eq!(summary.rejected, 1);
        assert_eq!(approval_of(&store, "42").await, DownloadApproval::Rejected);

        let rejections = store.find_rejections("admin", MediaKind::Movie).await.unwrap();
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].external_source, "tmdb");
        assert_eq!(rejections[0].reason.as_deref(), Some("not interested"));
    }

    #[tokio::test]
    async fn test_approve_then_undo_round_trip() {
        let store = store_with_pending("42").await;
        apply_actions(&store, "admin", MediaKind::Movie, &[request("42", "reject")], false)
            .await
            .unwrap();

        let summary = apply_actions(
            &store,
            "admin",
            MediaKind::Movie,
            &[request("42", "approve"), request("42", "undo")],
            false,
        )
        .await
        .unwrap();

        assert_eq!(summary.approved, 1);
        assert_eq!(summary.undone, 1);
        assert_eq!(approval_of(&store, "42").await, DownloadApproval::Pending);
        assert!(store.find_rejections("admin", MediaKind::Movie).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_missing_are_counted() {
        let store = store_with_pending("42").await;
        let summary = apply_actions(
            &store,
            "admin",
            MediaKind::Movie,
            &[request("42", "maybe"), request("404", "approve")],
            false,
        )
        .await
        .unwrap();

        assert_eq!(summary.ignored, 1);
        assert_eq!(summary.missing, 1);
        assert_eq!(approval_of(&store, "42").await, DownloadApproval::Pending);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let store = store_with_pending("42").await;
        let summary = apply_actions(&store, "admin", MediaKind::Movie, &[request("42", "remove")], true)
            .await
            .unwrap();

        assert_eq!(summary.rejected, 1);
        assert_eq!(approval_of(&store, "42").await, DownloadApproval::Pending);
        assert!(store.find_rejections("admin", MediaKind::Movie).await.unwrap().is_empty());
    }
}
