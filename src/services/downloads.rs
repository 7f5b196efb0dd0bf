use chrono::Utc;

use crate::{
    db::DatasetStore,
    error::AppResult,
    models::{
        AddItemSpec, DownloadApproval, DownloadSummary, RecommendationRecord, RecordFilter,
    },
    services::{context::RunContext, providers::DownloadRequester},
};

/// Sends approved pending records to the download service and purges
/// rejected ones
///
/// Requests are best effort: a failed request leaves `sent_at` unset so the
/// next run tries again. Rejected records leave the dataset; their rejection
/// entry stays and keeps them from being suggested again.
pub async fn apply(
    store: &dyn DatasetStore,
    requester: Option<&dyn DownloadRequester>,
    ctx: &RunContext,
    records: &mut Vec<RecommendationRecord>,
) -> AppResult<DownloadSummary> {
    let mut summary = DownloadSummary::default();

    for record in records.iter_mut().filter(|r| {
        !r.is_active() && r.download_approval == DownloadApproval::Approved && r.sent_at.is_none()
    }) {
        let Some(requester) = requester else {
            summary.skipped_no_client += 1;
            continue;
        };

        if ctx.dry_run {
            tracing::info!(external_id = %record.external_id, title = %record.label(), "Dry run: would request download");
            summary.requested += 1;
            continue;
        }

        let spec = AddItemSpec {
            kind: record.media_kind,
            external_id: record.external_id.clone(),
            title: record.label().to_string(),
            search: true,
        };
        match requester.add_item(&spec).await {
            Ok(Some(added)) => {
                record.sent_at = Some(Utc::now());
                record.updated_at = Utc::now();
                store.upsert_record(record).await?;
                summary.requested += 1;
                tracing::info!(
                    service = requester.name(),
                    external_id = %record.external_id,
                    existed = added.existed,
                    "Download requested"
                );
            }
            Ok(None) => {
                summary.request_failed += 1;
                tracing::warn!(service = requester.name(), external_id = %record.external_id, "Download service could not resolve item");
            }
            Err(e) => {
                summary.request_failed += 1;
                tracing::warn!(service = requester.name(), external_id = %record.external_id, error = %e, "Download request failed");
            }
        }
    }

    let rejected: Vec<String> = records
        .iter()
        .filter(|r| r.download_approval == DownloadApproval::Rejected)
        .map(|r| r.external_id.clone())
        .collect();

    if !rejected.is_empty() {
        summary.purged_rejected = rejected.len() as u32;
        if !ctx.dry_run {
            if let Some(first) = records.first() {
                let filter = RecordFilter::scope(&first.user_id, &first.library_id)
                    .with_kind(first.media_kind)
                    .with_ids(rejected.clone());
                store.delete_records(&filter).await?;
            }
        }
        records.retain(|r| !rejected.contains(&r.external_id));
    }

    Ok(summary)
}
