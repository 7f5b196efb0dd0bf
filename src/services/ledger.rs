/// Points ledger
///
/// Folds one suggestion batch into the recommendation records of a
/// (user, library) scope. Suggested items are created or refreshed to the
/// points ceiling, and active items the batch left out lose one point per
/// run until they are evicted. The ledger is pure: it returns the new scope
/// state together with the writes needed to persist it.
use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::{
    config::clamp_max_points,
    models::{
        DownloadApproval, LedgerSummary, MediaKind, RecommendationRecord, RecommendationStatus,
        Suggestion,
    },
};

/// Scope a batch applies to
#[derive(Debug, Clone, Copy)]
pub struct LedgerScope<'a> {
    pub user_id: &'a str,
    pub library_id: &'a str,
    pub media_kind: MediaKind,
}

#[derive(Debug, Clone, Default)]
pub struct LedgerOutcome {
    /// Scope state after the batch, in the original record order
    pub records: Vec<RecommendationRecord>,
    pub upserts: Vec<RecommendationRecord>,
    /// External ids of evicted records
    pub deletions: Vec<String>,
    /// Ids that became active in this batch (created active or promoted)
    pub newly_active: Vec<String>,
    pub summary: LedgerSummary,
}

/// Collapses duplicate ids, keeping first-seen order
pub fn dedupe(batch: &[Suggestion]) -> Vec<Suggestion> {
    let mut order: Vec<Suggestion> = Vec::with_capacity(batch.len());
    let mut index: HashMap<&str, usize> = HashMap::new();

    for suggestion in batch {
        let id = suggestion.external_id.trim();
        if id.is_empty() {
            continue;
        }
        match index.get(id) {
            Some(&i) => order[i].merge(suggestion),
            None => {
                index.insert(id, order.len());
                let mut s = suggestion.clone();
                s.external_id = id.to_string();
                order.push(s);
            }
        }
    }
    order
}

/// Pending → active at the points ceiling
pub fn promote(record: &mut RecommendationRecord, max_points: u32, now: DateTime<Utc>) {
    record.activate(clamp_max_points(max_points));
    record.updated_at = now;
}

fn refresh_metadata(record: &mut RecommendationRecord, suggestion: &Suggestion) {
    if let Some(title) = suggestion.title.as_deref().filter(|t| !t.trim().is_empty()) {
        record.title = Some(title.to_string());
    }
    record.absorb(suggestion);
}

pub fn apply(
    scope: LedgerScope<'_>,
    batch: &[Suggestion],
    existing: Vec<RecommendationRecord>,
    rejected: &HashSet<String>,
    max_points: u32,
    now: DateTime<Utc>,
) -> LedgerOutcome {
    let max_points = clamp_max_points(max_points);
    let batch = dedupe(batch);

    let mut records = existing;
    let mut position: HashMap<String, usize> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (r.external_id.clone(), i))
        .collect();

    let mut outcome = LedgerOutcome::default();
    let mut touched: HashSet<String> = HashSet::new();
    let mut suggested: HashSet<String> = HashSet::new();

    for suggestion in &batch {
        let id = &suggestion.external_id;
        if rejected.contains(id) {
            outcome.summary.skipped_rejected += 1;
            continue;
        }
        suggested.insert(id.clone());

        match position.get(id).copied() {
            None => {
                let mut record = RecommendationRecord::new(
                    scope.user_id,
                    scope.library_id,
                    scope.media_kind,
                    id.clone(),
                );
                refresh_metadata(&mut record, suggestion);
                record.created_at = now;
                record.updated_at = now;
                if suggestion.present_in_library {
                    record.activate(max_points);
                    outcome.summary.created_active += 1;
                    outcome.newly_active.push(id.clone());
                } else {
                    record.download_approval = DownloadApproval::Pending;
                    outcome.summary.created_pending += 1;
                }
                position.insert(id.clone(), records.len());
                records.push(record);
            }
            Some(i) => {
                let record = &mut records[i];
                refresh_metadata(record, suggestion);
                record.updated_at = now;
                match record.status {
                    RecommendationStatus::Active => {
                        record.points = max_points;
                        outcome.summary.refreshed_active += 1;
                    }
                    RecommendationStatus::Pending if suggestion.present_in_library => {
                        promote(record, max_points, now);
                        outcome.summary.promoted += 1;
                        outcome.newly_active.push(id.clone());
                    }
                    RecommendationStatus::Pending => {
                        outcome.summary.updated_pending += 1;
                    }
                }
            }
        }
        touched.insert(id.clone());
    }

    // Attrition for active records the batch did not reconfirm.
    let mut evicted: HashSet<String> = HashSet::new();
    for record in records.iter_mut() {
        if !record.is_active() || suggested.contains(&record.external_id) {
            continue;
        }
        record.points = record.points.saturating_sub(1);
        record.updated_at = now;
        outcome.summary.decayed += 1;
        if record.points == 0 {
            outcome.summary.removed += 1;
            evicted.insert(record.external_id.clone());
        } else {
            touched.insert(record.external_id.clone());
        }
    }

    records.retain(|r| !evicted.contains(&r.external_id));
    outcome.upserts = records
        .iter()
        .filter(|r| touched.contains(&r.external_id))
        .cloned()
        .collect();
    outcome.deletions = evicted.into_iter().collect();
    outcome.deletions.sort();
    outcome.records = records;

    tracing::debug!(
        user_id = %scope.user_id,
        library_id = %scope.library_id,
        suggested = batch.len(),
        upserts = outcome.upserts.len(),
        deletions = outcome.deletions.len(),
        "Ledger applied"
    );

    outcome
}
