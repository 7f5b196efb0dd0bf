use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::{
    models::{LibraryItem, MediaKind, RecommendationRecord, RecommendationStatus},
    services::{
        ledger,
        providers::{DownloadRequester, MetadataProvider},
    },
};

/// Concurrent metadata lookups per batch
pub const ENRICH_BATCH_SIZE: usize = 6;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arrivals {
    /// Pending ids found in the library and promoted
    pub promoted: Vec<String>,
    /// Pending ids still missing from the library
    pub awaiting_download: u32,
}

/// Promotes pending records whose item has shown up in the library
///
/// Library titles replace missing record titles along the way.
pub fn promote_arrivals(
    records: &mut [RecommendationRecord],
    library: &HashMap<String, LibraryItem>,
    max_points: u32,
    now: DateTime<Utc>,
) -> Arrivals {
    let mut arrivals = Arrivals::default();

    for record in records.iter_mut() {
        if record.status != RecommendationStatus::Pending {
            continue;
        }
        match library.get(&record.external_id) {
            Some(item) => {
                ledger::promote(record, max_points, now);
                if record.title.is_none() && !item.title.is_empty() {
                    record.title = Some(item.title.clone());
                }
                arrivals.promoted.push(record.external_id.clone());
            }
            None => arrivals.awaiting_download += 1,
        }
    }

    arrivals
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub enriched: u32,
    pub failed: u32,
}

/// Backfills vote stats for the given ids, at most six lookups at a time
///
/// Lookup errors are counted and otherwise ignored. Returns which records
/// changed so the caller can persist them.
pub async fn enrich(
    provider: &dyn MetadataProvider,
    kind: MediaKind,
    records: &mut [RecommendationRecord],
    ids: &HashSet<String>,
) -> (Enrichment, Vec<String>) {
    let mut outcome = Enrichment::default();
    let mut changed = Vec::new();

    let wanted: Vec<usize> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| ids.contains(&r.external_id) && r.vote_average.is_none())
        .map(|(i, _)| i)
        .collect();

    for chunk in wanted.chunks(ENRICH_BATCH_SIZE) {
        let batch: Vec<(usize, String)> = chunk
            .iter()
            .map(|&i| (i, records[i].external_id.clone()))
            .collect();
        let lookups = batch.into_iter().map(|(i, external_id)| async move {
            (i, provider.vote_stats(kind, &external_id).await)
        });

        for (i, result) in join_all(lookups).await {
            let record = &mut records[i];
            match result {
                Ok(Some(stats)) => {
                    record.vote_average = Some(stats.average);
                    record.vote_count = Some(stats.count);
                    if record.poster_ref.is_none() {
                        record.poster_ref = stats.poster_path;
                    }
                    outcome.enriched += 1;
                    changed.push(record.external_id.clone());
                }
                Ok(None) => {
                    tracing::debug!(external_id = %record.external_id, "No metadata available");
                }
                Err(e) => {
                    outcome.failed += 1;
                    tracing::debug!(external_id = %record.external_id, error = %e, "Metadata lookup failed");
                }
            }
        }
    }

    (outcome, changed)
}

/// Stops the download service from watching items that have arrived
///
/// Best effort: returns how many items were unmonitored.
pub async fn unmonitor_arrivals(
    downloads: &dyn DownloadRequester,
    arrived: &[String],
    dry_run: bool,
) -> u32 {
    if arrived.is_empty() {
        return 0;
    }

    let tracked = match downloads.list_items().await {
        Ok(items) => items,
        Err(e) => {
            tracing::warn!(service = downloads.name(), error = %e, "Cannot list download items");
            return 0;
        }
    };

    let arrived: HashSet<&str> = arrived.iter().map(String::as_str).collect();
    let mut count = 0;
    for item in tracked
        .iter()
        .filter(|i| i.monitored && arrived.contains(i.external_id.as_str()))
    {
        if dry_run {
            count += 1;
            continue;
        }
        match downloads.set_item_monitored(item, false).await {
            Ok(()) => count += 1,
            Err(e) => {
                tracing::warn!(service = downloads.name(), item = %item.title, error = %e, "Failed to unmonitor item")
            }
        }
    }
    count
}
