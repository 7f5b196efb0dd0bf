/// Collection reconciler
///
/// Makes a named collection on the media server hold exactly the desired
/// items in the desired order. Membership changes are applied first, then
/// the order is fixed with the minimum number of explicit moves, so a
/// second pass over an unchanged list is a no-op.
use std::collections::HashSet;
use std::path::Path;

use crate::{
    error::AppResult,
    models::{ItemRef, MediaKind, ReconcileSummary},
    services::{
        context::RunContext,
        providers::MediaServer,
        retry::{retry_with_backoff, RetryPolicy},
    },
};

pub const SKIP_NO_MATCHES: &str = "no_matches";

/// Where and what to reconcile
#[derive(Debug, Clone)]
pub struct CollectionTarget<'a> {
    pub name: &'a str,
    pub section_key: &'a str,
    pub kind: MediaKind,
    pub desired: &'a [ItemRef],
    pub pin_position: Option<u32>,
    pub poster: Option<&'a Path>,
}

/// Reposition `item` right after `after` (front when `None`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub item: ItemRef,
    pub after: Option<ItemRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub to_remove: Vec<ItemRef>,
    pub to_add: Vec<ItemRef>,
    pub moves: Vec<Move>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.to_remove.is_empty() && self.to_add.is_empty() && self.moves.is_empty()
    }
}

/// Moves that turn `current` into `desired`, assuming both hold the same items
pub fn plan_moves(current: &[ItemRef], desired: &[ItemRef]) -> Vec<Move> {
    let mut order: Vec<&ItemRef> = current.iter().collect();
    let mut moves = Vec::new();

    for (i, wanted) in desired.iter().enumerate() {
        if order.get(i).is_some_and(|at| *at == wanted) {
            continue;
        }
        if let Some(from) = order.iter().position(|it| *it == wanted) {
            let item = order.remove(from);
            order.insert(i.min(order.len()), item);
        }
        moves.push(Move {
            item: wanted.clone(),
            after: i.checked_sub(1).map(|prev| desired[prev].clone()),
        });
    }
    moves
}

/// Full diff of a collection against the desired list
///
/// Additions are appended by the server, so the move plan runs against the
/// post-membership order.
pub fn plan(current: &[ItemRef], desired: &[ItemRef]) -> ReconcilePlan {
    let wanted: HashSet<&ItemRef> = desired.iter().collect();
    let present: HashSet<&ItemRef> = current.iter().collect();

    let to_remove: Vec<ItemRef> = current.iter().filter(|i| !wanted.contains(i)).cloned().collect();
    let to_add: Vec<ItemRef> = desired.iter().filter(|i| !present.contains(i)).cloned().collect();

    let after_membership: Vec<ItemRef> = current
        .iter()
        .filter(|i| wanted.contains(i))
        .chain(to_add.iter())
        .cloned()
        .collect();

    ReconcilePlan {
        moves: plan_moves(&after_membership, desired),
        to_remove,
        to_add,
    }
}

fn dedupe(items: &[ItemRef]) -> Vec<ItemRef> {
    let mut seen = HashSet::new();
    items.iter().filter(|i| seen.insert(i.as_str())).cloned().collect()
}

pub async fn reconcile(
    media: &dyn MediaServer,
    ctx: &RunContext,
    target: &CollectionTarget<'_>,
) -> AppResult<ReconcileSummary> {
    reconcile_with_policy(media, ctx, target, &RetryPolicy::default()).await
}

#[tracing::instrument(skip_all, fields(collection = %target.name, section = %target.section_key, dry_run = ctx.dry_run))]
pub async fn reconcile_with_policy(
    media: &dyn MediaServer,
    ctx: &RunContext,
    target: &CollectionTarget<'_>,
    policy: &RetryPolicy,
) -> AppResult<ReconcileSummary> {
    let desired = dedupe(target.desired);
    let mut summary = ReconcileSummary {
        desired: desired.len() as u32,
        ..Default::default()
    };

    if desired.is_empty() {
        tracing::info!("Nothing to show; leaving collection untouched");
        summary.skip_reason = Some(SKIP_NO_MATCHES.to_string());
        return Ok(summary);
    }

    let existing = media
        .find_collection_by_name(target.name, target.section_key)
        .await?;

    let (collection_id, current) = match existing {
        Some(collection) => {
            let items = media.get_collection_items(&collection.id).await?;
            (Some(collection.id), items)
        }
        None => (None, Vec::new()),
    };

    let plan = plan(&current, &desired);

    if ctx.dry_run {
        summary.collection_id = collection_id.clone();
        summary.created = collection_id.is_none();
        summary.added = plan.to_add.len() as u32;
        summary.removed = plan.to_remove.len() as u32;
        // A fresh collection is created already in order.
        summary.moved = if collection_id.is_none() {
            0
        } else {
            plan.moves.len() as u32
        };
        tracing::info!(
            add = summary.added,
            remove = summary.removed,
            moves = summary.moved,
            "Dry run: planned collection changes"
        );
        return Ok(summary);
    }

    let (collection_id, current) = match collection_id {
        Some(id) => {
            if !plan.to_remove.is_empty() {
                retry_with_backoff("remove_collection_items", policy, || {
                    media.remove_collection_items(&id, &plan.to_remove)
                })
                .await?;
                summary.removed = plan.to_remove.len() as u32;
            }
            if !plan.to_add.is_empty() {
                retry_with_backoff("add_collection_items", policy, || {
                    media.add_collection_items(&id, &plan.to_add)
                })
                .await?;
                summary.added = plan.to_add.len() as u32;
            }
            let current = if plan.to_remove.is_empty() && plan.to_add.is_empty() {
                current
            } else {
                media.get_collection_items(&id).await?
            };
            (id, current)
        }
        None => {
            let created = retry_with_backoff("create_collection", policy, || {
                media.create_collection(target.name, target.section_key, target.kind, &desired)
            })
            .await?;
            summary.created = true;
            summary.added = desired.len() as u32;
            let current = media.get_collection_items(&created.id).await?;
            (created.id, current)
        }
    };

    for step in plan_moves(&current, &desired) {
        let result = retry_with_backoff("move_collection_item", policy, || {
            media.move_collection_item(&collection_id, &step.item, step.after.as_deref())
        })
        .await;
        match result {
            Ok(()) => summary.moved += 1,
            Err(e) => {
                summary.move_failed += 1;
                tracing::warn!(item = %step.item, error = %e, "Failed to move collection item");
            }
        }
    }

    if summary.mutations() > 0 {
        let applied = media.get_collection_items(&collection_id).await?;
        if applied != desired {
            tracing::warn!(
                expected = desired.len(),
                found = applied.len(),
                "Collection order differs from the desired order after apply"
            );
        }
    }

    if summary.created {
        if let Some(position) = target.pin_position {
            match media
                .pin_collection(&collection_id, target.section_key, position)
                .await
            {
                Ok(()) => summary.pinned = true,
                Err(e) => tracing::warn!(position, error = %e, "Failed to pin collection"),
            }
        }
        if let Some(poster) = target.poster {
            summary.artwork_set = upload_poster(media, &collection_id, poster).await;
        }
    }

    tracing::info!(
        collection_id = %collection_id,
        created = summary.created,
        added = summary.added,
        removed = summary.removed,
        moved = summary.moved,
        move_failed = summary.move_failed,
        "Collection reconciled"
    );

    summary.collection_id = Some(collection_id);
    Ok(summary)
}

async fn upload_poster(media: &dyn MediaServer, collection_id: &str, poster: &Path) -> bool {
    let image = match tokio::fs::read(poster).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %poster.display(), error = %e, "Cannot read collection artwork");
            return false;
        }
    };
    match media.upload_collection_poster(collection_id, image).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to upload collection artwork");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::InMemoryMediaServer;

    fn refs(items: &[&str]) -> Vec<ItemRef> {
        items.iter().map(|i| i.to_string()).collect()
    }

    fn apply_moves(current: &[ItemRef], moves: &[Move]) -> Vec<ItemRef> {
        let mut order = current.to_vec();
        for m in moves {
            let from = order.iter().position(|i| *i == m.item).unwrap();
            let item = order.remove(from);
            let to = match &m.after {
                None => 0,
                Some(after) => order.iter().position(|i| i == after).unwrap() + 1,
            };
            order.insert(to, item);
        }
        order
    }

    fn target<'a>(desired: &'a [ItemRef]) -> CollectionTarget<'a> {
        CollectionTarget {
            name: "Inspired by your Immaculate Taste",
            section_key: "1",
            kind: MediaKind::Movie,
            desired,
            pin_position: None,
            poster: None,
        }
    }

    #[test]
    fn test_no_moves_when_already_ordered() {
        let order = refs(&["a", "b", "c"]);
        assert!(plan_moves(&order, &order).is_empty());
        assert!(plan(&order, &order).is_empty());
    }

    #[test]
    fn test_moves_reach_desired_order() {
        let cases = [
            (refs(&["a", "b", "c", "d"]), refs(&["d", "c", "b", "a"])),
            (refs(&["a", "b", "c"]), refs(&["b", "c", "a"])),
            (refs(&["x", "y"]), refs(&["y", "x"])),
        ];
        for (current, desired) in cases {
            let moves = plan_moves(&current, &desired);
            assert_eq!(apply_moves(&current, &moves), desired);
            assert!(moves.len() < desired.len());
        }
    }

    #[test]
    fn test_single_displacement_needs_one_move() {
        let moves = plan_moves(&refs(&["b", "c", "a"]), &refs(&["a", "b", "c"]));
        assert_eq!(
            moves,
            vec![Move {
                item: "a".to_string(),
                after: None
            }]
        );
    }

    #[test]
    fn test_plan_membership() {
        let plan = plan(&refs(&["a", "b", "stale"]), &refs(&["c", "a", "b"]));
        assert_eq!(plan.to_remove, refs(&["stale"]));
        assert_eq!(plan.to_add, refs(&["c"]));
        assert_eq!(apply_moves(&refs(&["a", "b", "c"]), &plan.moves), refs(&["c", "a", "b"]));
    }

    #[tokio::test]
    async fn test_empty_desired_is_skipped() {
        let server = InMemoryMediaServer::new();
        let ctx = RunContext::new(false);
        let summary = reconcile(&server, &ctx, &target(&[])).await.unwrap();

        assert_eq!(summary.skip_reason.as_deref(), Some(SKIP_NO_MATCHES));
        assert_eq!(server.mutations(), 0);
    }

    #[tokio::test]
    async fn test_second_pass_is_a_noop() {
        let server = InMemoryMediaServer::new();
        let id = server.seed_collection("1", "Inspired by your Immaculate Taste", &["10", "11", "99"]);
        let ctx = RunContext::new(false);
        let desired = refs(&["12", "11", "10"]);

        let first = reconcile(&server, &ctx, &target(&desired)).await.unwrap();
        assert_eq!(first.removed, 1);
        assert_eq!(first.added, 1);
        assert_eq!(server.get_collection_items(&id).await.unwrap(), desired);

        let before = server.mutations();
        let second = reconcile(&server, &ctx, &target(&desired)).await.unwrap();
        assert_eq!(second.mutations(), 0);
        assert_eq!(server.mutations(), before);
    }

    #[tokio::test]
    async fn test_creates_missing_collection_and_pins() {
        let server = InMemoryMediaServer::new();
        let ctx = RunContext::new(false);
        let desired = refs(&["1", "2"]);
        let mut target = target(&desired);
        target.pin_position = Some(0);

        let summary = reconcile(&server, &ctx, &target).await.unwrap();
        assert!(summary.created);
        assert!(summary.pinned);

        let collection = server.collection("1", "Inspired by your Immaculate Taste").unwrap();
        assert_eq!(collection.items, desired);
        assert_eq!(collection.pinned_at, Some(0));
    }

    #[tokio::test]
    async fn test_dry_run_reports_without_mutating() {
        let server = InMemoryMediaServer::new();
        server.seed_collection("1", "Inspired by your Immaculate Taste", &["a", "b"]);
        let ctx = RunContext::new(true);
        let desired = refs(&["c", "b"]);

        let summary = reconcile(&server, &ctx, &target(&desired)).await.unwrap();
        assert_eq!(summary.added, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.moved, 1);
        assert_eq!(server.mutations(), 0);
    }

    #[tokio::test]
    async fn test_missing_artwork_is_not_fatal() {
        let server = InMemoryMediaServer::new();
        let ctx = RunContext::new(false);
        let desired = refs(&["1"]);
        let mut target = target(&desired);
        target.poster = Some(Path::new("/nonexistent/posters/inspired.png"));

        let summary = reconcile(&server, &ctx, &target).await.unwrap();
        assert!(summary.created);
        assert!(!summary.artwork_set);
    }
}
