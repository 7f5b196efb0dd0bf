use std::cmp::Ordering;
use std::collections::HashSet;

use rand::{seq::SliceRandom, Rng};

/// An active item competing for a place in the collection
#[derive(Debug, Clone, PartialEq)]
pub struct RankedItem {
    pub external_id: String,
    pub vote_average: Option<f64>,
    pub vote_count: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierSizes {
    pub high: usize,
    pub mid: usize,
    pub low: usize,
}

/// Splits `n` ranked items into high/mid/low tiers, remainder going to the top
pub fn tier_sizes(n: usize) -> TierSizes {
    let base = n / 3;
    let rem = n % 3;
    let high = base + usize::from(rem > 0);
    let mid = base + usize::from(rem > 1);
    TierSizes {
        high,
        mid,
        low: n - high - mid,
    }
}

fn compare(a: &RankedItem, b: &RankedItem) -> Ordering {
    let avg = |i: &RankedItem| i.vote_average.filter(|v| !v.is_nan()).unwrap_or(f64::NEG_INFINITY);
    let count = |i: &RankedItem| i.vote_count.unwrap_or(i64::MIN);

    avg(b)
        .total_cmp(&avg(a))
        .then_with(|| count(b).cmp(&count(a)))
        .then_with(|| a.external_id.cmp(&b.external_id))
}

/// Deduplicates by id and sorts best first; missing ratings rank lowest
pub fn rank(items: &[RankedItem]) -> Vec<RankedItem> {
    let mut seen = HashSet::new();
    let mut ranked: Vec<RankedItem> = items
        .iter()
        .filter(|i| seen.insert(i.external_id.clone()))
        .cloned()
        .collect();
    ranked.sort_by(compare);
    ranked
}

/// Presentation order for the curated collection
///
/// One random pick from each non-empty tier leads (in random order), the
/// rest follows shuffled. Every input id appears exactly once.
pub fn tiered_order<R: Rng + ?Sized>(items: &[RankedItem], rng: &mut R) -> Vec<String> {
    let ranked = rank(items);
    let sizes = tier_sizes(ranked.len());
    let ids: Vec<&str> = ranked.iter().map(|i| i.external_id.as_str()).collect();

    let tiers = [
        &ids[..sizes.high],
        &ids[sizes.high..sizes.high + sizes.mid],
        &ids[sizes.high + sizes.mid..],
    ];

    let mut picked: HashSet<&str> = HashSet::new();
    let mut picks: Vec<&str> = Vec::with_capacity(3);
    for tier in tiers {
        let available: Vec<&str> = tier.iter().copied().filter(|id| !picked.contains(id)).collect();
        if let Some(&choice) = available.choose(rng) {
            picked.insert(choice);
            picks.push(choice);
        }
    }
    picks.shuffle(rng);

    let mut remainder: Vec<&str> = ids.iter().copied().filter(|id| !picked.contains(id)).collect();
    remainder.shuffle(rng);

    picks
        .into_iter()
        .chain(remainder)
        .map(str::to_string)
        .collect()
}
