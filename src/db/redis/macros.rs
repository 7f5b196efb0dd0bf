/// Read-through lookup for values that are cheap to lose.
///
/// Returns the cached value when present. Otherwise evaluates `$block`
/// (a future yielding `AppResult<T>`), queues the result for caching and
/// returns it. Cache read failures are treated as misses so a Redis outage
/// only costs extra upstream calls.
///
/// ```rust,ignore
/// let stats = cached!(self.cache, CacheKey::VoteStats(kind, id.clone()), TTL, async {
///     self.fetch_vote_stats(kind, &id).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await {
            Ok(Some(hit)) => Ok(hit),
            miss_or_err => {
                if let Err(e) = miss_or_err {
                    tracing::debug!(error = %e, key = %key, "Cache unavailable; falling through");
                }
                match $block.await {
                    Ok(value) => {
                        $cache.set_in_background(&key, &value, $ttl);
                        Ok(value)
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }};
}
