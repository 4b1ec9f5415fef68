/// Read-through caching for metadata provider calls.
///
/// Checks the cache for `$key`; on a miss, runs `$block`, stores the result
/// under `$key` with `$ttl` seconds to live, and returns it. Errors from the
/// block are never cached.
///
/// # Example
/// ```ignore
/// let hits = cached!(self.cache, CacheKey::Search(query.to_string()), 3600, async move {
///     fetch_from_provider(query).await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await? {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
