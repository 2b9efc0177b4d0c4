/// Read-through caching for provider calls.
///
/// Looks `$key` up in `$cache` and returns the hit. On a miss the async
/// `$block` is awaited, its value queued for storage with a `$ttl` in
/// seconds, and returned. A failed lookup (Redis down, undecodable entry) is
/// logged and treated as a miss. Errors from the block propagate with `?`, so
/// the macro must be used inside a function returning `AppResult`.
///
/// # Example
/// ```rust,ignore
/// cached!(self.cache, CacheKey::Profile(username.to_string()), PROFILE_TTL, async move {
///     fetch_profile_from_api(username).await
/// })
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        match $cache.get_from_cache(&key).await {
            Ok(Some(cached)) => Ok(cached),
            lookup => {
                if let Err(e) = lookup {
                    tracing::warn!(
                        key = %key,
                        error = %e,
                        "Cache lookup failed, treating as miss"
                    );
                }
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
