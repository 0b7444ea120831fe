/// Read-through caching around an async fetch.
///
/// Returns the value cached under `$key` when present; otherwise awaits
/// `$block`, queues the result for a background cache write with `$ttl`
/// seconds to live, and returns it. The surrounding function must return
/// `AppResult` since both the lookup and the block use `?`.
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
