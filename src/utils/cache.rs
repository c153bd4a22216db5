//! Caching utilities for decoded tokens

use crate::error::ResolveError;
use crate::platform::extractor::TransformKind;
use moka::future::Cache;
use std::future::Future;
use std::time::Duration;

/// High-performance async cache using moka
pub type AsyncCache<K, V> = Cache<K, V>;

/// Create a new async cache with TTL and max capacity
pub fn new_async_cache_with_capacity<K, V>(ttl: Duration, max_capacity: u64) -> AsyncCache<K, V>
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .time_to_live(ttl)
        .max_capacity(max_capacity)
        .build()
}

/// Decoded tokens of one decoder, kept apart per transform kind.
///
/// Concurrent requests for the same token wait for a single computation.
/// Failures are not stored, so a later call recomputes.
#[derive(Clone)]
pub struct TokenCache {
    n: AsyncCache<String, String>,
    sig: AsyncCache<String, String>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self {
            n: new_async_cache_with_capacity(Duration::from_secs(3600), 4096),
            sig: new_async_cache_with_capacity(Duration::from_secs(3600), 4096),
        }
    }

    fn for_kind(&self, kind: TransformKind) -> &AsyncCache<String, String> {
        match kind {
            TransformKind::N => &self.n,
            TransformKind::Signature => &self.sig,
        }
    }

    /// Return the memoized value for `token`, running `init` at most once per key
    pub async fn get_or_try_decode<F>(
        &self,
        kind: TransformKind,
        token: &str,
        init: F,
    ) -> Result<String, ResolveError>
    where
        F: Future<Output = Result<String, ResolveError>>,
    {
        self.for_kind(kind)
            .try_get_with(token.to_string(), init)
            .await
            .map_err(|e| ResolveError::from_shared(&e))
    }

    /// Seed a value computed elsewhere (e.g. by the batched solver)
    pub async fn insert(&self, kind: TransformKind, token: &str, value: String) {
        self.for_kind(kind).insert(token.to_string(), value).await;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}
