//! Compile cache for expression text.
//!
//! Compilation is idempotent, so compiled expressions (and compile errors)
//! are cached by text. The atlas re-evaluates the same filter, sort, filename
//! and page-name expressions on every requery; the cache keeps re-supplying
//! the same text from reaching the engine twice.
//!
//! ## Cache Key Design
//!
//! The key is the xxh64 of the expression text. Entries keep the text so a
//! hash collision degrades to a miss instead of returning the wrong program.

use std::hash::Hasher;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;
use xxhash_rust::xxh64::Xxh64;

use super::{CompiledExpression, ExpressionEngine, ExpressionError};

type CompileResult = Result<Arc<dyn CompiledExpression>, ExpressionError>;

/// Configuration for the compile cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_entries: usize,
    /// Whether to enable the cache.
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct CompileCacheKey(u64);

impl CompileCacheKey {
    fn compute(text: &str) -> Self {
        let mut hasher = Xxh64::new(0);
        hasher.write(text.as_bytes());
        Self(hasher.finish())
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Current number of entries in the cache.
    pub len: usize,
    /// Maximum capacity of the cache.
    pub cap: usize,
    /// Number of calls that reached the engine.
    pub compiles: u64,
}

/// Expression engine front with an LRU of compile results.
pub struct ExpressionCache {
    engine: Arc<dyn ExpressionEngine>,
    cache: Option<RwLock<LruCache<CompileCacheKey, (String, CompileResult)>>>,
    compiles: AtomicU64,
}

impl ExpressionCache {
    /// Create a cache with the default configuration.
    pub fn new(engine: Arc<dyn ExpressionEngine>) -> Self {
        Self::with_config(engine, CacheConfig::default())
    }

    /// Create a cache with a custom configuration.
    pub fn with_config(engine: Arc<dyn ExpressionEngine>, config: CacheConfig) -> Self {
        let cache = if config.enabled {
            let size = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
            Some(RwLock::new(LruCache::new(size)))
        } else {
            None
        };
        Self {
            engine,
            cache,
            compiles: AtomicU64::new(0),
        }
    }

    /// Compile text, returning the cached result when the text was seen before.
    pub fn compile(&self, text: &str) -> CompileResult {
        let key = CompileCacheKey::compute(text);

        if let Some(cache) = &self.cache {
            if let Some((cached_text, result)) = cache.read().peek(&key) {
                if cached_text == text {
                    return result.clone();
                }
            }
        }

        self.compiles.fetch_add(1, Ordering::Relaxed);
        let result = self.engine.compile(text);

        if let Some(cache) = &self.cache {
            cache.write().put(key, (text.to_string(), result.clone()));
        }

        result
    }

    /// Get cache statistics. `len` and `cap` are zero when caching is disabled.
    pub fn stats(&self) -> CacheStats {
        let (len, cap) = self
            .cache
            .as_ref()
            .map(|c| {
                let c = c.read();
                (c.len(), c.cap().get())
            })
            .unwrap_or((0, 0));
        CacheStats {
            len,
            cap,
            compiles: self.compiles.load(Ordering::Relaxed),
        }
    }

    /// Clear the cache. Does nothing if caching is disabled.
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.write().clear();
        }
    }
}

impl std::fmt::Debug for ExpressionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpressionCache").field("stats", &self.stats()).finish()
    }
}
