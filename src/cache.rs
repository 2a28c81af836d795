//! Compute-once keyed cache
//!
//! Backs the process-lifetime lookups (language to collection, model name to
//! loaded model). Each key owns a `tokio::sync::OnceCell`, so concurrent
//! callers for the same key wait on a single initialisation, and a caller
//! that is cancelled mid-initialisation leaves the cell empty for the next one.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

pub struct OnceMap<K, V> {
    cells: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, running `init` if none is stored yet.
    ///
    /// Failed initialisations are not cached.
    pub async fn get_or_try_init<F, Fut, E>(&self, key: K, init: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
            cells.entry(key).or_default().clone()
        };

        cell.get_or_try_init(init).await.cloned()
    }

    /// Cached value for `key`, if initialised
    pub fn get(&self, key: &K) -> Option<V> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(key).and_then(|cell| cell.get().cloned())
    }

    /// Drop the entry for `key`; the next lookup recomputes it
    pub fn invalidate(&self, key: &K) {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.remove(key);
    }

    pub fn clear(&self) {
        let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.clear();
    }

    /// Number of initialised entries
    pub fn len(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.values().filter(|cell| cell.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for OnceMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_computes_once() {
        let cache: OnceMap<String, usize> = OnceMap::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_init("fr".to_string(), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let cache: OnceMap<&'static str, usize> = OnceMap::new();

        let first = cache.get_or_try_init("en", || async { Err("down") }).await;
        assert_eq!(first, Err("down"));
        assert!(cache.get(&"en").is_none());

        let second = cache
            .get_or_try_init("en", || async { Ok::<_, &str>(7) })
            .await;
        assert_eq!(second, Ok(7));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache: OnceMap<&'static str, usize> = OnceMap::new();
        cache
            .get_or_try_init("en", || async { Ok::<_, ()>(1) })
            .await
            .unwrap();

        cache.invalidate(&"en");
        assert!(cache.is_empty());

        let value = cache
            .get_or_try_init("en", || async { Ok::<_, ()>(2) })
            .await
            .unwrap();
        assert_eq!(value, 2);
    }
}
