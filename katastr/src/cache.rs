//! Cache des résultats coûteux (téléchargements, jointures, exports)
//!
//! Les entrées sont indexées par (opération, arguments) et expirent après
//! une durée fixe; les erreurs ne sont jamais mises en cache.

use std::any::Any;
use std::fmt::Display;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::error::Result;

/// Clé de cache: nom d'opération + arguments sérialisés
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: &'static str,
    arguments: String,
}

impl CacheKey {
    pub fn new(operation: &'static str, arguments: impl Display) -> Self {
        Self {
            operation,
            arguments: arguments.to_string(),
        }
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.operation, self.arguments)
    }
}

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    stored_at: Instant,
}

/// Service de mémoïsation LRU avec TTL
///
/// Au-delà de `capacity` entrées, la moins récemment utilisée est évincée.
pub struct CacheService {
    ttl: Duration,
    entries: Mutex<LruCache<CacheKey, Entry>>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("ttl", &self.ttl)
            .field("capacity", &self.capacity())
            .field("entries", &self.len())
            .finish()
    }
}

impl CacheService {
    pub fn new(ttl: Duration, capacity: NonZeroUsize) -> Self {
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    /// Retourne la valeur en cache ou l'obtient via `fetch`
    ///
    /// Une entrée expirée ou d'un autre type est recalculée.
    pub async fn get_or_fetch<T, F, Fut>(&self, key: CacheKey, fetch: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(value) = self.lookup::<T>(&key) {
            tracing::trace!(key = %key, "Cache hit");
            return Ok(value);
        }

        tracing::debug!(key = %key, "Cache miss");
        let value = Arc::new(fetch().await?);

        let mut entries = self.lock();
        purge_expired(&mut entries, self.ttl);
        let evicted = entries.push(
            key.clone(),
            Entry {
                value: value.clone(),
                stored_at: Instant::now(),
            },
        );
        if let Some((old, _)) = evicted.filter(|(old, _)| *old != key) {
            tracing::debug!(key = %old, "Cache entry evicted");
        }
        Ok(value)
    }

    /// Valeur en cache encore valide, sans déclencher de calcul
    pub fn lookup<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        let mut entries = self.lock();
        let fresh = entries
            .peek(key)
            .map(|entry| entry.stored_at.elapsed() < self.ttl)?;
        if !fresh {
            entries.pop(key);
            return None;
        }
        entries
            .get(key)
            .and_then(|entry| entry.value.clone().downcast::<T>().ok())
    }

    /// Supprime une entrée; retourne vrai si elle existait
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.lock().pop(key).is_some()
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.lock();
        tracing::debug!(entries = entries.len(), "Cache cleared");
        entries.clear();
    }

    /// Supprime les entrées expirées; retourne leur nombre
    pub fn purge_expired(&self) -> usize {
        purge_expired(&mut self.lock(), self.ttl)
    }

    /// Nombre d'entrées encore valides
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        purge_expired(&mut entries, self.ttl);
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, Entry>> {
        // Verrou empoisonné: la table reste utilisable
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn purge_expired(entries: &mut LruCache<CacheKey, Entry>, ttl: Duration) -> usize {
    let expired: Vec<CacheKey> = entries
        .iter()
        .filter(|(_, entry)| entry.stored_at.elapsed() >= ttl)
        .map(|(key, _)| key.clone())
        .collect();
    for key in &expired {
        entries.pop(key);
    }
    if !expired.is_empty() {
        tracing::trace!(expired = expired.len(), "Expired cache entries removed");
    }
    expired.len()
}
