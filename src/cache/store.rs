//! Single-flight result cache keyed by content hash.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};

use crate::emf::encoder::EmfBlob;

/// Content fingerprint of whatever generated a blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    /// High 64 bits of the xxh3-128 digest.
    pub hi: u64,
    /// Low 64 bits.
    pub lo: u64,
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}{:016x}", self.hi, self.lo)
    }
}

/// Handle to a cached blob. Cheap to clone; keeps the blob alive on its own.
#[derive(Clone, Debug)]
pub struct EmfRef {
    key: CacheKey,
    blob: Arc<EmfBlob>,
}

impl EmfRef {
    /// Key the blob was generated under.
    pub fn key(&self) -> CacheKey {
        self.key
    }

    /// The blob itself.
    pub fn blob(&self) -> &EmfBlob {
        &self.blob
    }

    /// Encoded EMF bytes.
    pub fn bytes(&self) -> &[u8] {
        self.blob.bytes()
    }
}

impl PartialEq for EmfRef {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for EmfRef {}

/// Counters for a [`ResultCache`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from a ready or revived entry.
    pub hits: u64,
    /// Lookups that had to generate.
    pub misses: u64,
    /// Generator invocations that produced a blob.
    pub generations: u64,
    /// Generator invocations that returned an error.
    pub failed_generations: u64,
    /// Lookups that blocked on another thread's in-flight generation.
    pub waits: u64,
    /// Entries dropped by the byte limit.
    pub evictions: u64,
    /// Evicted entries brought back because an `EmfRef` still held them.
    pub revivals: u64,
    /// Ready entries currently held.
    pub retained_entries: usize,
    /// Encoded bytes held by ready entries.
    pub retained_bytes: usize,
}

enum Slot {
    Pending,
    Ready { blob: Arc<EmfBlob>, last_used: u64 },
    Evicted(Weak<EmfBlob>),
}

#[derive(Default)]
struct State {
    slots: HashMap<CacheKey, Slot>,
    tick: u64,
    stats: CacheStats,
}

/// Single-flight memo of generated EMF blobs, bounded by total blob bytes (LRU).
///
/// Concurrent requests for a key that is being generated block until the first generator
/// finishes. Eviction only drops the cache's strong reference; blobs still held through an
/// [`EmfRef`] are revived on the next lookup instead of being regenerated.
pub struct ResultCache {
    max_bytes: usize,
    state: Mutex<State>,
    ready: Condvar,
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("max_bytes", &self.max_bytes)
            .field("stats", &self.stats())
            .finish()
    }
}

enum Lookup {
    Hit(EmfRef),
    Generate,
}

impl ResultCache {
    /// Cache that keeps at most `max_bytes` of blobs alive on its own.
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            state: Mutex::new(State::default()),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }

    /// Infallible form of [`ResultCache::try_get_or_insert`].
    pub fn get_or_insert(&self, key: CacheKey, generator: impl FnOnce() -> EmfBlob) -> EmfRef {
        match self.try_get_or_insert(key, || Ok::<_, std::convert::Infallible>(generator())) {
            Ok(r) => r,
            Err(never) => match never {},
        }
    }

    /// Look `key` up, running `generator` at most once across all callers when it is missing.
    ///
    /// A failed generator leaves no entry behind; one of the waiting callers then retries with
    /// its own generator.
    pub fn try_get_or_insert<E>(
        &self,
        key: CacheKey,
        generator: impl FnOnce() -> Result<EmfBlob, E>,
    ) -> Result<EmfRef, E> {
        match self.lookup(key) {
            Lookup::Hit(r) => return Ok(r),
            Lookup::Generate => {}
        }

        let guard = PendingGuard {
            cache: self,
            key,
            armed: true,
        };
        let result = generator();
        match result {
            Ok(blob) => {
                let blob = Arc::new(blob);
                guard.complete(Arc::clone(&blob));
                Ok(EmfRef { key, blob })
            }
            Err(e) => {
                drop(guard);
                Err(e)
            }
        }
    }

    fn lookup(&self, key: CacheKey) -> Lookup {
        let mut st = self.lock();
        let mut waited = false;
        loop {
            st.tick += 1;
            let tick = st.tick;
            match st.slots.get_mut(&key) {
                Some(Slot::Ready { blob, last_used }) => {
                    *last_used = tick;
                    let r = EmfRef {
                        key,
                        blob: Arc::clone(blob),
                    };
                    st.stats.hits += 1;
                    tracing::debug!(%key, "emf cache hit");
                    return Lookup::Hit(r);
                }
                Some(Slot::Pending) => {
                    if !waited {
                        st.stats.waits += 1;
                        waited = true;
                    }
                    st = self.ready.wait(st).unwrap_or_else(PoisonError::into_inner);
                }
                Some(Slot::Evicted(weak)) => {
                    if let Some(blob) = weak.upgrade() {
                        let bytes = blob.byte_size();
                        let r = EmfRef {
                            key,
                            blob: Arc::clone(&blob),
                        };
                        st.slots.insert(
                            key,
                            Slot::Ready {
                                blob,
                                last_used: tick,
                            },
                        );
                        st.stats.hits += 1;
                        st.stats.revivals += 1;
                        st.stats.retained_entries += 1;
                        st.stats.retained_bytes += bytes;
                        self.evict_over_budget(&mut st, key);
                        return Lookup::Hit(r);
                    }
                    st.slots.insert(key, Slot::Pending);
                    st.stats.misses += 1;
                    return Lookup::Generate;
                }
                None => {
                    st.slots.insert(key, Slot::Pending);
                    st.stats.misses += 1;
                    tracing::debug!(%key, "emf cache miss");
                    return Lookup::Generate;
                }
            }
        }
    }

    fn finish(&self, key: CacheKey, blob: Option<Arc<EmfBlob>>) {
        let mut st = self.lock();
        st.tick += 1;
        let tick = st.tick;
        match blob {
            Some(blob) => {
                let bytes = blob.byte_size();
                st.slots.insert(
                    key,
                    Slot::Ready {
                        blob,
                        last_used: tick,
                    },
                );
                st.stats.generations += 1;
                st.stats.retained_entries += 1;
                st.stats.retained_bytes += bytes;
                self.evict_over_budget(&mut st, key);
            }
            None => {
                st.slots.remove(&key);
                st.stats.failed_generations += 1;
            }
        }
        drop(st);
        self.ready.notify_all();
    }

    fn evict_over_budget(&self, st: &mut State, keep: CacheKey) {
        while st.stats.retained_bytes > self.max_bytes {
            let victim = st
                .slots
                .iter()
                .filter_map(|(k, s)| match s {
                    Slot::Ready { last_used, .. } if *k != keep => Some((*last_used, *k)),
                    _ => None,
                })
                .min();
            let Some((_, victim)) = victim else {
                break;
            };
            if let Some(Slot::Ready { blob, .. }) = st.slots.remove(&victim) {
                st.stats.retained_bytes -= blob.byte_size();
                st.stats.retained_entries -= 1;
                st.stats.evictions += 1;
                st.slots.insert(victim, Slot::Evicted(Arc::downgrade(&blob)));
                tracing::debug!(key = %victim, "emf cache eviction");
            }
        }
    }
}

/// Clears a pending slot if the generator fails or unwinds.
struct PendingGuard<'a> {
    cache: &'a ResultCache,
    key: CacheKey,
    armed: bool,
}

impl PendingGuard<'_> {
    fn complete(mut self, blob: Arc<EmfBlob>) {
        self.armed = false;
        self.cache.finish(self.key, Some(blob));
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.cache.finish(self.key, None);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/cache/store.rs"]
mod tests;
