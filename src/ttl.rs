use std::borrow::Borrow;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// A map whose entries expire a fixed TTL after insertion.
///
/// Insertion order approximates expiry order because the TTL is constant per
/// map, so `sweep` only has to scan a prefix of the order queue. The map
/// itself is not synchronized; owners that share it across event flows wrap
/// it in a mutex.
pub struct TtlMap<K, V> {
    ttl: Duration,
    entries: HashMap<K, Entry<V>>,
    // Insertion order. May contain stale keys after lazy eviction or
    // removal; sweep skips those.
    order: VecDeque<K>,
}

impl<K: Eq + Hash + Clone, V> TtlMap<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Number of entries, counting expired-but-unswept ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or overwrites, resetting the expiry to now + TTL.
    /// An overwritten key keeps its original position in the order queue.
    pub fn insert(&mut self, key: K, value: V) {
        let expires_at = Instant::now() + self.ttl;
        if self
            .entries
            .insert(key.clone(), Entry { value, expires_at })
            .is_none()
        {
            self.order.push_back(key);
        }
    }

    /// Returns the value if present and not expired. An expired entry is
    /// lazily evicted as a side effect and reported absent.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let expired = match self.entries.get(key) {
            Some(entry) => Instant::now() > entry.expires_at,
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|e| &e.value)
    }

    /// Removes the entry unconditionally, returning the value if it was
    /// present and still live.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        if Instant::now() > entry.expires_at {
            return None;
        }
        Some(entry.value)
    }

    /// Evicts a prefix of expired entries in insertion order, stopping at
    /// the first live entry or after `max_items` evictions. Returns the
    /// evicted values.
    pub fn sweep(&mut self, max_items: usize) -> Vec<V> {
        let now = Instant::now();
        let mut evicted = Vec::new();

        while evicted.len() < max_items {
            let key = match self.order.front() {
                Some(key) => key,
                None => break,
            };
            match self.entries.get(key) {
                Some(entry) if now > entry.expires_at => {
                    let key = key.clone();
                    self.order.pop_front();
                    evicted.push(self.entries.remove(&key).unwrap().value);
                }
                // First live entry. A key refreshed by a later insert keeps
                // its queue position, so it may block expired entries behind
                // it until it expires itself; the TTL is constant per map,
                // so that window is at most one TTL.
                Some(_) => break,
                // Lazily evicted or removed earlier; drop the stale slot
                // without counting it.
                None => {
                    self.order.pop_front();
                }
            }
        }

        evicted
    }
}
