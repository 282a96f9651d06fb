// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A keyed, capacity-bounded asset cache with least-recently-used eviction.

use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use stowage_core::asset::{Asset, AssetKey, AssetValue};

/// How many keys [`CacheStatistics::most_accessed_keys`] reports.
pub const MOST_ACCESSED_KEYS: usize = 10;

/// A point-in-time summary of a cache.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStatistics {
    /// Number of resident entries.
    pub total_entries: usize,
    /// Capacity of the cache.
    pub max_size: usize,
    /// `total_hits / (total_hits + total_entries)` over resident entries.
    ///
    /// This is an estimate: the cache never sees pure misses, so every resident
    /// entry stands in for the one miss that loaded it.
    pub hit_rate: f32,
    /// Resident keys with the most hits, most-hit first.
    pub most_accessed_keys: Vec<AssetKey>,
}

/// Per-entry bookkeeping exposed for inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntryInfo {
    /// Successful lookups of this entry since it was inserted.
    pub hit_count: u64,
    /// When the entry was last read or written.
    pub last_accessed: Instant,
}

/// The contract the asset service needs from a cache.
///
/// Every method is internally synchronized.
pub trait AssetCache: Send + Sync {
    /// Looks `key` up, expecting an asset of type `expected` (`None` accepts any type).
    ///
    /// A hit promotes the entry to most-recently-used and counts a hit. An absent
    /// key or an entry of another type is a miss and leaves the cache untouched.
    fn get(&self, key: &str, expected: Option<TypeId>) -> Option<AssetValue>;

    /// Inserts or replaces the entry for `key`, making it most-recently-used.
    ///
    /// Returns the key evicted to make room, if any. Replacing an existing key
    /// never evicts.
    fn put(&self, key: AssetKey, asset: AssetValue) -> Option<AssetKey>;

    /// Removes the entry for `key`, returning its asset. No-op if absent.
    fn remove(&self, key: &str) -> Option<AssetValue>;

    /// Removes the entry for `key` only if it still holds the instance with
    /// `identity`. A key reloaded since is left in place.
    fn remove_instance(&self, key: &str, identity: usize) -> Option<AssetValue>;

    /// Removes every entry.
    fn clear(&self);

    /// Reverse lookup: the key an asset instance is currently cached under.
    fn key_of(&self, identity: usize) -> Option<AssetKey>;

    /// `true` if `key` is resident. Does not count as an access.
    fn contains(&self, key: &str) -> bool;

    /// Number of resident entries.
    fn len(&self) -> usize;

    /// `true` if no entries are resident.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of resident entries.
    fn capacity(&self) -> usize;

    /// A summary of the cache contents.
    fn statistics(&self) -> CacheStatistics;
}

impl dyn AssetCache {
    /// Typed lookup: a hit of another type is a miss.
    pub fn get_as<A: Asset>(&self, key: &str) -> Option<Arc<A>> {
        self.get(key, Some(TypeId::of::<A>()))?.downcast::<A>()
    }
}

const NIL: usize = usize::MAX;

#[derive(Debug)]
struct CacheEntry {
    key: AssetKey,
    asset: AssetValue,
    last_accessed: Instant,
    hit_count: u64,
}

/// A slot of the recency list. Free slots have no entry and are chained
/// through `free` instead of `prev`/`next`.
#[derive(Debug)]
struct Slot {
    entry: Option<CacheEntry>,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
struct LruState {
    index: HashMap<AssetKey, usize>,
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
    reverse: HashMap<usize, AssetKey>,
}

impl LruState {
    fn new(capacity: usize) -> Self {
        Self {
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            reverse: HashMap::with_capacity(capacity),
        }
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        if prev == NIL {
            self.head = next;
        } else {
            self.slots[prev].next = next;
        }
        if next == NIL {
            self.tail = prev;
        } else {
            self.slots[next].prev = prev;
        }
        self.slots[idx].prev = NIL;
        self.slots[idx].next = NIL;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = NIL;
        self.slots[idx].next = self.head;
        if self.head == NIL {
            self.tail = idx;
        } else {
            self.slots[self.head].prev = idx;
        }
        self.head = idx;
    }

    fn promote(&mut self, idx: usize) {
        if self.head != idx {
            self.unlink(idx);
            self.push_front(idx);
        }
    }

    fn insert_front(&mut self, entry: CacheEntry) -> usize {
        let slot = Slot {
            entry: Some(entry),
            prev: NIL,
            next: NIL,
        };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.push_front(idx);
        idx
    }

    fn forget_identity(&mut self, identity: usize, key: &AssetKey) {
        if self.reverse.get(&identity) == Some(key) {
            self.reverse.remove(&identity);
        }
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let idx = self.index.remove(key)?;
        self.unlink(idx);
        let entry = self.slots[idx].entry.take();
        self.free.push(idx);
        if let Some(entry) = &entry {
            self.forget_identity(entry.asset.identity(), &entry.key);
        }
        entry
    }

    fn evict_least_recently_used(&mut self) -> Option<AssetKey> {
        if self.tail == NIL {
            return None;
        }
        let key = self.slots[self.tail].entry.as_ref()?.key.clone();
        self.remove(key.as_str());
        Some(key)
    }

    fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.reverse.clear();
        self.head = NIL;
        self.tail = NIL;
    }

    /// Iterates resident entries from most- to least-recently used.
    fn iter_by_recency(&self) -> impl Iterator<Item = &CacheEntry> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let slot = &self.slots[cursor];
            cursor = slot.next;
            slot.entry.as_ref()
        })
    }
}

/// The default [`AssetCache`]: a hash map indexed into an intrusive recency list.
///
/// All operations run under one mutex per cache instance, because promoting an
/// entry on read mutates the recency list. Every operation is O(1) except
/// [`statistics`](AssetCache::statistics), which walks the resident entries.
#[derive(Debug)]
pub struct LruAssetCache {
    max_size: usize,
    state: Mutex<LruState>,
}

impl LruAssetCache {
    /// Creates an empty cache holding at most `max_size` entries.
    ///
    /// A `max_size` of zero is raised to one; the service validates its
    /// configuration before it gets here.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            max_size,
            state: Mutex::new(LruState::new(max_size)),
        }
    }

    /// Typed lookup, see [`AssetCache::get`].
    pub fn get_as<A: Asset>(&self, key: &str) -> Option<Arc<A>> {
        self.get(key, Some(TypeId::of::<A>()))?.downcast::<A>()
    }

    /// Resident keys, most-recently-used first.
    pub fn keys_by_recency(&self) -> Vec<AssetKey> {
        self.state
            .lock()
            .iter_by_recency()
            .map(|entry| entry.key.clone())
            .collect()
    }

    /// Bookkeeping of a resident entry. Does not count as an access.
    pub fn entry_info(&self, key: &str) -> Option<CacheEntryInfo> {
        let state = self.state.lock();
        let idx = *state.index.get(key)?;
        state.slots[idx].entry.as_ref().map(|entry| CacheEntryInfo {
            hit_count: entry.hit_count,
            last_accessed: entry.last_accessed,
        })
    }
}

impl AssetCache for LruAssetCache {
    fn get(&self, key: &str, expected: Option<TypeId>) -> Option<AssetValue> {
        let mut state = self.state.lock();
        let idx = *state.index.get(key)?;
        let value = {
            let entry = state.slots[idx].entry.as_mut()?;
            if expected.is_some_and(|expected| entry.asset.type_id() != expected) {
                return None;
            }
            entry.hit_count += 1;
            entry.last_accessed = Instant::now();
            entry.asset.clone()
        };
        state.promote(idx);
        Some(value)
    }

    fn put(&self, key: AssetKey, asset: AssetValue) -> Option<AssetKey> {
        let mut state = self.state.lock();

        if let Some(&idx) = state.index.get(key.as_str()) {
            let previous = state.slots[idx].entry.as_mut().map(|entry| {
                entry.last_accessed = Instant::now();
                std::mem::replace(&mut entry.asset, asset.clone())
            });
            if let Some(previous) = previous {
                state.forget_identity(previous.identity(), &key);
            }
            state.reverse.insert(asset.identity(), key);
            state.promote(idx);
            return None;
        }

        let evicted = if state.index.len() >= self.max_size {
            state.evict_least_recently_used()
        } else {
            None
        };
        if let Some(evicted) = &evicted {
            log::trace!("LruAssetCache: evicted '{evicted}' to make room for '{key}'.");
        }

        state.reverse.insert(asset.identity(), key.clone());
        let idx = state.insert_front(CacheEntry {
            key: key.clone(),
            asset,
            last_accessed: Instant::now(),
            hit_count: 0,
        });
        state.index.insert(key, idx);
        evicted
    }

    fn remove(&self, key: &str) -> Option<AssetValue> {
        self.state.lock().remove(key).map(|entry| entry.asset)
    }

    fn remove_instance(&self, key: &str, identity: usize) -> Option<AssetValue> {
        let mut state = self.state.lock();
        let idx = *state.index.get(key)?;
        let holds_instance = state.slots[idx]
            .entry
            .as_ref()
            .is_some_and(|entry| entry.asset.identity() == identity);
        if !holds_instance {
            return None;
        }
        state.remove(key).map(|entry| entry.asset)
    }

    fn clear(&self) {
        self.state.lock().clear();
    }

    fn key_of(&self, identity: usize) -> Option<AssetKey> {
        self.state.lock().reverse.get(&identity).cloned()
    }

    fn contains(&self, key: &str) -> bool {
        self.state.lock().index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    fn capacity(&self) -> usize {
        self.max_size
    }

    fn statistics(&self) -> CacheStatistics {
        let state = self.state.lock();
        let total_entries = state.index.len();
        let total_hits: u64 = state.iter_by_recency().map(|entry| entry.hit_count).sum();
        let total_requests = total_hits + total_entries as u64;
        let hit_rate = if total_requests > 0 {
            total_hits as f32 / total_requests as f32
        } else {
            0.0
        };

        // Stable sort over recency order: equal hit counts keep the more recent key first.
        let mut by_hits: Vec<(&AssetKey, u64)> = state
            .iter_by_recency()
            .map(|entry| (&entry.key, entry.hit_count))
            .collect();
        by_hits.sort_by(|a, b| b.1.cmp(&a.1));

        CacheStatistics {
            total_entries,
            max_size: self.max_size,
            hit_rate,
            most_accessed_keys: by_hits
                .into_iter()
                .take(MOST_ACCESSED_KEYS)
                .map(|(key, _)| key.clone())
                .collect(),
        }
    }
}
