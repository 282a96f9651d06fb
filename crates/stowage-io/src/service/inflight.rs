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

//! The table of loads currently being fetched, one per key.

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use stowage_core::asset::{AssetKey, AssetValue};
use stowage_core::error::AssetResult;

/// A fetch that any number of callers can await; all of them observe the same outcome.
pub(crate) type SharedLoad = Shared<BoxFuture<'static, AssetResult<AssetValue>>>;

struct Entry {
    id: u64,
    load: SharedLoad,
}

/// Maps each key to the single fetch in progress for it.
///
/// Every entry carries a generation id so that a fetch finishing after the
/// table was cleared cannot remove a newer fetch for the same key.
#[derive(Default)]
pub(crate) struct InFlightLoads {
    loads: Mutex<HashMap<AssetKey, Entry>>,
    next_id: AtomicU64,
}

/// Whether [`InFlightLoads::join_or_start`] created the load or found one.
pub(crate) enum Registration {
    /// A new load was registered; the caller must drive it.
    Started(SharedLoad),
    /// A load for the key was already in progress.
    Joined(SharedLoad),
}

impl InFlightLoads {
    /// Returns the in-progress load for `key`, or registers the one built by
    /// `start`, which receives the generation id to pass back to
    /// [`complete`](Self::complete).
    pub(crate) fn join_or_start(
        &self,
        key: &AssetKey,
        start: impl FnOnce(u64) -> BoxFuture<'static, AssetResult<AssetValue>>,
    ) -> Registration {
        let mut loads = self.loads.lock();
        if let Some(entry) = loads.get(key.as_str()) {
            return Registration::Joined(entry.load.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let load = start(id).shared();
        loads.insert(
            key.clone(),
            Entry {
                id,
                load: load.clone(),
            },
        );
        Registration::Started(load)
    }

    /// Deregisters the load `id` for `key`. Returns `false` if it was already gone.
    pub(crate) fn complete(&self, key: &str, id: u64) -> bool {
        let mut loads = self.loads.lock();
        match loads.get(key) {
            Some(entry) if entry.id == id => {
                loads.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.loads.lock().len()
    }

    pub(crate) fn clear(&self) {
        self.loads.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> AssetKey {
        AssetKey::new(name).unwrap()
    }

    fn ready(text: &str) -> BoxFuture<'static, AssetResult<AssetValue>> {
        let value = AssetValue::new(text.to_string());
        async move { Ok(value) }.boxed()
    }

    #[test]
    fn test_second_registration_joins_first() {
        let table = InFlightLoads::default();
        let first = table.join_or_start(&key("a"), |_| ready("first"));
        let second = table.join_or_start(&key("a"), |_| panic!("must join the existing load"));

        assert!(matches!(first, Registration::Started(_)));
        assert!(matches!(second, Registration::Joined(_)));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn test_joined_callers_share_the_outcome() {
        let table = InFlightLoads::default();
        let Registration::Started(first) = table.join_or_start(&key("a"), |_| ready("x")) else {
            panic!("expected a new load");
        };
        let Registration::Joined(second) = table.join_or_start(&key("a"), |_| ready("y")) else {
            panic!("expected to join");
        };

        let (a, b) = futures::join!(first, second);
        assert!(a.unwrap().ptr_eq(&b.unwrap()));
    }

    #[test]
    fn test_complete_ignores_stale_generation() {
        let table = InFlightLoads::default();
        let mut stale_id = 0;
        table.join_or_start(&key("a"), |id| {
            stale_id = id;
            ready("old")
        });

        table.clear();
        let mut fresh_id = 0;
        table.join_or_start(&key("a"), |id| {
            fresh_id = id;
            ready("new")
        });

        assert!(!table.complete("a", stale_id));
        assert_eq!(table.len(), 1);
        assert!(table.complete("a", fresh_id));
        assert!(!table.complete("a", fresh_id));
        assert_eq!(table.len(), 0);
    }
}
