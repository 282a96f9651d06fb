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

//! Per-type queues of reusable asset handles.

use parking_lot::Mutex;
use std::any::{type_name, TypeId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use stowage_core::asset::{Asset, AssetHandle, Recyclable};
use stowage_core::config::PoolConfig;

type HandleFactory = fn() -> Arc<dyn Recyclable>;

fn blank_handle<A: Asset>() -> Arc<dyn Recyclable> {
    AssetHandle::<A>::pooled()
}

#[derive(Default)]
struct TypePool {
    queue: VecDeque<Arc<dyn Recyclable>>,
    factory: Option<HandleFactory>,
    type_name: &'static str,
}

/// A pool of blank [`AssetHandle`]s, one bounded queue per asset type.
///
/// Every handle held by the pool has been reset and is not bound to any asset.
/// No queue ever grows past [`PoolConfig::max_size`].
pub struct HandlePool {
    config: PoolConfig,
    pools: Mutex<HashMap<TypeId, TypePool>>,
}

impl HandlePool {
    /// Creates an empty pool.
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// The sizing this pool was created with.
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Registers `A` so that [`warmup`](Self::warmup) pre-populates its queue.
    pub fn register<A: Asset>(&self) {
        let mut pools = self.pools.lock();
        let pool = pools.entry(TypeId::of::<A>()).or_default();
        pool.factory = Some(blank_handle::<A>);
        pool.type_name = type_name::<A>();
    }

    /// Dequeues a blank handle for asset type `A`, if one is available.
    pub fn try_take<A: Asset>(&self) -> Option<Arc<AssetHandle<A>>> {
        let recycled = self
            .pools
            .lock()
            .get_mut(&TypeId::of::<A>())?
            .queue
            .pop_front()?;
        recycled.into_any().downcast::<AssetHandle<A>>().ok()
    }

    /// Resets `handle` and queues it for reuse.
    ///
    /// A handle arriving at a full queue is dropped instead.
    pub fn give(&self, handle: Arc<dyn Recyclable>) {
        {
            let mut pools = self.pools.lock();
            let pool = pools.entry(handle.asset_type()).or_default();
            if pool.queue.len() >= self.config.max_size {
                log::trace!(
                    "HandlePool: queue for {} is full ({}), discarding handle.",
                    pool.type_name,
                    self.config.max_size
                );
                return;
            }
        }
        // Reset outside the pool lock: the handle takes its own lock.
        handle.reset();

        let mut pools = self.pools.lock();
        let pool = pools.entry(handle.asset_type()).or_default();
        if pool.queue.len() < self.config.max_size {
            pool.queue.push_back(handle);
        }
    }

    /// Fills the queue of every registered type up to
    /// `min(initial_size, max_size)`. Does nothing unless `warmup_on_start` is set.
    pub fn warmup(&self) {
        if !self.config.warmup_on_start {
            return;
        }
        let target = self.config.initial_size.min(self.config.max_size);
        let mut pools = self.pools.lock();
        for pool in pools.values_mut() {
            let Some(factory) = pool.factory else {
                continue;
            };
            let missing = target.saturating_sub(pool.queue.len());
            pool.queue.extend((0..missing).map(|_| factory()));
            if missing > 0 {
                log::debug!("HandlePool: pre-created {missing} handles for {}.", pool.type_name);
            }
        }
    }

    /// Drops every queued handle. Registrations are kept.
    pub fn clear(&self) {
        for pool in self.pools.lock().values_mut() {
            pool.queue.clear();
        }
    }

    /// Number of handles queued for asset type `A`.
    pub fn len_of<A: Asset>(&self) -> usize {
        self.pools
            .lock()
            .get(&TypeId::of::<A>())
            .map_or(0, |pool| pool.queue.len())
    }
}

impl std::fmt::Debug for HandlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pools = self.pools.lock();
        let queued: usize = pools.values().map(|pool| pool.queue.len()).sum();
        f.debug_struct("HandlePool")
            .field("config", &self.config)
            .field("types", &pools.len())
            .field("queued", &queued)
            .finish()
    }
}
