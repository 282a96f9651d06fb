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

//! The asset service: the single entry point for obtaining assets.
//!
//! A load first consults the cache. On a miss the caller takes one of
//! `max_concurrent_loads` slots, re-checks the cache, and then either joins the
//! fetch already in flight for the key or starts one. A started fetch runs as a
//! shared future on the Tokio runtime and owns its caller's slot until it ends,
//! so cancelling one waiter never stops a fetch other callers are joined to.

mod inflight;

use self::inflight::{InFlightLoads, Registration};
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use stowage_core::asset::{Asset, AssetHandle, AssetKey, AssetValue, HandleReleaser, Recyclable};
use stowage_core::config::AssetsConfig;
use stowage_core::error::{AssetError, AssetResult};
use stowage_core::event::{AssetEvent, EventBus};
use stowage_core::loading::{LoadingStrategy, ProgressSink};
use stowage_core::telemetry::{AssetAnalytics, NoopAnalytics};
use stowage_data::{AssetCache, CacheStatistics, HandlePool, LruAssetCache};
use stowage_telemetry::{AssetMetrics, ScopedLoadTimer};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

const SERVICE: &str = "asset service";

/// The outcome of [`AssetService::preload`].
#[derive(Debug, Default, Clone)]
pub struct PreloadReport {
    /// Keys that are now cached.
    pub loaded: Vec<String>,
    /// Keys that could not be loaded, with the reason.
    pub failed: Vec<(String, AssetError)>,
}

impl PreloadReport {
    /// `true` if every key loaded.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

struct ServiceInner {
    config: AssetsConfig,
    cache: Arc<dyn AssetCache>,
    pool: HandlePool,
    strategy: Arc<dyn LoadingStrategy>,
    analytics: Arc<dyn AssetAnalytics>,
    events: EventBus<AssetEvent>,
    slots: Arc<Semaphore>,
    in_flight: InFlightLoads,
    /// Values fetched by the strategy and not yet released, for forced clears.
    active: Mutex<HashMap<AssetKey, AssetValue>>,
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

impl ServiceInner {
    fn ensure_live(&self) -> AssetResult<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(AssetError::Disposed(SERVICE))
        } else {
            Ok(())
        }
    }

    /// Releases `key` if it still holds the instance with `identity`.
    fn release_by_key(&self, key: &AssetKey, identity: usize) {
        let active = {
            let mut loads = self.active.lock();
            let holds_instance = loads
                .get(key.as_str())
                .is_some_and(|value| value.identity() == identity);
            if holds_instance {
                loads.remove(key.as_str())
            } else {
                None
            }
        };
        if let Some(value) = &active {
            self.strategy.release(key, value);
        }
        if self.cache.remove_instance(key.as_str(), identity).is_some() || active.is_some() {
            log::debug!("AssetService: released '{key}'.");
        } else {
            log::trace!("AssetService: '{key}' no longer holds the released instance.");
        }
    }

    fn clear_cache(&self) {
        self.cache.clear();
        let drained: Vec<(AssetKey, AssetValue)> = self.active.lock().drain().collect();
        for (key, value) in &drained {
            self.strategy.release(key, value);
        }
        log::info!(
            "AssetService: cache cleared, force-released {} active load(s).",
            drained.len()
        );
    }
}

impl HandleReleaser for ServiceInner {
    fn release_key(&self, key: &AssetKey, identity: usize) {
        self.release_by_key(key, identity);
    }

    fn recycle(&self, handle: Arc<dyn Recyclable>) {
        self.pool.give(handle);
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Runs one fetch for `key` on behalf of every caller joined to it.
///
/// Stores a success in the cache before deregistering the in-flight entry, so
/// a caller arriving in between finds the value in one place or the other.
async fn fetch_shared(
    service: Weak<ServiceInner>,
    key: AssetKey,
    load_id: u64,
    permit: Option<OwnedSemaphorePermit>,
) -> AssetResult<AssetValue> {
    let Some(service) = service.upgrade() else {
        return Err(AssetError::Disposed(SERVICE));
    };
    let cancel = service.shutdown.child_token();
    let progress: ProgressSink = {
        let events = service.events.clone();
        let key = key.clone();
        Arc::new(move |progress: f32| {
            events.publish(AssetEvent::LoadProgress {
                key: key.clone(),
                progress,
            })
        })
    };

    log::debug!("AssetService: fetching '{key}'.");
    let (fetched, elapsed_ms) = {
        let timer = ScopedLoadTimer::new(service.analytics.as_ref(), &key);
        let fetched = service
            .strategy
            .fetch(&key, progress, cancel.clone())
            .await;
        (fetched, timer.elapsed_ms())
    };

    let fetched = match fetched {
        Ok(value) if service.disposed.load(Ordering::Acquire) => {
            service.strategy.release(&key, &value);
            Err(AssetError::Disposed(SERVICE))
        }
        Ok(value) => Ok(value),
        Err(_) if cancel.is_cancelled() => Err(AssetError::cancelled(key.as_str())),
        Err(cause) => Err(AssetError::load_failed(key.as_str(), cause)),
    };

    let outcome = match fetched {
        Ok(value) => {
            service.cache.put(key.clone(), value.clone());
            service.active.lock().insert(key.clone(), value.clone());
            service.events.publish(AssetEvent::AssetLoaded {
                key: key.clone(),
                asset: value.clone(),
            });
            service.analytics.record_success(&key);
            if service.config.log_performance_metrics {
                log::info!("AssetService: loaded '{key}' in {elapsed_ms:.2}ms.");
            } else {
                log::debug!("AssetService: loaded '{key}' in {elapsed_ms:.2}ms.");
            }
            Ok(value)
        }
        Err(error) => {
            service.analytics.record_failure(&key, &error);
            service.events.publish(AssetEvent::LoadFailed {
                key: key.clone(),
                error: error.clone(),
            });
            Err(error)
        }
    };

    service.in_flight.complete(key.as_str(), load_id);
    drop(permit);
    outcome
}

/// Deduplicating, concurrency-bounded asset loader over a cache and a handle pool.
///
/// Cloning is cheap; every clone drives the same service. Loads must run
/// inside a Tokio runtime.
#[derive(Clone)]
pub struct AssetService {
    inner: Arc<ServiceInner>,
}

impl AssetService {
    /// Builds a service with the default cache, pool, and metrics sink.
    pub fn new(config: AssetsConfig, strategy: impl LoadingStrategy) -> AssetResult<Self> {
        Self::builder(config).strategy(strategy).build()
    }

    /// Starts building a service from `config`.
    pub fn builder(config: AssetsConfig) -> AssetServiceBuilder {
        AssetServiceBuilder::new(config)
    }

    /// Loads the asset for `key`, or returns the cached one.
    ///
    /// Concurrent loads of one key share a single fetch and all receive the
    /// same instance. Cancelling `cancel` abandons only this caller's wait.
    ///
    /// # Errors
    /// - [`AssetError::InvalidArgument`] for an empty key.
    /// - [`AssetError::LoadFailed`] if the strategy fails; the failure is not cached.
    /// - [`AssetError::Cancelled`] if `cancel` fires first.
    /// - [`AssetError::TypeMismatch`] if the fetched asset is not an `A`.
    /// - [`AssetError::Disposed`] after [`dispose`](Self::dispose).
    pub async fn load_asset<A: Asset>(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> AssetResult<Arc<A>> {
        let value = self.load_value(key, Some(TypeId::of::<A>()), cancel).await?;
        value.downcast::<A>().ok_or_else(|| AssetError::TypeMismatch {
            key: key.to_string(),
            expected: type_name::<A>(),
        })
    }

    /// Loads the asset for `key` and wraps it in a handle with a reference count of 1.
    ///
    /// A blank handle is taken from the pool when one is available for `A`;
    /// otherwise a fresh, unpooled handle is created. The handle is the
    /// caller's to release.
    pub async fn load_with_handle<A: Asset>(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> AssetResult<Arc<AssetHandle<A>>> {
        let asset = self.load_asset::<A>(key, cancel).await?;
        let key = AssetKey::new(key)?;
        let service: Weak<ServiceInner> = Arc::downgrade(&self.inner);
        let releaser: Weak<dyn HandleReleaser> = service;

        if let Some(handle) = self.inner.pool.try_take::<A>() {
            handle.initialize(asset, key, releaser)?;
            return Ok(handle);
        }
        Ok(AssetHandle::new(asset, key, releaser))
    }

    async fn load_value(
        &self,
        key: &str,
        expected: Option<TypeId>,
        cancel: &CancellationToken,
    ) -> AssetResult<AssetValue> {
        let inner = &self.inner;
        inner.ensure_live()?;
        let key = AssetKey::new(key)?;

        if let Some(value) = inner.cache.get(key.as_str(), expected) {
            inner.analytics.record_cache_hit(&key);
            return Ok(value);
        }
        inner.analytics.record_cache_miss(&key);

        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AssetError::cancelled(key.as_str())),
            permit = inner.slots.clone().acquire_owned() => {
                permit.map_err(|_| AssetError::Disposed(SERVICE))?
            }
        };

        // A load that finished while this caller queued for a slot.
        if let Some(value) = inner.cache.get(key.as_str(), expected) {
            return Ok(value);
        }

        let mut permit = Some(permit);
        let registration = inner.in_flight.join_or_start(&key, |load_id| {
            fetch_shared(
                Arc::downgrade(inner),
                key.clone(),
                load_id,
                permit.take(),
            )
            .boxed()
        });
        let load = match registration {
            Registration::Started(load) => {
                match tokio::runtime::Handle::try_current() {
                    Ok(runtime) => drop(runtime.spawn(load.clone())),
                    Err(_) => log::trace!("AssetService: no runtime, '{key}' is driven by its callers."),
                }
                load
            }
            Registration::Joined(load) => {
                log::trace!("AssetService: joining in-flight load of '{key}'.");
                load
            }
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AssetError::cancelled(key.as_str())),
            outcome = load => outcome,
        };
        drop(permit);
        outcome
    }

    /// Releases a handle reference; see [`AssetHandle::release`].
    pub fn release_handle<A: Asset>(&self, handle: &Arc<AssetHandle<A>>) {
        handle.release();
    }

    /// Releases the cache entry holding `asset`, found by identity.
    ///
    /// Returns `false` if the instance is not cached.
    pub fn release_asset<A: Asset>(&self, asset: &Arc<A>) -> bool {
        let identity = AssetValue::identity_of(asset);
        match self.inner.cache.key_of(identity) {
            Some(key) => {
                self.inner.release_by_key(&key, identity);
                true
            }
            None => false,
        }
    }

    /// Loads every key concurrently, through the same slots as ordinary loads.
    ///
    /// `progress` receives the fraction of keys finished after each one
    /// completes. A failing key is logged and reported but does not stop the
    /// others.
    pub async fn preload<K: AsRef<str>>(
        &self,
        keys: &[K],
        progress: Option<ProgressSink>,
        cancel: &CancellationToken,
    ) -> PreloadReport {
        let total = keys.len();
        let completed = AtomicUsize::new(0);

        let loads = keys.iter().map(|key| {
            let key = key.as_ref();
            let completed = &completed;
            let progress = progress.as_ref();
            async move {
                let result = self.load_value(key, None, cancel).await;
                if let Err(e) = &result {
                    log::error!("AssetService: failed to preload '{key}': {e}");
                }
                let done = completed.fetch_add(1, Ordering::AcqRel) + 1;
                if let Some(progress) = progress {
                    progress(done as f32 / total as f32);
                }
                (key.to_string(), result)
            }
        });

        let mut report = PreloadReport::default();
        for (key, result) in join_all(loads).await {
            match result {
                Ok(_) => report.loaded.push(key),
                Err(e) => report.failed.push((key, e)),
            }
        }
        report
    }

    /// Preloads the configured warmup keys, then pre-populates the handle pool.
    ///
    /// # Errors
    /// Returns [`AssetError::Disposed`] after [`dispose`](Self::dispose).
    pub async fn warmup(&self, cancel: &CancellationToken) -> AssetResult<PreloadReport> {
        self.inner.ensure_live()?;
        let keys = &self.inner.config.warmup_keys;
        let report = if keys.is_empty() {
            PreloadReport::default()
        } else {
            self.preload(keys.as_slice(), None, cancel).await
        };
        self.inner.pool.warmup();
        log::info!(
            "AssetService: warmup loaded {} key(s), {} failed.",
            report.loaded.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Returns the cached asset for `key` without fetching or waiting.
    pub fn try_get_cached<A: Asset>(&self, key: &str) -> Option<Arc<A>> {
        if key.is_empty() || self.is_disposed() {
            return None;
        }
        self.inner.cache.get_as::<A>(key)
    }

    /// Empties the cache and force-releases every active load, including
    /// ones still referenced by outstanding handles.
    pub fn clear_cache(&self) {
        self.inner.clear_cache();
    }

    /// Shuts the service down. Idempotent.
    ///
    /// Clears the cache, closes the concurrency slots so waiting loads fail,
    /// cancels running fetches, and drains the pool. Every later load fails
    /// with [`AssetError::Disposed`].
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        inner.clear_cache();
        inner.slots.close();
        inner.shutdown.cancel();
        inner.pool.clear();
        inner.in_flight.clear();
        inner.analytics.clear();
        log::info!("AssetService: disposed.");
    }

    /// Subscribes to load events. Events published before subscribing are not delivered.
    pub fn subscribe(&self) -> flume::Receiver<AssetEvent> {
        self.inner.events.subscribe()
    }

    /// Makes [`warmup`](Self::warmup) pre-create pooled handles for `A`.
    pub fn register_pooled_type<A: Asset>(&self) {
        self.inner.pool.register::<A>();
    }

    /// Statistics of the cache.
    pub fn cache_statistics(&self) -> CacheStatistics {
        self.inner.cache.statistics()
    }

    /// The metrics sink.
    pub fn analytics(&self) -> &Arc<dyn AssetAnalytics> {
        &self.inner.analytics
    }

    /// The configuration the service was built with.
    pub fn config(&self) -> &AssetsConfig {
        &self.inner.config
    }

    /// The handle pool.
    pub fn pool(&self) -> &HandlePool {
        &self.inner.pool
    }

    /// `true` once [`dispose`](Self::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Number of keys with a fetch in progress.
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.len()
    }
}

impl std::fmt::Debug for AssetService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetService")
            .field("config", &self.inner.config)
            .field("cached", &self.inner.cache.len())
            .field("in_flight", &self.inner.in_flight.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Assembles an [`AssetService`], substituting custom parts where given.
pub struct AssetServiceBuilder {
    config: AssetsConfig,
    strategy: Option<Arc<dyn LoadingStrategy>>,
    cache: Option<Arc<dyn AssetCache>>,
    pool: Option<HandlePool>,
    analytics: Option<Arc<dyn AssetAnalytics>>,
}

impl AssetServiceBuilder {
    fn new(config: AssetsConfig) -> Self {
        Self {
            config,
            strategy: None,
            cache: None,
            pool: None,
            analytics: None,
        }
    }

    /// The strategy that fetches assets. Required.
    pub fn strategy(self, strategy: impl LoadingStrategy) -> Self {
        self.shared_strategy(Arc::new(strategy))
    }

    /// Like [`strategy`](Self::strategy), for a strategy shared with other owners.
    pub fn shared_strategy(mut self, strategy: Arc<dyn LoadingStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Replaces the default [`LruAssetCache`].
    pub fn cache(mut self, cache: Arc<dyn AssetCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Replaces the default pool sized by the configuration.
    pub fn pool(mut self, pool: HandlePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Replaces the default metrics sink. Takes precedence over `enable_analytics`.
    pub fn analytics(mut self, analytics: Arc<dyn AssetAnalytics>) -> Self {
        self.analytics = Some(analytics);
        self
    }

    /// Validates the configuration and builds the service.
    ///
    /// # Errors
    /// Returns [`AssetError::InvalidArgument`] for an invalid configuration or a
    /// missing strategy, and [`AssetError::Config`] if the metrics sink cannot
    /// be set up.
    pub fn build(self) -> AssetResult<AssetService> {
        let config = self.config;
        config.validate()?;
        let strategy = self.strategy.ok_or_else(|| {
            AssetError::InvalidArgument("a loading strategy is required".to_string())
        })?;

        let analytics: Arc<dyn AssetAnalytics> = match self.analytics {
            Some(analytics) => analytics,
            None if config.enable_analytics => Arc::new(
                AssetMetrics::new().map_err(|e| AssetError::Config(e.to_string()))?,
            ),
            None => Arc::new(NoopAnalytics),
        };
        let cache = self
            .cache
            .unwrap_or_else(|| Arc::new(LruAssetCache::new(config.cache_size)));
        let pool = self
            .pool
            .unwrap_or_else(|| HandlePool::new(config.pool.clone()));

        log::info!(
            "AssetService: ready (max_concurrent_loads={}, cache_size={}).",
            config.max_concurrent_loads,
            cache.capacity()
        );
        Ok(AssetService {
            inner: Arc::new(ServiceInner {
                slots: Arc::new(Semaphore::new(config.max_concurrent_loads)),
                config,
                cache,
                pool,
                strategy,
                analytics,
                events: EventBus::new(),
                in_flight: InFlightLoads::default(),
                active: Mutex::new(HashMap::new()),
                shutdown: CancellationToken::new(),
                disposed: AtomicBool::new(false),
            }),
        })
    }
}
