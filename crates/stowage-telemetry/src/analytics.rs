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

//! The default [`AssetAnalytics`] sink, backed by a [`MetricsRegistry`].

use crate::metrics::registry::{CounterHandle, HistogramHandle, MetricsRegistry};
use parking_lot::Mutex;
use std::collections::HashMap;
use stowage_core::asset::AssetKey;
use stowage_core::error::AssetError;
use stowage_core::telemetry::metrics::MetricsResult;
use stowage_core::telemetry::{AssetAnalytics, AssetMetricsData};

/// Namespace of every metric registered by [`AssetMetrics`].
pub const NAMESPACE: &str = "assets";

/// Bucket bounds of the load-time histogram, in milliseconds.
pub const LOAD_TIME_BUCKETS_MS: [f64; 6] = [1.0, 5.0, 16.0, 33.0, 100.0, 500.0];

#[derive(Debug, Clone)]
struct Handles {
    cache_hits: CounterHandle,
    cache_misses: CounterHandle,
    loads_succeeded: CounterHandle,
    loads_failed: CounterHandle,
    load_time: HistogramHandle,
}

impl Handles {
    fn register(registry: &MetricsRegistry) -> MetricsResult<Self> {
        Ok(Self {
            cache_hits: registry.register_counter(
                NAMESPACE,
                "cache_hits",
                "Lookups served from the cache",
            )?,
            cache_misses: registry.register_counter(
                NAMESPACE,
                "cache_misses",
                "Lookups that missed the cache",
            )?,
            loads_succeeded: registry.register_counter(
                NAMESPACE,
                "loads_succeeded",
                "Fetches that produced an asset",
            )?,
            loads_failed: registry.register_counter(
                NAMESPACE,
                "loads_failed",
                "Fetches that failed",
            )?,
            load_time: registry.register_histogram(
                NAMESPACE,
                "load_time",
                "Duration of fetches owned by the service",
                "ms",
                LOAD_TIME_BUCKETS_MS.to_vec(),
            )?,
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct KeySamples {
    total_ms: f64,
    count: u64,
}

/// Records asset-service activity as `assets:*` metrics.
///
/// Metric failures are logged and swallowed; nothing recorded here can fail a
/// load.
#[derive(Debug)]
pub struct AssetMetrics {
    registry: MetricsRegistry,
    handles: Handles,
    by_key: Mutex<HashMap<String, KeySamples>>,
}

impl AssetMetrics {
    /// Creates a sink with its own in-memory registry.
    pub fn new() -> MetricsResult<Self> {
        Self::with_registry(MetricsRegistry::new())
    }

    /// Creates a sink that registers its metrics in `registry`.
    pub fn with_registry(registry: MetricsRegistry) -> MetricsResult<Self> {
        let handles = Handles::register(&registry)?;
        Ok(Self {
            registry,
            handles,
            by_key: Mutex::new(HashMap::new()),
        })
    }

    /// The registry the metrics live in.
    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    fn count(counter: &CounterHandle) -> u64 {
        counter.get().unwrap_or_else(|e| {
            log::warn!("[AssetMetrics] Failed to read {}: {e}", counter.id());
            0
        })
    }

    fn bump(counter: &CounterHandle) {
        if let Err(e) = counter.increment() {
            log::warn!("[AssetMetrics] Failed to record {}: {e}", counter.id());
        }
    }
}

impl AssetAnalytics for AssetMetrics {
    fn record_cache_hit(&self, key: &AssetKey) {
        log::trace!("Cache hit for '{key}'.");
        Self::bump(&self.handles.cache_hits);
    }

    fn record_cache_miss(&self, key: &AssetKey) {
        log::trace!("Cache miss for '{key}'.");
        Self::bump(&self.handles.cache_misses);
    }

    fn record_load_time(&self, key: &AssetKey, elapsed_ms: f64) {
        if let Err(e) = self.handles.load_time.observe(elapsed_ms) {
            log::warn!("[AssetMetrics] Failed to record load time: {e}");
        }
        let mut by_key = self.by_key.lock();
        let samples = by_key.entry(key.to_string()).or_default();
        samples.total_ms += elapsed_ms;
        samples.count += 1;
    }

    fn record_success(&self, _key: &AssetKey) {
        Self::bump(&self.handles.loads_succeeded);
    }

    fn record_failure(&self, key: &AssetKey, error: &AssetError) {
        log::error!("Failed to load asset '{key}': {error}");
        Self::bump(&self.handles.loads_failed);
    }

    fn snapshot(&self) -> AssetMetricsData {
        let hits = Self::count(&self.handles.cache_hits);
        let misses = Self::count(&self.handles.cache_misses);
        let lookups = hits + misses;
        let cache_hit_rate = if lookups > 0 {
            hits as f32 / lookups as f32
        } else {
            0.0
        };
        let average_load_time_ms = self
            .handles
            .load_time
            .mean()
            .ok()
            .flatten()
            .unwrap_or(0.0);

        AssetMetricsData {
            cache_hit_rate,
            average_load_time_ms,
            total_loads: Self::count(&self.handles.loads_succeeded),
            failed_loads: Self::count(&self.handles.loads_failed),
            load_times_by_key: self
                .by_key
                .lock()
                .iter()
                .map(|(key, samples)| (key.clone(), samples.total_ms / samples.count as f64))
                .collect(),
        }
    }

    fn clear(&self) {
        self.registry.clear_all();
        // Re-registering under the same ids keeps the existing handles valid.
        if let Err(e) = Handles::register(&self.registry) {
            log::warn!("[AssetMetrics] Failed to re-register metrics: {e}");
        }
        self.by_key.lock().clear();
    }
}
