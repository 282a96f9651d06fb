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

//! The fire-and-forget metrics sink of the asset service.

use crate::asset::AssetKey;
use crate::error::AssetError;
use std::collections::HashMap;

/// A summary of what the service has recorded so far.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetMetricsData {
    /// `hits / (hits + misses)` over every lookup the service performed.
    ///
    /// This is the service-level hit rate. The cache reports its own,
    /// differently computed estimate in its statistics.
    pub cache_hit_rate: f32,
    /// Mean duration of all recorded fetches, in milliseconds.
    pub average_load_time_ms: f64,
    /// Number of fetches that succeeded.
    pub total_loads: u64,
    /// Number of fetches that failed.
    pub failed_loads: u64,
    /// Mean fetch duration per key, in milliseconds.
    pub load_times_by_key: HashMap<String, f64>,
}

/// A sink for asset-service metrics.
///
/// Every method is fire-and-forget: the service never looks at a result, and an
/// implementation must not let its own failures leak into the load path.
pub trait AssetAnalytics: Send + Sync {
    /// A lookup was served from the cache.
    fn record_cache_hit(&self, key: &AssetKey);

    /// A lookup missed the cache.
    fn record_cache_miss(&self, key: &AssetKey);

    /// A fetch owned by the service finished after `elapsed_ms`.
    fn record_load_time(&self, key: &AssetKey, elapsed_ms: f64);

    /// A fetch succeeded.
    fn record_success(&self, key: &AssetKey);

    /// A fetch failed.
    fn record_failure(&self, key: &AssetKey, error: &AssetError);

    /// Summarizes what has been recorded. Sinks that keep nothing return the default.
    fn snapshot(&self) -> AssetMetricsData {
        AssetMetricsData::default()
    }

    /// Forgets everything recorded so far.
    fn clear(&self) {}
}

/// A sink that records nothing, used when analytics are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AssetAnalytics for NoopAnalytics {
    fn record_cache_hit(&self, _key: &AssetKey) {}
    fn record_cache_miss(&self, _key: &AssetKey) {}
    fn record_load_time(&self, _key: &AssetKey, _elapsed_ms: f64) {}
    fn record_success(&self, _key: &AssetKey) {}
    fn record_failure(&self, _key: &AssetKey, _error: &AssetError) {}
}
