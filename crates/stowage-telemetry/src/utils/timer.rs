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

//! RAII timers that report fetch durations to an analytics sink.

use stowage_core::asset::AssetKey;
use stowage_core::telemetry::AssetAnalytics;
use stowage_core::utils::timer::Stopwatch;

/// Times a fetch and reports it through
/// [`AssetAnalytics::record_load_time`] when dropped.
///
/// Dropping records the duration on every exit path, including early
/// returns and the future being dropped mid-fetch.
pub struct ScopedLoadTimer<'a> {
    stopwatch: Stopwatch,
    sink: &'a dyn AssetAnalytics,
    key: &'a AssetKey,
}

impl<'a> ScopedLoadTimer<'a> {
    /// Creates a timer for `key` and starts it immediately.
    pub fn new(sink: &'a dyn AssetAnalytics, key: &'a AssetKey) -> Self {
        Self {
            stopwatch: Stopwatch::new(),
            sink,
            key,
        }
    }

    /// Milliseconds elapsed so far.
    pub fn elapsed_ms(&self) -> f64 {
        self.stopwatch.elapsed_ms_f64()
    }
}

impl Drop for ScopedLoadTimer<'_> {
    fn drop(&mut self) {
        self.sink
            .record_load_time(self.key, self.stopwatch.elapsed_ms_f64());
    }
}
