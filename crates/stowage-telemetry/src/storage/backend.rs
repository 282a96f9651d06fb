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

//! The storage contract behind [`MetricsRegistry`](crate::MetricsRegistry).

use std::fmt::Debug;
use stowage_core::telemetry::metrics::{
    Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult,
};

/// Interface of a metrics storage backend.
///
/// Backends only have to store and retrieve whole metrics; the update
/// operations have read-modify-write defaults built on top of that.
pub trait MetricsBackend: Send + Sync + Debug + 'static {
    /// Store or replace a metric.
    fn put_metric(&self, metric: Metric) -> MetricsResult<()>;

    /// Retrieve a metric by ID.
    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric>;

    /// Check if a metric exists.
    fn contains_metric(&self, id: &MetricId) -> bool;

    /// Remove a metric.
    fn remove_metric(&self, id: &MetricId) -> MetricsResult<()>;

    /// Get all metrics (potentially expensive operation).
    fn list_all_metrics(&self) -> Vec<Metric>;

    /// Clear all metrics.
    fn clear_all(&self);

    /// Get the number of metrics stored.
    fn metric_count(&self) -> usize;

    /// Increment a counter by the given amount, returning the new value.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut metric = self.get_metric(id)?;
        let MetricValue::Counter(ref mut value) = metric.value else {
            return Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: metric.value.metric_type(),
            });
        };
        *value = value.saturating_add(delta);
        let result = *value;
        metric.touch();
        self.put_metric(metric)?;
        Ok(result)
    }

    /// Add a sample to a histogram.
    fn record_histogram_sample(&self, id: &MetricId, sample: f64) -> MetricsResult<()> {
        let mut metric = self.get_metric(id)?;
        match metric.value {
            MetricValue::Histogram {
                ref bucket_bounds,
                ref mut bucket_counts,
                ref mut count,
                ref mut sum,
            } => {
                for (bound, bucket) in bucket_bounds.iter().zip(bucket_counts.iter_mut()) {
                    if sample <= *bound {
                        *bucket += 1;
                    }
                }
                *count += 1;
                *sum += sample;
            }
            _ => {
                return Err(MetricsError::TypeMismatch {
                    expected: MetricType::Histogram,
                    found: metric.value.metric_type(),
                })
            }
        }
        metric.touch();
        self.put_metric(metric)
    }
}
