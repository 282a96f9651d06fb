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

//! The default, process-local metrics backend.

use crate::storage::backend::MetricsBackend;
use parking_lot::RwLock;
use std::collections::HashMap;
use stowage_core::telemetry::metrics::{
    Metric, MetricId, MetricType, MetricValue, MetricsError, MetricsResult,
};

/// In-memory metrics backend using `RwLock<HashMap>`.
///
/// Reads run concurrently; each update takes the write lock once.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    storage: RwLock<HashMap<MetricId, Metric>>,
}

impl InMemoryBackend {
    /// Create a new in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsBackend for InMemoryBackend {
    fn put_metric(&self, metric: Metric) -> MetricsResult<()> {
        self.storage.write().insert(metric.id.clone(), metric);
        Ok(())
    }

    fn get_metric(&self, id: &MetricId) -> MetricsResult<Metric> {
        self.storage
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    fn contains_metric(&self, id: &MetricId) -> bool {
        self.storage.read().contains_key(id)
    }

    fn remove_metric(&self, id: &MetricId) -> MetricsResult<()> {
        self.storage
            .write()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))
    }

    fn list_all_metrics(&self) -> Vec<Metric> {
        self.storage.read().values().cloned().collect()
    }

    fn clear_all(&self) {
        self.storage.write().clear();
    }

    fn metric_count(&self) -> usize {
        self.storage.read().len()
    }

    // A single write lock makes concurrent increments lossless.
    fn increment_counter(&self, id: &MetricId, delta: u64) -> MetricsResult<u64> {
        let mut storage = self.storage.write();
        let metric = storage
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        let found = metric.value.metric_type();
        let MetricValue::Counter(value) = &mut metric.value else {
            return Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found,
            });
        };
        *value = value.saturating_add(delta);
        let result = *value;
        metric.touch();
        Ok(result)
    }

    fn record_histogram_sample(&self, id: &MetricId, sample: f64) -> MetricsResult<()> {
        let mut storage = self.storage.write();
        let metric = storage
            .get_mut(id)
            .ok_or_else(|| MetricsError::MetricNotFound(id.clone()))?;
        let found = metric.value.metric_type();
        let MetricValue::Histogram {
            bucket_bounds,
            bucket_counts,
            count,
            sum,
        } = &mut metric.value
        else {
            return Err(MetricsError::TypeMismatch {
                expected: MetricType::Histogram,
                found,
            });
        };
        for (bound, bucket) in bucket_bounds.iter().zip(bucket_counts.iter_mut()) {
            if sample <= *bound {
                *bucket += 1;
            }
        }
        *count += 1;
        *sum += sample;
        metric.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn histogram(id: MetricId) -> Metric {
        Metric::histogram(id, "Load time", "ms", vec![1.0, 5.0, 16.0]).unwrap()
    }

    #[test]
    fn test_put_get_remove() {
        let backend = InMemoryBackend::new();
        let id = MetricId::new("assets", "cache_hits");
        backend.put_metric(Metric::counter(id.clone(), "Hits")).unwrap();

        assert!(backend.contains_metric(&id));
        assert_eq!(backend.get_metric(&id).unwrap().value.as_counter(), Some(0));

        backend.remove_metric(&id).unwrap();
        assert!(!backend.contains_metric(&id));
        assert!(backend.remove_metric(&id).is_err());
    }

    #[test]
    fn test_histogram_buckets_are_cumulative() {
        let backend = InMemoryBackend::new();
        let id = MetricId::new("assets", "load_time");
        backend.put_metric(histogram(id.clone())).unwrap();

        for sample in [0.5, 3.0, 10.0, 40.0] {
            backend.record_histogram_sample(&id, sample).unwrap();
        }

        match backend.get_metric(&id).unwrap().value {
            MetricValue::Histogram {
                bucket_counts,
                count,
                sum,
                ..
            } => {
                assert_eq!(bucket_counts, vec![1, 2, 3]);
                assert_eq!(count, 4);
                assert_eq!(sum, 53.5);
            }
            other => panic!("expected a histogram, got {other:?}"),
        }
    }

    #[test]
    fn test_type_mismatch_errors() {
        let backend = InMemoryBackend::new();
        let id = MetricId::new("assets", "load_time");
        backend.put_metric(histogram(id.clone())).unwrap();

        let result = backend.increment_counter(&id, 5);
        assert_eq!(
            result,
            Err(MetricsError::TypeMismatch {
                expected: MetricType::Counter,
                found: MetricType::Histogram,
            })
        );
    }

    #[test]
    fn test_list_and_clear() {
        let backend = InMemoryBackend::new();
        backend
            .put_metric(Metric::counter(MetricId::new("assets", "a"), "A"))
            .unwrap();
        backend
            .put_metric(Metric::counter(MetricId::new("other", "b"), "B"))
            .unwrap();
        backend
            .put_metric(histogram(MetricId::new("assets", "load_time")))
            .unwrap();

        assert_eq!(backend.list_all_metrics().len(), 3);

        backend.clear_all();
        assert_eq!(backend.metric_count(), 0);
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let backend = Arc::new(InMemoryBackend::new());
        let id = MetricId::new("assets", "loads");
        backend.put_metric(Metric::counter(id.clone(), "Loads")).unwrap();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let backend = backend.clone();
                let id = id.clone();
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        backend.increment_counter(&id, 1).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(backend.get_metric(&id).unwrap().value.as_counter(), Some(8_000));
    }
}
