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

//! Abstract definitions for metrics.

use std::fmt::{self, Display};
use std::time::Instant;
use thiserror::Error;

/// A unique identifier for a metric, made of a namespace and a name
/// (e.g. `assets:cache_hits`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricId {
    /// The broad category of the metric (e.g. "assets").
    pub namespace: String,
    /// The specific name of the metric (e.g. "load_time").
    pub name: String,
}

impl MetricId {
    /// Creates a new `MetricId` with a namespace and a name.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

/// The fundamental type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    /// A value that only ever increases or resets to zero.
    Counter,
    /// A distribution of measurements over fixed buckets.
    Histogram,
}

/// The current value of a metric.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValue {
    /// A monotonically increasing count.
    Counter(u64),
    /// Bucketed observations.
    Histogram {
        /// Inclusive upper bounds of the buckets, ascending.
        bucket_bounds: Vec<f64>,
        /// Number of observations `<=` each bound (cumulative).
        bucket_counts: Vec<u64>,
        /// Total number of observations.
        count: u64,
        /// Sum of all observations.
        sum: f64,
    },
}

impl MetricValue {
    /// Returns the [`MetricType`] corresponding to this value.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricValue::Counter(_) => MetricType::Counter,
            MetricValue::Histogram { .. } => MetricType::Histogram,
        }
    }

    /// Returns the value as a `u64` if it is a `Counter`.
    pub fn as_counter(&self) -> Option<u64> {
        match self {
            MetricValue::Counter(v) => Some(*v),
            MetricValue::Histogram { .. } => None,
        }
    }

    /// Mean of the observations if this is a non-empty `Histogram`.
    pub fn histogram_mean(&self) -> Option<f64> {
        match self {
            MetricValue::Histogram { count, sum, .. } if *count > 0 => Some(sum / *count as f64),
            _ => None,
        }
    }
}

/// A metric together with its descriptive metadata.
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric's unique identifier.
    pub id: MetricId,
    /// A human-readable description of what the metric measures.
    pub description: String,
    /// The unit of measurement (e.g. "ms", "count").
    pub unit: String,
    /// The current value.
    pub value: MetricValue,
    /// When the value last changed.
    pub last_updated: Instant,
}

impl Metric {
    /// Creates a counter starting at zero.
    pub fn counter(id: MetricId, description: impl Into<String>) -> Self {
        Self::with_value(id, description, "count", MetricValue::Counter(0))
    }

    /// Creates an empty histogram.
    ///
    /// # Errors
    /// Returns [`MetricsError::InvalidOperation`] if `bucket_bounds` is empty or
    /// not strictly ascending.
    pub fn histogram(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        bucket_bounds: Vec<f64>,
    ) -> MetricsResult<Self> {
        if bucket_bounds.is_empty() || bucket_bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(MetricsError::InvalidOperation(format!(
                "histogram {id} needs strictly ascending, non-empty bucket bounds"
            )));
        }
        let bucket_counts = vec![0; bucket_bounds.len()];
        Ok(Self::with_value(
            id,
            description,
            unit,
            MetricValue::Histogram {
                bucket_bounds,
                bucket_counts,
                count: 0,
                sum: 0.0,
            },
        ))
    }

    fn with_value(
        id: MetricId,
        description: impl Into<String>,
        unit: impl Into<String>,
        value: MetricValue,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            unit: unit.into(),
            value,
            last_updated: Instant::now(),
        }
    }

    /// Marks the metric as updated now.
    pub fn touch(&mut self) {
        self.last_updated = Instant::now();
    }
}

/// A specialized `Result` type for metric-related operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// An error that can occur within the metrics system.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    /// The requested metric was not found.
    #[error("metric not found: {0}")]
    MetricNotFound(MetricId),
    /// An operation was attempted on a metric of the wrong type.
    #[error("type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch {
        /// The type the operation needs.
        expected: MetricType,
        /// The type that was found.
        found: MetricType,
    },
    /// An invalid operation was attempted (e.g. invalid histogram bounds).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_id_display() {
        assert_eq!(MetricId::new("assets", "cache_hits").to_string(), "assets:cache_hits");
    }

    #[test]
    fn test_counter_starts_at_zero() {
        let metric = Metric::counter(MetricId::new("assets", "loads"), "Loads");
        assert_eq!(metric.value.as_counter(), Some(0));
        assert_eq!(metric.value.metric_type(), MetricType::Counter);
        assert_eq!(metric.unit, "count");
    }

    #[test]
    fn test_histogram_requires_ascending_bounds() {
        let id = MetricId::new("assets", "load_time");
        assert!(Metric::histogram(id.clone(), "Load time", "ms", vec![]).is_err());
        assert!(Metric::histogram(id.clone(), "Load time", "ms", vec![5.0, 1.0]).is_err());
        assert!(Metric::histogram(id, "Load time", "ms", vec![1.0, 5.0]).is_ok());
    }

    #[test]
    fn test_histogram_mean() {
        let value = MetricValue::Histogram {
            bucket_bounds: vec![10.0],
            bucket_counts: vec![2],
            count: 2,
            sum: 6.0,
        };
        assert_eq!(value.histogram_mean(), Some(3.0));
        assert_eq!(MetricValue::Counter(1).histogram_mean(), None);
    }
}
