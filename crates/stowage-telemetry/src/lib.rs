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

//! # Stowage Telemetry
//!
//! The default metrics sink of the asset service, the in-memory metrics
//! registry it is built on, RAII load timers, and logger setup.

#![warn(missing_docs)]

pub mod analytics;
pub mod logging;
pub mod metrics;
pub mod storage;
pub mod utils;

pub use analytics::AssetMetrics;
pub use logging::init_logging;
pub use metrics::registry::{CounterHandle, HistogramHandle, MetricsRegistry};
pub use storage::{backend::MetricsBackend, memory_backend::InMemoryBackend};
pub use utils::timer::ScopedLoadTimer;
