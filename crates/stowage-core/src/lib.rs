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

//! # Stowage Core
//!
//! Foundational crate containing the traits, core types, and interface contracts
//! shared by the asset cache, the handle pool, and the asset service.

#![warn(missing_docs)]

pub mod asset;
pub mod config;
pub mod error;
pub mod event;
pub mod loading;
pub mod telemetry;
pub mod utils;

pub use asset::{Asset, AssetHandle, AssetKey, AssetValue, HandleReleaser, Recyclable};
pub use config::{AssetsConfig, CachePolicy, PoolConfig};
pub use error::{AssetError, AssetResult};
pub use event::{AssetEvent, EventBus};
pub use loading::{LoadingStrategy, ProgressSink};
pub use telemetry::{AssetAnalytics, AssetMetricsData, NoopAnalytics};
pub use utils::timer::Stopwatch;
