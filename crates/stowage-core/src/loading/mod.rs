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

//! The contract between the asset service and whatever actually fetches assets.

use crate::asset::{AssetKey, AssetValue};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A callback receiving load progress in `[0.0, 1.0]`.
pub type ProgressSink = Arc<dyn Fn(f32) + Send + Sync>;

/// A pluggable strategy that turns a key into a loaded asset.
///
/// The asset service treats implementations as a black box and guarantees it
/// calls [`fetch`](LoadingStrategy::fetch) at most once at a time per key.
/// Implementations are expected to:
/// - report monotonically non-decreasing progress in `[0.0, 1.0]`,
/// - stop promptly and return an error once `cancel` fires,
/// - return an error carrying the root cause on failure.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use stowage_core::{AssetKey, AssetValue, LoadingStrategy, ProgressSink};
/// use tokio_util::sync::CancellationToken;
///
/// struct Echo;
///
/// #[async_trait]
/// impl LoadingStrategy for Echo {
///     async fn fetch(
///         &self,
///         key: &AssetKey,
///         progress: ProgressSink,
///         _cancel: CancellationToken,
///     ) -> anyhow::Result<AssetValue> {
///         progress(1.0);
///         Ok(AssetValue::new(key.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait LoadingStrategy: Send + Sync + 'static {
    /// Asynchronously produces the asset identified by `key`.
    async fn fetch(
        &self,
        key: &AssetKey,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> anyhow::Result<AssetValue>;

    /// Releases whatever backing resource the strategy keeps for a loaded asset.
    ///
    /// Called by the service when a key is released or the cache is force-cleared.
    fn release(&self, key: &AssetKey, asset: &AssetValue) {
        let _ = (key, asset);
    }
}

/// A progress sink that discards every report.
pub fn ignore_progress() -> ProgressSink {
    Arc::new(|_| {})
}
