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

use anyhow::anyhow;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use stowage_core::asset::{AssetKey, AssetValue};
use stowage_core::loading::{LoadingStrategy, ProgressSink};
use tokio_util::sync::CancellationToken;

type ReleaseHook = Arc<dyn Fn(&AssetKey, &AssetValue) + Send + Sync>;

/// Adapts an async closure into a [`LoadingStrategy`].
///
/// Reports progress `0.0` when a fetch starts and `1.0` when it succeeds, and
/// abandons the closure's future as soon as the cancellation token fires.
pub struct LazyLoadStrategy<F> {
    load: F,
    on_release: Option<ReleaseHook>,
}

impl<F, Fut> LazyLoadStrategy<F>
where
    F: Fn(AssetKey, ProgressSink, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<AssetValue>> + Send + 'static,
{
    /// Wraps `load`, which is called once per fetch.
    pub fn new(load: F) -> Self {
        Self {
            load,
            on_release: None,
        }
    }

    /// Runs `hook` whenever the service releases an asset this strategy loaded.
    pub fn on_release(
        mut self,
        hook: impl Fn(&AssetKey, &AssetValue) + Send + Sync + 'static,
    ) -> Self {
        self.on_release = Some(Arc::new(hook));
        self
    }
}

#[async_trait]
impl<F, Fut> LoadingStrategy for LazyLoadStrategy<F>
where
    F: Fn(AssetKey, ProgressSink, CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<AssetValue>> + Send + 'static,
{
    async fn fetch(
        &self,
        key: &AssetKey,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> anyhow::Result<AssetValue> {
        progress(0.0);
        let load = (self.load)(key.clone(), progress.clone(), cancel.clone());
        let value = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(anyhow!("load of '{key}' was cancelled")),
            value = load => value?,
        };
        progress(1.0);
        Ok(value)
    }

    fn release(&self, key: &AssetKey, asset: &AssetValue) {
        if let Some(hook) = &self.on_release {
            hook(key, asset);
        }
    }
}
