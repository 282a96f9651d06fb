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

//! A probing loading strategy shared by the service tests.

#![allow(dead_code)]

use anyhow::bail;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use stowage_core::{AssetKey, AssetValue, AssetsConfig, LoadingStrategy, ProgressSink};
use stowage_io::{AssetService, LazyLoadStrategy};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Observes and steers every fetch made through [`strategy`].
///
/// Keys under `bytes/` load as `Vec<u8>`, every other key as a `String`
/// equal to `"asset:<key>"`.
#[derive(Default)]
pub struct Probe {
    fetches: Mutex<HashMap<String, usize>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    released: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl Probe {
    /// Fetches complete immediately.
    pub fn open() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every fetch waits for a permit released through [`Probe::admit`].
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        })
    }

    /// Lets `n` gated fetches finish.
    pub fn admit(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Makes the next fetch of `key` fail.
    pub fn fail_next(&self, key: &str) {
        self.failing.lock().insert(key.to_string());
    }

    pub fn fetches_of(&self, key: &str) -> usize {
        self.fetches.lock().get(key).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> Vec<String> {
        self.released.lock().clone()
    }
}

pub fn strategy(probe: Arc<Probe>) -> impl LoadingStrategy {
    let release_probe = probe.clone();
    LazyLoadStrategy::new(move |key: AssetKey, progress: ProgressSink, _cancel: CancellationToken| {
        let probe = probe.clone();
        async move {
            *probe.fetches.lock().entry(key.to_string()).or_default() += 1;
            let now = probe.active.fetch_add(1, Ordering::SeqCst) + 1;
            probe.peak.fetch_max(now, Ordering::SeqCst);
            progress(0.5);

            if let Some(gate) = &probe.gate {
                gate.acquire().await?.forget();
            }
            probe.active.fetch_sub(1, Ordering::SeqCst);

            if probe.failing.lock().remove(key.as_str()) {
                bail!("'{key}' is corrupt");
            }
            if key.as_str().starts_with("bytes/") {
                return Ok(AssetValue::new(key.as_str().as_bytes().to_vec()));
            }
            Ok::<_, anyhow::Error>(AssetValue::new(format!("asset:{key}")))
        }
    })
    .on_release(move |key, _asset| release_probe.released.lock().push(key.to_string()))
}

pub fn service_with(config: AssetsConfig, probe: &Arc<Probe>) -> AssetService {
    AssetService::new(config, strategy(probe.clone())).unwrap()
}

pub fn service(probe: &Arc<Probe>) -> AssetService {
    service_with(AssetsConfig::default(), probe)
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Gives spawned tasks a moment to reach their next await point.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(30)).await;
}
