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

mod common;

use async_trait::async_trait;
use common::{service, service_with, settle, wait_until, Probe};
use parking_lot::Mutex;
use std::sync::Arc;
use stowage_core::{
    AssetAnalytics, AssetError, AssetEvent, AssetKey, AssetValue, AssetsConfig, LoadingStrategy,
    ProgressSink,
};
use stowage_io::AssetService;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

fn limited(max_concurrent_loads: usize) -> AssetsConfig {
    AssetsConfig {
        max_concurrent_loads,
        ..AssetsConfig::default()
    }
}

#[tokio::test]
async fn test_second_load_is_served_from_cache() {
    let probe = Probe::open();
    let service = service(&probe);
    let cancel = CancellationToken::new();

    let first = service.load_asset::<String>("hero.png", &cancel).await.unwrap();
    let second = service.load_asset::<String>("hero.png", &cancel).await.unwrap();

    assert_eq!(*first, "asset:hero.png");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(probe.fetches_of("hero.png"), 1);

    let metrics = service.analytics().snapshot();
    assert_eq!(metrics.total_loads, 1);
    assert_eq!(metrics.cache_hit_rate, 0.5);
    assert!(metrics.load_times_by_key.contains_key("hero.png"));
}

#[tokio::test]
async fn test_empty_key_is_rejected() {
    let probe = Probe::open();
    let service = service(&probe);

    let result = service
        .load_asset::<String>("", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(AssetError::InvalidArgument(_))));
    assert_eq!(probe.total_fetches(), 0);
    assert!(service.try_get_cached::<String>("").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_loads_share_one_fetch() {
    let probe = Probe::gated();
    let service = service(&probe);

    let spawn_load = |service: AssetService| {
        tokio::spawn(async move {
            service
                .load_asset::<String>("shared", &CancellationToken::new())
                .await
        })
    };
    let a = spawn_load(service.clone());
    let b = spawn_load(service.clone());

    wait_until("the first fetch", || probe.fetches_of("shared") == 1).await;
    settle().await;
    probe.admit(1);

    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(probe.fetches_of("shared"), 1);
    wait_until("deregistration", || service.in_flight_count() == 0).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_limit_defers_third_load() {
    let probe = Probe::gated();
    let service = service_with(limited(2), &probe);

    let loads: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|key| {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .load_asset::<String>(key, &CancellationToken::new())
                    .await
            })
        })
        .collect();

    wait_until("two fetches", || probe.total_fetches() == 2).await;
    settle().await;
    assert_eq!(probe.total_fetches(), 2, "the third load must wait for a slot");

    probe.admit(1);
    wait_until("the third fetch", || probe.total_fetches() == 3).await;
    probe.admit(2);

    for load in loads {
        load.await.unwrap().unwrap();
    }
    assert!(probe.peak_concurrency() <= 2);
}

#[tokio::test]
async fn test_failure_is_not_cached() {
    let probe = Probe::open();
    let service = service(&probe);
    let cancel = CancellationToken::new();
    probe.fail_next("flaky");

    let error = service
        .load_asset::<String>("flaky", &cancel)
        .await
        .unwrap_err();
    match &error {
        AssetError::LoadFailed { key, source } => {
            assert_eq!(key, "flaky");
            assert!(source.to_string().contains("corrupt"));
        }
        other => panic!("expected LoadFailed, got {other:?}"),
    }
    assert!(service.try_get_cached::<String>("flaky").is_none());
    assert_eq!(service.in_flight_count(), 0);

    let retried = service.load_asset::<String>("flaky", &cancel).await.unwrap();
    assert_eq!(*retried, "asset:flaky");
    assert_eq!(probe.fetches_of("flaky"), 2);
    assert_eq!(service.analytics().snapshot().failed_loads, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_joined_callers_share_a_failure() {
    let probe = Probe::gated();
    let service = service(&probe);
    probe.fail_next("broken");

    let spawn_load = |service: AssetService| {
        tokio::spawn(async move {
            service
                .load_asset::<String>("broken", &CancellationToken::new())
                .await
        })
    };
    let a = spawn_load(service.clone());
    let b = spawn_load(service.clone());
    wait_until("the fetch", || probe.fetches_of("broken") == 1).await;
    settle().await;
    probe.admit(1);

    assert!(matches!(a.await.unwrap(), Err(AssetError::LoadFailed { .. })));
    assert!(matches!(b.await.unwrap(), Err(AssetError::LoadFailed { .. })));
    assert_eq!(probe.fetches_of("broken"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancelling_one_waiter_leaves_the_shared_fetch_running() {
    let probe = Probe::gated();
    let service = service(&probe);
    let impatient = CancellationToken::new();

    let a = {
        let service = service.clone();
        let cancel = impatient.clone();
        tokio::spawn(async move { service.load_asset::<String>("k", &cancel).await })
    };
    let b = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .load_asset::<String>("k", &CancellationToken::new())
                .await
        })
    };
    wait_until("the fetch", || probe.fetches_of("k") == 1).await;
    settle().await;

    impatient.cancel();
    let a = a.await.unwrap();
    assert!(matches!(a, Err(AssetError::Cancelled { ref key }) if key == "k"));

    probe.admit(1);
    assert_eq!(*b.await.unwrap().unwrap(), "asset:k");
    assert_eq!(probe.fetches_of("k"), 1);
    assert!(service.try_get_cached::<String>("k").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_owner_cancellation_still_caches_the_result() {
    let probe = Probe::gated();
    let service = service(&probe);
    let cancel = CancellationToken::new();

    let owner = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.load_asset::<String>("bg", &cancel).await })
    };
    wait_until("the fetch", || probe.fetches_of("bg") == 1).await;
    cancel.cancel();
    assert!(owner.await.unwrap().unwrap_err().is_cancelled());

    probe.admit(1);
    wait_until("the cached result", || {
        service.try_get_cached::<String>("bg").is_some()
    })
    .await;
    assert_eq!(probe.fetches_of("bg"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_while_waiting_for_a_slot() {
    let probe = Probe::gated();
    let service = service_with(limited(1), &probe);

    let first = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .load_asset::<String>("a", &CancellationToken::new())
                .await
        })
    };
    wait_until("the first fetch", || probe.fetches_of("a") == 1).await;

    let cancel = CancellationToken::new();
    let waiting = {
        let service = service.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { service.load_asset::<String>("b", &cancel).await })
    };
    settle().await;
    cancel.cancel();

    assert!(waiting.await.unwrap().unwrap_err().is_cancelled());
    assert_eq!(probe.fetches_of("b"), 0);

    probe.admit(1);
    first.await.unwrap().unwrap();
    // The cancelled waiter did not keep a slot.
    probe.admit(1);
    service
        .load_asset::<String>("c", &CancellationToken::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_wrong_type_is_a_type_mismatch() {
    let probe = Probe::open();
    let service = service(&probe);
    let cancel = CancellationToken::new();

    let result = service.load_asset::<Vec<u8>>("text", &cancel).await;
    assert!(matches!(
        result,
        Err(AssetError::TypeMismatch { ref key, .. }) if key == "text"
    ));

    assert!(service.try_get_cached::<String>("text").is_some());
    assert!(service.try_get_cached::<Vec<u8>>("text").is_none());

    let bytes = service.load_asset::<Vec<u8>>("bytes/blob", &cancel).await.unwrap();
    assert_eq!(bytes.as_slice(), b"bytes/blob");
}

#[tokio::test]
async fn test_events_are_published_per_load() {
    let probe = Probe::open();
    let service = service(&probe);
    let events = service.subscribe();
    let cancel = CancellationToken::new();

    service.load_asset::<String>("a", &cancel).await.unwrap();
    probe.fail_next("b");
    let _ = service.load_asset::<String>("b", &cancel).await;
    // A hit publishes nothing.
    service.load_asset::<String>("a", &cancel).await.unwrap();

    let received: Vec<AssetEvent> = events.try_iter().collect();
    let progress: Vec<f32> = received
        .iter()
        .filter_map(|event| match event {
            AssetEvent::LoadProgress { key, progress } if key.as_str() == "a" => Some(*progress),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![0.0, 0.5, 1.0]);

    let loaded: Vec<&str> = received
        .iter()
        .filter_map(|event| match event {
            AssetEvent::AssetLoaded { key, asset } => {
                assert!(asset.is::<String>());
                Some(key.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(loaded, vec!["a"]);

    let failed: Vec<&str> = received
        .iter()
        .filter_map(|event| match event {
            AssetEvent::LoadFailed { key, error } => {
                assert!(matches!(error, AssetError::LoadFailed { .. }));
                Some(key.as_str())
            }
            _ => None,
        })
        .collect();
    assert_eq!(failed, vec!["b"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_dispose_stops_everything() {
    let probe = Probe::gated();
    let service = service_with(limited(1), &probe);

    let running = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .load_asset::<String>("a", &CancellationToken::new())
                .await
        })
    };
    wait_until("the fetch", || probe.fetches_of("a") == 1).await;
    let queued = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .load_asset::<String>("b", &CancellationToken::new())
                .await
        })
    };
    settle().await;

    service.dispose();
    service.dispose();

    assert!(running.await.unwrap().unwrap_err().is_cancelled());
    assert!(matches!(queued.await.unwrap(), Err(AssetError::Disposed(_))));
    assert!(service.is_disposed());
    assert_eq!(service.in_flight_count(), 0);
    assert!(matches!(
        service
            .load_asset::<String>("c", &CancellationToken::new())
            .await,
        Err(AssetError::Disposed(_))
    ));
    assert!(service.try_get_cached::<String>("a").is_none());
}

/// Finishes every fetch once admitted, whether or not it was cancelled.
struct StubbornStrategy {
    gate: Arc<Semaphore>,
    started: Arc<Semaphore>,
    released: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LoadingStrategy for StubbornStrategy {
    async fn fetch(
        &self,
        key: &AssetKey,
        _progress: ProgressSink,
        _cancel: CancellationToken,
    ) -> anyhow::Result<AssetValue> {
        self.started.add_permits(1);
        self.gate.acquire().await?.forget();
        Ok(AssetValue::new(format!("asset:{key}")))
    }

    fn release(&self, key: &AssetKey, _asset: &AssetValue) {
        self.released.lock().push(key.to_string());
    }
}

#[tokio::test]
async fn test_fetch_finishing_after_dispose_is_released() {
    let gate = Arc::new(Semaphore::new(0));
    let started = Arc::new(Semaphore::new(0));
    let released = Arc::new(Mutex::new(Vec::new()));
    let service = AssetService::new(
        AssetsConfig::default(),
        StubbornStrategy {
            gate: gate.clone(),
            started: started.clone(),
            released: released.clone(),
        },
    )
    .unwrap();
    let events = service.subscribe();

    let running = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .load_asset::<String>("a", &CancellationToken::new())
                .await
        })
    };
    started.acquire().await.unwrap().forget();

    service.dispose();
    gate.add_permits(1);

    assert!(matches!(running.await.unwrap(), Err(AssetError::Disposed(_))));
    assert_eq!(*released.lock(), vec!["a".to_string()]);
    assert!(service.try_get_cached::<String>("a").is_none());
    let failed: Vec<AssetEvent> = events.try_iter().collect();
    assert!(failed.iter().any(|event| matches!(
        event,
        AssetEvent::LoadFailed { key, error: AssetError::Disposed(_) } if key.as_str() == "a"
    )));
    assert_eq!(service.analytics().snapshot().failed_loads, 1);
}

#[tokio::test]
async fn test_disabled_analytics_record_nothing() {
    let probe = Probe::open();
    let service = service_with(
        AssetsConfig {
            enable_analytics: false,
            ..AssetsConfig::default()
        },
        &probe,
    );

    service
        .load_asset::<String>("a", &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(service.analytics().snapshot().total_loads, 0);
}

#[test]
fn test_builder_validates_its_input() {
    let missing_strategy = AssetService::builder(AssetsConfig::default()).build();
    assert!(matches!(missing_strategy, Err(AssetError::InvalidArgument(_))));

    let probe = Probe::open();
    let zero_slots = AssetService::builder(limited(0))
        .strategy(common::strategy(probe))
        .build();
    assert!(matches!(zero_slots, Err(AssetError::InvalidArgument(_))));
}

#[test]
fn test_builder_accepts_custom_parts() {
    let probe = Probe::open();
    let cache = Arc::new(stowage_data::LruAssetCache::new(7));
    let strategy: Arc<dyn LoadingStrategy> = Arc::new(common::strategy(probe));

    let service = AssetService::builder(AssetsConfig::default())
        .shared_strategy(strategy)
        .cache(cache)
        .analytics(Arc::new(stowage_core::NoopAnalytics))
        .build()
        .unwrap();

    assert_eq!(service.cache_statistics().max_size, 7);
    assert_eq!(service.config(), &AssetsConfig::default());
}
