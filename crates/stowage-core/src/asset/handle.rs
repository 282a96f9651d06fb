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

use super::{Asset, AssetKey, AssetValue};
use crate::error::{AssetError, AssetResult};
use parking_lot::Mutex;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, Weak};

/// The narrow callback a handle uses to notify its owning service on disposal.
///
/// Handles only ever hold a [`Weak`] reference to their releaser, so a handle
/// that outlives its service simply has nobody to notify.
pub trait HandleReleaser: Send + Sync {
    /// Called when a non-pooled handle bound to `key` has been disposed.
    ///
    /// `identity` is the [`AssetValue::identity`] of the instance the handle
    /// held, so a key reloaded since the handle was bound is not released.
    fn release_key(&self, key: &AssetKey, identity: usize);

    /// Called when a pool-managed handle has been disposed and can be reused.
    fn recycle(&self, handle: Arc<dyn Recyclable>);
}

/// A type-erased view of a pool-managed handle.
pub trait Recyclable: Send + Sync + 'static {
    /// Returns the handle to a blank, unbound state, ready for reinitialization.
    fn reset(&self);

    /// The [`TypeId`] of the asset type this handle carries.
    fn asset_type(&self) -> TypeId;

    /// Converts the handle back into an `Any` so the pool can recover its concrete type.
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

struct Binding<A: Asset> {
    asset: Option<Arc<A>>,
    key: Option<AssetKey>,
    releaser: Option<Weak<dyn HandleReleaser>>,
    ref_count: usize,
    disposed: bool,
}

impl<A: Asset> Binding<A> {
    fn blank() -> Self {
        Self {
            asset: None,
            key: None,
            releaser: None,
            ref_count: 0,
            disposed: true,
        }
    }
}

/// A thread-safe, reference-counted handle to a loaded asset.
///
/// A handle binds one asset, its key, and a weak link to the service that
/// produced it. It starts with a reference count of 1; [`add_ref`](Self::add_ref)
/// and [`release`](Self::release) move that count, and the release that brings
/// it to zero disposes the handle. Disposal is terminal for the current
/// binding: the handle becomes invalid, drops its asset reference, and tells
/// the service, which either recycles the handle (pool-managed handles) or
/// releases the cache entry for its key.
///
/// Handles are always shared as `Arc<AssetHandle<A>>` so that a pool-managed
/// handle can hand itself back to the pool on disposal.
pub struct AssetHandle<A: Asset> {
    binding: Mutex<Binding<A>>,
    pooled: bool,
}

impl<A: Asset> AssetHandle<A> {
    /// Creates a handle bound to `asset` under `key`, with a reference count of 1.
    ///
    /// This is typically called by the asset service once an asset has been
    /// successfully loaded.
    pub fn new(asset: Arc<A>, key: AssetKey, releaser: Weak<dyn HandleReleaser>) -> Arc<Self> {
        let handle = Self::with_binding(Binding::blank(), false);
        handle.bind(asset, key, releaser);
        Arc::new(handle)
    }

    /// Creates an unbound, pool-managed handle. It is invalid until
    /// [`initialize`](Self::initialize) binds it to an asset.
    pub fn pooled() -> Arc<Self> {
        Arc::new(Self::with_binding(Binding::blank(), true))
    }

    fn with_binding(binding: Binding<A>, pooled: bool) -> Self {
        Self {
            binding: Mutex::new(binding),
            pooled,
        }
    }

    fn bind(&self, asset: Arc<A>, key: AssetKey, releaser: Weak<dyn HandleReleaser>) {
        let mut binding = self.binding.lock();
        binding.asset = Some(asset);
        binding.key = Some(key);
        binding.releaser = Some(releaser);
        binding.ref_count = 1;
        binding.disposed = false;
    }

    /// Rebinds a pooled handle taken from the pool to a new asset.
    ///
    /// # Errors
    /// Returns [`AssetError::InvalidArgument`] if the handle is still bound to
    /// another asset or is not pool-managed.
    pub fn initialize(
        &self,
        asset: Arc<A>,
        key: AssetKey,
        releaser: Weak<dyn HandleReleaser>,
    ) -> AssetResult<()> {
        if !self.pooled {
            return Err(AssetError::InvalidArgument(
                "only pooled handles can be reinitialized".to_string(),
            ));
        }
        if !self.binding.lock().disposed {
            return Err(AssetError::InvalidArgument(format!(
                "handle is still bound to '{}'",
                self.key().map(|k| k.to_string()).unwrap_or_default()
            )));
        }
        self.bind(asset, key, releaser);
        Ok(())
    }

    /// Returns the bound asset, or `None` once the handle has been disposed.
    pub fn asset(&self) -> Option<Arc<A>> {
        self.binding.lock().asset.clone()
    }

    /// Returns the key the handle is bound to, or `None` if it is unbound.
    pub fn key(&self) -> Option<AssetKey> {
        self.binding.lock().key.clone()
    }

    /// `true` while the handle has not been disposed and still holds its asset.
    pub fn is_valid(&self) -> bool {
        let binding = self.binding.lock();
        !binding.disposed && binding.asset.is_some()
    }

    /// The current reference count.
    pub fn ref_count(&self) -> usize {
        self.binding.lock().ref_count
    }

    /// `true` if this handle returns to a pool when disposed.
    pub fn is_pooled(&self) -> bool {
        self.pooled
    }

    /// Increments the reference count.
    ///
    /// # Errors
    /// Returns [`AssetError::Disposed`] if the handle has already been disposed.
    pub fn add_ref(&self) -> AssetResult<()> {
        let mut binding = self.binding.lock();
        if binding.disposed {
            return Err(AssetError::Disposed("asset handle"));
        }
        binding.ref_count += 1;
        Ok(())
    }

    /// Decrements the reference count, disposing the handle when it reaches zero.
    ///
    /// Has no effect on a disposed handle.
    pub fn release(self: &Arc<Self>) {
        let reached_zero = {
            let mut binding = self.binding.lock();
            if binding.disposed {
                return;
            }
            binding.ref_count = binding.ref_count.saturating_sub(1);
            binding.ref_count == 0
        };
        if reached_zero {
            self.dispose();
        }
    }

    /// Disposes the handle regardless of its reference count.
    ///
    /// Idempotent: only the first call notifies the service.
    pub fn dispose(self: &Arc<Self>) {
        // The asset stays alive until the service has been notified, so its
        // identity cannot be reused by another allocation in between.
        let (asset, key, releaser) = {
            let mut binding = self.binding.lock();
            if binding.disposed {
                return;
            }
            binding.disposed = true;
            binding.ref_count = 0;
            (
                binding.asset.take(),
                binding.key.clone(),
                binding.releaser.take(),
            )
        };

        let Some(releaser) = releaser.and_then(|weak| weak.upgrade()) else {
            log::trace!("AssetHandle: disposed with no live service to notify.");
            return;
        };

        if self.pooled {
            releaser.recycle(self.clone());
        } else if let (Some(key), Some(asset)) = (key, &asset) {
            releaser.release_key(&key, AssetValue::identity_of(asset));
        }
    }
}

impl<A: Asset> Recyclable for AssetHandle<A> {
    fn reset(&self) {
        *self.binding.lock() = Binding::blank();
    }

    fn asset_type(&self) -> TypeId {
        TypeId::of::<A>()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<A: Asset> fmt::Debug for AssetHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let binding = self.binding.lock();
        f.debug_struct("AssetHandle")
            .field("asset_type", &std::any::type_name::<A>())
            .field("key", &binding.key)
            .field("ref_count", &binding.ref_count)
            .field("disposed", &binding.disposed)
            .field("pooled", &self.pooled)
            .finish()
    }
}
