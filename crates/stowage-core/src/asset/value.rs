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

use super::Asset;
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// An opaque, shared reference to a loaded asset, tagged with its runtime type.
///
/// This is what the loading strategy produces and what the cache stores. Typed
/// access goes through [`AssetValue::downcast`], which treats a type mismatch
/// as "not this asset" rather than an error.
///
/// Cloning an `AssetValue` is cheap and never duplicates the asset data: every
/// clone points at the same allocation, so [`AssetValue::identity`] is stable
/// across clones and across the typed `Arc<A>` obtained from it.
#[derive(Clone)]
pub struct AssetValue {
    type_id: TypeId,
    type_name: &'static str,
    data: Arc<dyn Any + Send + Sync>,
}

impl AssetValue {
    /// Wraps a freshly loaded asset.
    pub fn new<A: Asset>(asset: A) -> Self {
        Self::from_arc(Arc::new(asset))
    }

    /// Wraps an asset that is already shared.
    pub fn from_arc<A: Asset>(asset: Arc<A>) -> Self {
        Self {
            type_id: TypeId::of::<A>(),
            type_name: std::any::type_name::<A>(),
            data: asset,
        }
    }

    /// The runtime type identifier of the wrapped asset.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The type name of the wrapped asset, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the wrapped asset is an `A`.
    pub fn is<A: Asset>(&self) -> bool {
        self.type_id == TypeId::of::<A>()
    }

    /// Returns a typed, shared reference to the asset, or `None` if it is not an `A`.
    pub fn downcast<A: Asset>(&self) -> Option<Arc<A>> {
        self.data.clone().downcast::<A>().ok()
    }

    /// The identity of the underlying allocation.
    ///
    /// Two values have the same identity if and only if they share the same asset
    /// instance. This is what the cache's reverse lookup is keyed on.
    pub fn identity(&self) -> usize {
        Arc::as_ptr(&self.data) as *const () as usize
    }

    /// The identity an `Arc<A>` handed out by the service would have.
    pub fn identity_of<A: Asset>(asset: &Arc<A>) -> usize {
        Arc::as_ptr(asset) as *const () as usize
    }

    /// Returns `true` if both values share the same asset instance.
    pub fn ptr_eq(&self, other: &AssetValue) -> bool {
        self.identity() == other.identity()
    }
}

impl fmt::Debug for AssetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetValue")
            .field("type_name", &self.type_name)
            .field("identity", &format_args!("{:#x}", self.identity()))
            .finish()
    }
}
