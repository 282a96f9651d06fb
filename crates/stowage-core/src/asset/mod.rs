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

//! Provides the foundational traits and primitive types for the asset system.
//!
//! This module defines the "common language" for all asset-related operations.
//! It contains the core contracts that the other crates implement or use, but
//! it has no knowledge of how assets are fetched, cached, or pooled.
//!
//! The key components are:
//! - The [`Asset`] trait: A marker for all types that can be treated as assets.
//! - [`AssetKey`]: the validated string identifier of a loadable asset.
//! - [`AssetValue`]: an opaque, type-tagged, shared reference to a loaded asset.
//! - [`AssetHandle`]: the reference-counted handle handed out to callers.

mod handle;
mod key;
mod value;

pub use handle::*;
pub use key::*;
pub use value::*;

/// A marker trait for types that can be managed by the asset system.
///
/// The supertraits enforce critical safety guarantees:
/// - `Send` + `Sync`: The asset type can be safely shared and sent between threads.
///   This is essential for background loading.
/// - `'static`: The asset type does not contain any non-static references, ensuring
///   it can be stored for the lifetime of the application.
///
/// # Examples
///
/// ```
/// use stowage_core::asset::Asset;
///
/// // A simple struct representing a texture.
/// struct Texture {
///     // ... fields
/// }
///
/// // By implementing Asset, `Texture` can now be used by the asset system.
/// impl Asset for Texture {}
/// ```
pub trait Asset: Send + Sync + 'static {}

impl Asset for String {}
impl Asset for Vec<u8> {}
