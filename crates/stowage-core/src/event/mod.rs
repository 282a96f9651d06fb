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

//! Lifecycle notifications emitted by the asset service.

mod bus;

pub use bus::EventBus;

use crate::asset::{AssetKey, AssetValue};
use crate::error::AssetError;

/// A lifecycle event of a single asset load.
#[derive(Debug, Clone)]
pub enum AssetEvent {
    /// The loading strategy reported progress, in `[0.0, 1.0]`. Zero or more per load.
    LoadProgress {
        /// The key being loaded.
        key: AssetKey,
        /// Fraction complete.
        progress: f32,
    },
    /// A load completed and the asset is now cached. Exactly once per successful fetch.
    AssetLoaded {
        /// The key that was loaded.
        key: AssetKey,
        /// The loaded asset.
        asset: AssetValue,
    },
    /// A load failed. Exactly once per failed fetch.
    LoadFailed {
        /// The key that failed.
        key: AssetKey,
        /// Why it failed.
        error: AssetError,
    },
}

impl AssetEvent {
    /// The key this event is about.
    pub fn key(&self) -> &AssetKey {
        match self {
            AssetEvent::LoadProgress { key, .. }
            | AssetEvent::AssetLoaded { key, .. }
            | AssetEvent::LoadFailed { key, .. } => key,
        }
    }
}
