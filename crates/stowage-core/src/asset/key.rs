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

use crate::error::{AssetError, AssetResult};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// The unique string identifier of a loadable asset.
///
/// A key is never empty. Cloning is cheap: the text is shared behind an `Arc`,
/// which matters because a key is copied into the cache, the in-flight table,
/// every emitted event, and every handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetKey(Arc<str>);

impl AssetKey {
    /// Validates `key` and wraps it.
    ///
    /// # Errors
    /// Returns [`AssetError::InvalidArgument`] if `key` is empty.
    pub fn new(key: impl AsRef<str>) -> AssetResult<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(AssetError::InvalidArgument(
                "asset key must not be empty".to_string(),
            ));
        }
        Ok(Self(Arc::from(key)))
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for AssetKey {
    type Error = AssetError;

    fn try_from(value: String) -> AssetResult<Self> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AssetKey {
    type Error = AssetError;

    fn try_from(value: &str) -> AssetResult<Self> {
        Self::new(value)
    }
}

impl From<AssetKey> for String {
    fn from(key: AssetKey) -> Self {
        key.0.to_string()
    }
}

impl AsRef<str> for AssetKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for AssetKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
