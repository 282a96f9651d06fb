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

//! The error taxonomy of the asset system.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// A specialized `Result` type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// An error raised by the asset cache, the handle pool, or the asset service.
///
/// The type is `Clone` so that a single failure of a shared, in-flight load can
/// be delivered to every caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum AssetError {
    /// An argument was rejected before any work was done (e.g. an empty key).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The loading strategy failed to produce the asset.
    #[error("failed to load asset '{key}': {source}")]
    LoadFailed {
        /// The key that was being loaded.
        key: String,
        /// The root cause reported by the loading strategy.
        #[source]
        source: Arc<dyn StdError + Send + Sync + 'static>,
    },

    /// The caller's wait, or the service itself, was cancelled.
    #[error("load of asset '{key}' was cancelled")]
    Cancelled {
        /// The key whose load was abandoned.
        key: String,
    },

    /// An operation was attempted on a handle or service after disposal.
    #[error("{0} has been disposed")]
    Disposed(&'static str),

    /// A loaded asset is not of the type the caller asked for.
    #[error("asset '{key}' is not a `{expected}`")]
    TypeMismatch {
        /// The key of the loaded asset.
        key: String,
        /// The type name the caller requested.
        expected: &'static str,
    },

    /// The configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AssetError {
    /// Wraps the root cause of a failed fetch.
    pub fn load_failed(key: impl Into<String>, cause: anyhow::Error) -> Self {
        let boxed: Box<dyn StdError + Send + Sync + 'static> = cause.into();
        Self::LoadFailed {
            key: key.into(),
            source: Arc::from(boxed),
        }
    }

    /// Creates a cancellation error for `key`.
    pub fn cancelled(key: impl Into<String>) -> Self {
        Self::Cancelled { key: key.into() }
    }

    /// Returns `true` if this error reports a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
