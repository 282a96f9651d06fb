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

//! Static configuration consumed when the asset service is built.
//!
//! Configuration is plain data: it is read once (usually from a RON file),
//! validated, and never mutated afterwards.
//!
//! ```
//! use stowage_core::AssetsConfig;
//!
//! let config = AssetsConfig::from_ron_str(
//!     "(max_concurrent_loads: 4, cache_size: 256, warmup_keys: [\"ui/atlas.png\"])",
//! )
//! .unwrap();
//! assert_eq!(config.max_concurrent_loads, 4);
//! assert_eq!(config.pool.max_size, 50);
//! ```

use crate::error::{AssetError, AssetResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The eviction policy used by the asset cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CachePolicy {
    /// Evict the least-recently-accessed entry.
    #[default]
    Lru,
}

/// Sizing of the handle pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of blank handles created per registered type on warmup.
    pub initial_size: usize,
    /// Upper bound on queued handles per asset type.
    pub max_size: usize,
    /// Whether `warmup` pre-populates the pool at all.
    pub warmup_on_start: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 10,
            max_size: 50,
            warmup_on_start: true,
        }
    }
}

/// Configuration of the asset service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    /// Maximum number of loads allowed to hold a concurrency slot at once.
    pub max_concurrent_loads: usize,
    /// Maximum number of entries resident in the cache.
    pub cache_size: usize,
    /// Eviction policy of the default cache.
    pub default_cache_policy: CachePolicy,
    /// Handle pool sizing.
    pub pool: PoolConfig,
    /// Keys loaded by `warmup`.
    pub warmup_keys: Vec<String>,
    /// When false, the service records nothing.
    pub enable_analytics: bool,
    /// When true, every completed fetch logs its duration at info level.
    pub log_performance_metrics: bool,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: 3,
            cache_size: 100,
            default_cache_policy: CachePolicy::Lru,
            pool: PoolConfig::default(),
            warmup_keys: Vec::new(),
            enable_analytics: true,
            log_performance_metrics: false,
        }
    }
}

impl AssetsConfig {
    /// Parses a configuration from RON text and validates it.
    ///
    /// # Errors
    /// Returns [`AssetError::Config`] if the text is not valid RON for this type,
    /// or [`AssetError::InvalidArgument`] if a value is out of range.
    pub fn from_ron_str(text: &str) -> AssetResult<Self> {
        let config: Self = ron::from_str(text).map_err(|e| AssetError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a RON configuration file.
    pub fn load(path: impl AsRef<Path>) -> AssetResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AssetError::Config(format!("cannot read {}: {e}", path.display())))?;
        log::debug!("AssetsConfig: loaded configuration from {}", path.display());
        Self::from_ron_str(&text)
    }

    /// Serializes the configuration to pretty-printed RON.
    pub fn to_ron_string(&self) -> AssetResult<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| AssetError::Config(e.to_string()))
    }

    /// Checks that every value is usable.
    pub fn validate(&self) -> AssetResult<()> {
        if self.max_concurrent_loads == 0 {
            return Err(AssetError::InvalidArgument(
                "max_concurrent_loads must be at least 1".to_string(),
            ));
        }
        if self.cache_size == 0 {
            return Err(AssetError::InvalidArgument(
                "cache_size must be at least 1".to_string(),
            ));
        }
        if let Some(position) = self.warmup_keys.iter().position(String::is_empty) {
            return Err(AssetError::InvalidArgument(format!(
                "warmup_keys[{position}] is empty"
            )));
        }
        Ok(())
    }
}
