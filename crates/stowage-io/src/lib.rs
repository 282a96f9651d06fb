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

//! # Stowage IO
//!
//! The asset service and the strategies that feed it.
//!
//! ```no_run
//! use stowage_core::{AssetValue, AssetsConfig};
//! use stowage_io::{AssetService, LazyLoadStrategy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let strategy = LazyLoadStrategy::new(|key, _progress, _cancel| async move {
//!     Ok(AssetValue::new(format!("contents of {key}")))
//! });
//! let service = AssetService::new(AssetsConfig::default(), strategy)?;
//!
//! let text = service
//!     .load_asset::<String>("readme.txt", &CancellationToken::new())
//!     .await?;
//! assert_eq!(*text, "contents of readme.txt");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod service;
pub mod strategy;

pub use service::{AssetService, AssetServiceBuilder, PreloadReport};
pub use strategy::{AssetDecoder, DirectoryLoadStrategy, LazyLoadStrategy};
