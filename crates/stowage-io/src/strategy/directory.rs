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

//! Loads assets from files below a root directory.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::path::{Component, Path, PathBuf};
use stowage_core::asset::{Asset, AssetKey, AssetValue};
use stowage_core::loading::{LoadingStrategy, ProgressSink};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

/// Default number of bytes read between progress reports.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Turns the raw bytes of a file into an asset of type `A`.
///
/// Any `Fn(&[u8]) -> anyhow::Result<A>` closure is a decoder.
pub trait AssetDecoder<A: Asset>: Send + Sync + 'static {
    /// Parses `bytes` into an asset.
    fn decode(&self, bytes: &[u8]) -> Result<A>;
}

impl<A, F> AssetDecoder<A> for F
where
    A: Asset,
    F: Fn(&[u8]) -> Result<A> + Send + Sync + 'static,
{
    fn decode(&self, bytes: &[u8]) -> Result<A> {
        self(bytes)
    }
}

/// Internal trait for decoding any asset type.
trait AnyDecoder: Send + Sync {
    fn decode_value(&self, bytes: &[u8]) -> Result<AssetValue>;
    fn asset_type(&self) -> &'static str;
}

struct DecoderWrapper<A, D>(D, PhantomData<fn() -> A>);

impl<A: Asset, D: AssetDecoder<A>> AnyDecoder for DecoderWrapper<A, D> {
    fn decode_value(&self, bytes: &[u8]) -> Result<AssetValue> {
        Ok(AssetValue::new(self.0.decode(bytes)?))
    }

    fn asset_type(&self) -> &'static str {
        std::any::type_name::<A>()
    }
}

/// Resolves each key as a relative path below `root` and decodes the file
/// with the decoder registered for its extension.
///
/// Keys that are absolute or contain `..` are rejected. The file is read in
/// chunks; progress is `bytes_read / file_len` after each chunk, and the token
/// is checked before every read.
pub struct DirectoryLoadStrategy {
    root: PathBuf,
    chunk_size: usize,
    decoders: HashMap<String, Box<dyn AnyDecoder>>,
}

impl DirectoryLoadStrategy {
    /// Creates a strategy reading below `root`, with no decoders.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            decoders: HashMap::new(),
        }
    }

    /// Sets how many bytes are read between progress reports.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Registers `decoder` for files ending in `.extension` (case-insensitive),
    /// replacing any earlier decoder for it.
    pub fn register<A: Asset>(
        mut self,
        extension: &str,
        decoder: impl AssetDecoder<A>,
    ) -> Self {
        let extension = extension.trim_start_matches('.').to_ascii_lowercase();
        let wrapped = DecoderWrapper(decoder, PhantomData);
        if let Some(previous) = self.decoders.insert(extension.clone(), Box::new(wrapped)) {
            log::debug!(
                "DirectoryLoadStrategy: decoder for '.{extension}' ({}) replaced.",
                previous.asset_type()
            );
        }
        self
    }

    /// The directory keys are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &AssetKey) -> Result<PathBuf> {
        let relative = Path::new(key.as_str());
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => bail!("key '{key}' does not name a path below the asset root"),
            }
        }
        Ok(self.root.join(relative))
    }

    fn decoder_for(&self, path: &Path) -> Result<&dyn AnyDecoder> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| anyhow!("{} has no file extension", path.display()))?;
        self.decoders
            .get(&extension)
            .map(|decoder| &**decoder)
            .ok_or_else(|| anyhow!("no decoder registered for '.{extension}' files"))
    }
}

#[async_trait]
impl LoadingStrategy for DirectoryLoadStrategy {
    async fn fetch(
        &self,
        key: &AssetKey,
        progress: ProgressSink,
        cancel: CancellationToken,
    ) -> Result<AssetValue> {
        let path = self.resolve(key)?;
        let decoder = self.decoder_for(&path)?;

        let mut file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("failed to open {}", path.display()))?;
        let len = file
            .metadata()
            .await
            .with_context(|| format!("failed to stat {}", path.display()))?
            .len();

        let bytes = read_chunked(
            &mut file,
            len,
            self.chunk_size,
            &progress,
            &cancel,
        )
        .await
        .with_context(|| format!("failed to read '{key}' from {}", path.display()))?;

        decoder
            .decode_value(&bytes)
            .with_context(|| format!("failed to decode '{key}' as {}", decoder.asset_type()))
    }
}

/// Reads `reader` to the end in `chunk_size` pieces, reporting
/// `bytes_read / expected_len` after each piece and 1.0 once the end is reached.
///
/// The reported fraction never exceeds 1.0 and ends at 1.0 even if the source
/// turns out shorter or longer than `expected_len`.
async fn read_chunked<R: AsyncRead + Unpin>(
    reader: &mut R,
    expected_len: u64,
    chunk_size: usize,
    progress: &ProgressSink,
    cancel: &CancellationToken,
) -> Result<Vec<u8>> {
    progress(0.0);
    let mut bytes = Vec::with_capacity(expected_len as usize);
    let mut chunk = vec![0u8; chunk_size];
    loop {
        if cancel.is_cancelled() {
            bail!("read was cancelled");
        }
        let read = reader.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..read]);
        if (bytes.len() as u64) < expected_len {
            progress((bytes.len() as f64 / expected_len as f64) as f32);
        }
    }
    progress(1.0);
    Ok(bytes)
}
