//! Content Store: addressable byte storage behind every object version and
//! multipart part.
//!
//! The engine never keeps object bytes itself. It streams request bodies into
//! a [`ContentStore`], receives an opaque [`ContentRef`] plus the digests
//! computed on the way, and records that reference in a version or part.
//! References are released when the owning version is purged or displaced,
//! or when the owning part is replaced or its upload ends.
//!
//! [`InMemoryStorage`] is the bundled implementation. Blobs at or below a
//! configurable threshold are kept in memory as [`Bytes`]; larger ones are
//! spilled to temporary files while they stream in. A temp file is removed
//! when the last handle to its blob is dropped, so a blob released while a
//! reader is still copying it stays readable until that reader is done, and
//! a write abandoned midway (cancellation, short body) leaves nothing behind.

use std::fmt;
use std::io::SeekFrom;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace, warn};

use crate::checksums::{ChecksumAlgorithm, HasherResult, StreamingHasher, etag_from_md5_hex};
use crate::config::S3Config;
use crate::error::{S3ServiceError, S3ServiceResult};
use crate::utils::generate_content_id;

/// Default size (in bytes) above which blobs spill to disk: 512 KiB.
const DEFAULT_MAX_MEMORY_SIZE: usize = 524_288;

/// Default streaming buffer size: 64 KiB.
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// ContentRef / Body / WriteResult
// ---------------------------------------------------------------------------

/// Opaque handle to a blob held by a [`ContentStore`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    /// Allocate a fresh, unique reference.
    #[must_use]
    pub fn generate() -> Self {
        Self(generate_content_id())
    }

    /// The reference as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request body: any asynchronous byte source.
pub struct Body(Pin<Box<dyn AsyncRead + Send>>);

impl Body {
    /// Wrap an async reader.
    pub fn from_reader(reader: impl AsyncRead + Send + 'static) -> Self {
        Self(Box::pin(reader))
    }

    /// A body backed by an in-memory buffer.
    #[must_use]
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self::from_reader(std::io::Cursor::new(data.into()))
    }

    /// A zero-length body.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_bytes(Bytes::new())
    }

    fn into_reader(self) -> Pin<Box<dyn AsyncRead + Send>> {
        self.0
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body").finish_non_exhaustive()
    }
}

impl From<Bytes> for Body {
    fn from(data: Bytes) -> Self {
        Self::from_bytes(data)
    }
}

impl From<Vec<u8>> for Body {
    fn from(data: Vec<u8>) -> Self {
        Self::from_bytes(data)
    }
}

impl From<&'static str> for Body {
    fn from(data: &'static str) -> Self {
        Self::from_bytes(Bytes::from_static(data.as_bytes()))
    }
}

/// Outcome of a successful [`ContentStore::write`], [`ContentStore::concat`]
/// or [`ContentStore::copy`].
#[derive(Debug, Clone)]
pub struct WriteResult {
    /// Reference to the stored blob.
    pub content: ContentRef,
    /// Number of bytes stored.
    pub size: u64,
    /// MD5 and any requested checksums of the stored bytes.
    pub digests: HasherResult,
}

impl WriteResult {
    /// Hex MD5 of the stored bytes.
    #[must_use]
    pub fn md5_hex(&self) -> &str {
        &self.digests.md5_hex
    }

    /// Quoted hex MD5, the ETag of a single-part object or part.
    #[must_use]
    pub fn etag(&self) -> String {
        etag_from_md5_hex(&self.digests.md5_hex)
    }
}

// ---------------------------------------------------------------------------
// ContentStore trait
// ---------------------------------------------------------------------------

/// Addressable byte storage.
#[async_trait]
pub trait ContentStore: Send + Sync + fmt::Debug {
    /// Stream `body` into a new blob, hashing as it goes.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::IncompleteBody`] when the body is shorter or longer
    /// than `expected_size`; nothing is stored in that case.
    async fn write(
        &self,
        body: Body,
        expected_size: u64,
        algorithms: &[ChecksumAlgorithm],
    ) -> S3ServiceResult<WriteResult>;

    /// Read a blob, or an inclusive byte range of it.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::ContentNotFound`] if the reference was released,
    /// [`S3ServiceError::InvalidRange`] if the range falls outside the blob.
    async fn read(&self, content: &ContentRef, range: Option<(u64, u64)>) -> S3ServiceResult<Bytes>;

    /// Concatenate blobs, in order, into a new blob. The inputs stay intact.
    async fn concat(&self, parts: &[ContentRef]) -> S3ServiceResult<WriteResult>;

    /// Stream a blob, or an inclusive byte range of it, into a new blob.
    ///
    /// # Errors
    ///
    /// Same as [`ContentStore::read`].
    async fn copy(
        &self,
        source: &ContentRef,
        range: Option<(u64, u64)>,
        algorithms: &[ChecksumAlgorithm],
    ) -> S3ServiceResult<WriteResult>;

    /// Drop a blob. Unknown references are ignored.
    fn release(&self, content: &ContentRef);

    /// Whether a reference still resolves.
    fn contains(&self, content: &ContentRef) -> bool;

    /// Number of live blobs.
    fn len(&self) -> usize;

    /// Whether the store holds no blobs.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every blob.
    fn reset(&self);
}

// ---------------------------------------------------------------------------
// StagedContent
// ---------------------------------------------------------------------------

/// A freshly written blob not yet owned by any version or part.
///
/// Dropping the guard releases the blob; [`StagedContent::commit`] hands the
/// reference over to its new owner instead.
pub struct StagedContent {
    store: Arc<dyn ContentStore>,
    content: ContentRef,
    armed: bool,
}

impl StagedContent {
    /// Guard `content`, releasing it from `store` unless committed.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>, content: ContentRef) -> Self {
        Self {
            store,
            content,
            armed: true,
        }
    }

    /// The guarded reference.
    #[must_use]
    pub fn content(&self) -> &ContentRef {
        &self.content
    }

    /// Transfer ownership of the blob to the caller.
    #[must_use]
    pub fn commit(mut self) -> ContentRef {
        self.armed = false;
        self.content.clone()
    }
}

impl fmt::Debug for StagedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedContent")
            .field("content", &self.content)
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}

impl Drop for StagedContent {
    fn drop(&mut self) {
        if self.armed {
            trace!(content = %self.content, "releasing uncommitted content");
            self.store.release(&self.content);
        }
    }
}

// ---------------------------------------------------------------------------
// StoredData
// ---------------------------------------------------------------------------

/// A blob held by [`InMemoryStorage`].
enum StoredData {
    /// Small blobs kept entirely in memory.
    InMemory {
        /// The raw bytes.
        data: Bytes,
    },
    /// Large blobs spilled to a temp file, removed on drop.
    OnDisk {
        /// Path to the temp file. Always `Some` until dropped.
        path: Option<TempPath>,
        /// Size of the stored data in bytes.
        size: u64,
    },
}

impl fmt::Debug for StoredData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory { data } => f
                .debug_struct("InMemory")
                .field("size", &data.len())
                .finish(),
            Self::OnDisk { path, size } => f
                .debug_struct("OnDisk")
                .field("path", &path.as_ref().map(|p| p.display().to_string()))
                .field("size", size)
                .finish(),
        }
    }
}

impl Drop for StoredData {
    fn drop(&mut self) {
        if let Some(path) = self.take_path() {
            let shown = path.display().to_string();
            match path.close() {
                Ok(()) => trace!(path = %shown, "removed temp file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %shown, error = %e, "failed to remove temp file"),
            }
        }
    }
}

fn io_error(context: &str, e: &std::io::Error) -> S3ServiceError {
    S3ServiceError::Internal(anyhow::anyhow!("{context}: {e}"))
}

impl StoredData {
    fn take_path(&mut self) -> Option<TempPath> {
        match self {
            Self::OnDisk { path, .. } => path.take(),
            Self::InMemory { .. } => None,
        }
    }

    fn size(&self) -> u64 {
        match self {
            Self::InMemory { data } => data.len() as u64,
            Self::OnDisk { size, .. } => *size,
        }
    }

    async fn open(&self) -> S3ServiceResult<tokio::fs::File> {
        match self {
            Self::OnDisk { path: Some(path), .. } => tokio::fs::File::open(&**path)
                .await
                .map_err(|e| io_error("failed to open temp file", &e)),
            _ => Err(S3ServiceError::Internal(anyhow::anyhow!(
                "blob has no backing file"
            ))),
        }
    }

    /// Read `[start, end]` (inclusive).
    async fn read_range(&self, start: u64, end: u64) -> S3ServiceResult<Bytes> {
        match self {
            Self::InMemory { data } => {
                let start = usize::try_from(start).map_err(|_| S3ServiceError::InvalidRange)?;
                let end = usize::try_from(end).map_err(|_| S3ServiceError::InvalidRange)?;
                Ok(data.slice(start..=end))
            }
            Self::OnDisk { .. } => {
                let mut file = self.open().await?;
                file.seek(SeekFrom::Start(start))
                    .await
                    .map_err(|e| io_error("failed to seek temp file", &e))?;
                let len = end - start + 1;
                let mut buf = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
                file.take(len)
                    .read_to_end(&mut buf)
                    .await
                    .map_err(|e| io_error("failed to read temp file", &e))?;
                if buf.len() as u64 != len {
                    return Err(S3ServiceError::Internal(anyhow::anyhow!(
                        "temp file truncated: wanted {len} bytes, read {}",
                        buf.len()
                    )));
                }
                Ok(Bytes::from(buf))
            }
        }
    }

    /// Stream the blob, or the inclusive `range` of it, into `sink`,
    /// hashing it on the way. The range must already be validated.
    async fn copy_into(
        &self,
        sink: &mut Sink,
        hasher: &mut StreamingHasher,
        range: Option<(u64, u64)>,
        chunk_size: usize,
    ) -> S3ServiceResult<()> {
        match self {
            Self::InMemory { data } => {
                let data = match range {
                    Some((start, end)) => {
                        let start =
                            usize::try_from(start).map_err(|_| S3ServiceError::InvalidRange)?;
                        let end = usize::try_from(end).map_err(|_| S3ServiceError::InvalidRange)?;
                        data.slice(start..=end)
                    }
                    None => data.clone(),
                };
                for chunk in data.chunks(chunk_size) {
                    hasher.update(chunk);
                    sink.write(chunk).await?;
                }
                Ok(())
            }
            Self::OnDisk { size, .. } => {
                let (start, len) = range.map_or((0, *size), |(start, end)| (start, end - start + 1));
                let mut file = self.open().await?;
                file.seek(SeekFrom::Start(start))
                    .await
                    .map_err(|e| io_error("failed to seek temp file", &e))?;
                let mut reader = file.take(len);
                let mut buf = vec![0u8; chunk_size];
                let mut copied = 0u64;
                loop {
                    let n = reader
                        .read(&mut buf)
                        .await
                        .map_err(|e| io_error("failed to read temp file", &e))?;
                    if n == 0 {
                        break;
                    }
                    copied += n as u64;
                    hasher.update(&buf[..n]);
                    sink.write(&buf[..n]).await?;
                }
                if copied != len {
                    return Err(S3ServiceError::Internal(anyhow::anyhow!(
                        "temp file truncated: wanted {len} bytes, read {copied}"
                    )));
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

/// Destination of a streaming write; spills to disk past the threshold.
enum Sink {
    Memory {
        buf: BytesMut,
        threshold: usize,
    },
    Disk {
        file: tokio::fs::File,
        path: TempPath,
        size: u64,
    },
}

impl Sink {
    fn new(threshold: usize) -> Self {
        Self::Memory {
            buf: BytesMut::new(),
            threshold,
        }
    }

    async fn write(&mut self, chunk: &[u8]) -> S3ServiceResult<()> {
        match self {
            Self::Memory { buf, threshold } if buf.len() + chunk.len() <= *threshold => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            Self::Memory { buf, .. } => {
                let (file, path) = NamedTempFile::new()
                    .map_err(|e| io_error("failed to create temp file", &e))?
                    .into_parts();
                let mut file = tokio::fs::File::from_std(file);
                file.write_all(&buf[..])
                    .await
                    .map_err(|e| io_error("failed to write temp file", &e))?;
                file.write_all(chunk)
                    .await
                    .map_err(|e| io_error("failed to write temp file", &e))?;
                let size = (buf.len() + chunk.len()) as u64;
                trace!(path = %path.display(), size, "spilling blob to disk");
                *self = Self::Disk { file, path, size };
                Ok(())
            }
            Self::Disk { file, size, .. } => {
                file.write_all(chunk)
                    .await
                    .map_err(|e| io_error("failed to write temp file", &e))?;
                *size += chunk.len() as u64;
                Ok(())
            }
        }
    }

    async fn finish(self) -> S3ServiceResult<StoredData> {
        match self {
            Self::Memory { buf, .. } => Ok(StoredData::InMemory { data: buf.freeze() }),
            Self::Disk {
                mut file,
                path,
                size,
            } => {
                file.flush()
                    .await
                    .map_err(|e| io_error("failed to flush temp file", &e))?;
                Ok(StoredData::OnDisk {
                    path: Some(path),
                    size,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryStorage
// ---------------------------------------------------------------------------

/// Content store keeping small blobs in memory and spilling large ones to
/// temp files.
///
/// # Examples
///
/// ```
/// use objstack_s3_core::storage::{Body, ContentStore, InMemoryStorage};
///
/// # tokio_test::block_on(async {
/// let storage = InMemoryStorage::new(1024);
/// let written = storage.write(Body::from("hello"), 5, &[]).await.unwrap();
/// assert_eq!(written.size, 5);
///
/// let data = storage.read(&written.content, Some((1, 3))).await.unwrap();
/// assert_eq!(data.as_ref(), b"ell");
/// # });
/// ```
pub struct InMemoryStorage {
    blobs: DashMap<ContentRef, Arc<StoredData>>,
    max_memory_size: usize,
    chunk_size: usize,
}

impl fmt::Debug for InMemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStorage")
            .field("blobs", &self.blobs.len())
            .field("max_memory_size", &self.max_memory_size)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_SIZE)
    }
}

impl InMemoryStorage {
    /// Create a store spilling blobs above `max_memory_size` bytes to disk.
    #[must_use]
    pub fn new(max_memory_size: usize) -> Self {
        debug!(max_memory_size, "creating InMemoryStorage");
        Self {
            blobs: DashMap::new(),
            max_memory_size,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a store from the engine configuration.
    #[must_use]
    pub fn from_config(config: &S3Config) -> Self {
        Self::new(config.max_memory_object_size).with_chunk_size(config.stream_chunk_size)
    }

    /// Override the streaming buffer size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn lookup(&self, content: &ContentRef) -> S3ServiceResult<Arc<StoredData>> {
        self.blobs
            .get(content)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| S3ServiceError::ContentNotFound {
                content: content.to_string(),
            })
    }

    /// Validate an inclusive range against a blob of `size` bytes.
    fn check_range(range: Option<(u64, u64)>, size: u64) -> S3ServiceResult<()> {
        match range {
            Some((start, end)) if start > end || end >= size => Err(S3ServiceError::InvalidRange),
            _ => Ok(()),
        }
    }

    fn insert(&self, data: StoredData, digests: HasherResult) -> WriteResult {
        let content = ContentRef::generate();
        let size = data.size();
        self.blobs.insert(content.clone(), Arc::new(data));
        trace!(%content, size, "stored blob");
        WriteResult {
            content,
            size,
            digests,
        }
    }
}

#[async_trait]
impl ContentStore for InMemoryStorage {
    async fn write(
        &self,
        body: Body,
        expected_size: u64,
        algorithms: &[ChecksumAlgorithm],
    ) -> S3ServiceResult<WriteResult> {
        let mut reader = body.into_reader().take(expected_size.saturating_add(1));
        let mut hasher = StreamingHasher::new(algorithms);
        let mut sink = Sink::new(self.max_memory_size);
        let mut buf = vec![0u8; self.chunk_size];
        let mut received = 0u64;

        loop {
            let n = reader
                .read(&mut buf)
                .await
                .map_err(|e| io_error("failed to read request body", &e))?;
            if n == 0 {
                break;
            }
            received += n as u64;
            if received > expected_size {
                return Err(S3ServiceError::IncompleteBody {
                    expected: expected_size,
                    received,
                });
            }
            hasher.update(&buf[..n]);
            sink.write(&buf[..n]).await?;
        }

        if received != expected_size {
            return Err(S3ServiceError::IncompleteBody {
                expected: expected_size,
                received,
            });
        }

        let data = sink.finish().await?;
        Ok(self.insert(data, hasher.finish()))
    }

    async fn read(&self, content: &ContentRef, range: Option<(u64, u64)>) -> S3ServiceResult<Bytes> {
        let data = self.lookup(content)?;
        let size = data.size();
        Self::check_range(range, size)?;
        let (start, end) = match range {
            Some(range) => range,
            None if size == 0 => return Ok(Bytes::new()),
            None => (0, size - 1),
        };
        data.read_range(start, end).await
    }

    async fn concat(&self, parts: &[ContentRef]) -> S3ServiceResult<WriteResult> {
        let blobs = parts
            .iter()
            .map(|part| self.lookup(part))
            .collect::<S3ServiceResult<Vec<_>>>()?;

        let mut hasher = StreamingHasher::new(&[]);
        let mut sink = Sink::new(self.max_memory_size);
        for blob in &blobs {
            blob.copy_into(&mut sink, &mut hasher, None, self.chunk_size)
                .await?;
        }

        let data = sink.finish().await?;
        debug!(parts = parts.len(), size = data.size(), "concatenated blobs");
        Ok(self.insert(data, hasher.finish()))
    }

    async fn copy(
        &self,
        source: &ContentRef,
        range: Option<(u64, u64)>,
        algorithms: &[ChecksumAlgorithm],
    ) -> S3ServiceResult<WriteResult> {
        let blob = self.lookup(source)?;
        Self::check_range(range, blob.size())?;

        let mut hasher = StreamingHasher::new(algorithms);
        let mut sink = Sink::new(self.max_memory_size);
        blob.copy_into(&mut sink, &mut hasher, range, self.chunk_size)
            .await?;

        let data = sink.finish().await?;
        trace!(%source, size = data.size(), "copied blob");
        Ok(self.insert(data, hasher.finish()))
    }

    fn release(&self, content: &ContentRef) {
        if self.blobs.remove(content).is_some() {
            trace!(%content, "released blob");
        }
    }

    fn contains(&self, content: &ContentRef) -> bool {
        self.blobs.contains_key(content)
    }

    fn len(&self) -> usize {
        self.blobs.len()
    }

    fn reset(&self) {
        debug!(blobs = self.blobs.len(), "resetting content store");
        self.blobs.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
