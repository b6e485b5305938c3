//! Storage Abstractions
//!
//! Provides the cache lookup used when loading an item and the persistence
//! hooks for the playback queue. The on-disk layout of either is entirely the
//! host's business.

use async_trait::async_trait;
use bytes::Bytes;
use core_library::models::{PlayableItem, PlaylistSnapshot};

use crate::error::Result;

/// Metadata describing a cached file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CachedFileMetadata {
    /// MIME type of the stored encoding, when known
    pub content_type: Option<String>,
    /// Size in bytes
    pub size: u64,
}

/// Bytes of a cached item plus their metadata.
#[derive(Debug, Clone)]
pub struct CachedFile {
    pub data: Bytes,
    pub metadata: CachedFileMetadata,
}

impl CachedFile {
    pub fn new(data: Bytes) -> Self {
        let size = data.len() as u64;
        Self {
            data,
            metadata: CachedFileMetadata {
                content_type: None,
                size,
            },
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.metadata.content_type = Some(content_type.into());
        self
    }
}

/// Cached media lookup.
///
/// This is a synchronous call made while the backend holds its swap lock, so
/// implementations should answer from an index or a memory map rather than
/// doing network I/O.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::CacheStore;
///
/// fn cached_size(cache: &dyn CacheStore, item: &PlayableItem) -> u64 {
///     match cache.get_file(item) {
///         Ok(Some(file)) => file.metadata.size,
///         _ => 0,
///     }
/// }
/// ```
pub trait CacheStore: Send + Sync {
    /// Returns the cached bytes for `item`, or `Ok(None)` if nothing is stored.
    fn get_file(&self, item: &PlayableItem) -> Result<Option<CachedFile>>;
}

/// Playlist persistence.
///
/// The core loads once at startup and saves on every change. Saves arrive in
/// order from a single background task, so an implementation may simply
/// overwrite what it stored last.
#[async_trait]
pub trait PlaylistStore: Send + Sync {
    /// Load the last saved playlist, if any.
    async fn load(&self) -> Result<Option<PlaylistSnapshot>>;

    /// Persist the given playlist state.
    async fn save(&self, snapshot: &PlaylistSnapshot) -> Result<()>;
}
