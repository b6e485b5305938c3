//! Network-facing collaborators: streaming resolution and background downloads.

use async_trait::async_trait;
use core_library::models::PlayableItem;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;

/// Priority hint passed to the downloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadPriority {
    Low,
    Normal,
    High,
}

/// Background downloader.
///
/// `download` must return immediately: the host queues the request and does
/// the transfer elsewhere. Requests are idempotent; asking twice for an item
/// that is queued, in flight or already cached is a no-op for the host. When
/// a download completes the host marks the item cached through
/// [`PlayableItem::set_cached`].
pub trait Downloader: Send + Sync {
    fn download(&self, item: Arc<PlayableItem>, priority: DownloadPriority);
}

/// Where a streaming item can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLocator {
    /// Full URL to the media resource
    pub url: String,
    /// HTTP headers to include in the request (e.g., Authorization)
    pub headers: HashMap<String, String>,
}

impl StreamLocator {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Resolves a streaming locator for items that are not cached.
///
/// Returns `Ok(None)` when the backend API has no stream for the item.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn generate_url(&self, item: &PlayableItem) -> Result<Option<StreamLocator>>;
}
