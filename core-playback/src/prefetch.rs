//! Prefetch of upcoming playlist entries.
//!
//! When an item at position `p` starts and auto-cache is on, the entries at
//! `p+1 ..= p+K` (clamped to the playlist end) are requested from the
//! downloader at high priority, in ascending order. Requests are
//! fire-and-forget and the downloader deduplicates; nothing is tracked here.

use crate::playlist::PlaylistState;
use bridge_traits::{DownloadPriority, Downloader};
use core_library::models::PlayableItem;
use core_runtime::PlaybackSettings;
use std::sync::Arc;
use tracing::debug;

pub struct PrefetchScheduler {
    downloader: Arc<dyn Downloader>,
    depth: usize,
    skip_cached: bool,
}

impl PrefetchScheduler {
    pub fn new(downloader: Arc<dyn Downloader>, depth: usize, skip_cached: bool) -> Self {
        Self {
            downloader,
            depth,
            skip_cached,
        }
    }

    pub fn from_settings(downloader: Arc<dyn Downloader>, settings: &PlaybackSettings) -> Self {
        Self::new(
            downloader,
            settings.prefetch_depth,
            settings.prefetch_skip_cached,
        )
    }

    /// Items that would be requested for a start at `position`.
    pub fn window(&self, playlist: &PlaylistState, position: usize) -> Vec<Arc<PlayableItem>> {
        let items = playlist.items();
        let start = position.saturating_add(1).min(items.len());
        let end = start.saturating_add(self.depth).min(items.len());

        items[start..end]
            .iter()
            .filter(|item| !(self.skip_cached && item.is_cached()))
            .cloned()
            .collect()
    }

    /// Request the window for `position` if the playlist has auto-cache on.
    ///
    /// Returns the number of download requests issued.
    pub fn schedule(&self, playlist: &PlaylistState, position: usize) -> usize {
        if !playlist.auto_cache() {
            return 0;
        }

        let window = self.window(playlist, position);
        for item in &window {
            debug!(item_id = %item.id, position, "Requesting prefetch");
            self.downloader
                .download(Arc::clone(item), DownloadPriority::High);
        }
        window.len()
    }
}
