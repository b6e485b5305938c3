//! Domain models shared between the library and the playback core.

use crate::error::{LibraryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Display fallback when an item carries no artist.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Display fallback when an item carries no album.
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a playable item.
///
/// Library identifiers are opaque strings; the playback core never interprets
/// them beyond equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier issued by the host library.
    pub fn from_string(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "id".to_string(),
                message: "Item id cannot be empty".to_string(),
            });
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Kind of content an item represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Song,
    Episode,
}

/// A song or episode that can be placed in a playlist.
///
/// Items are owned by the library and shared with playlists as
/// `Arc<PlayableItem>`. Everything except the cached flag is immutable once
/// constructed; the cached flag is updated in place by whoever completes a
/// download.
#[derive(Debug)]
pub struct PlayableItem {
    /// Unique identifier
    pub id: ItemId,
    /// Display title
    pub title: String,
    /// Artist or show name, if known
    pub artist: Option<String>,
    /// Album or collection name, if known
    pub album: Option<String>,
    /// Song or episode
    pub content_type: ContentType,
    /// Whether the encoding can be decoded on the current platform
    pub playable_on_platform: bool,
    /// Duration reported by the library before the item is loaded
    pub duration_hint: Option<Duration>,
    cached: AtomicBool,
}

impl PlayableItem {
    /// Create a new, uncached, playable item.
    pub fn new(id: ItemId, title: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            id,
            title: title.into(),
            artist: None,
            album: None,
            content_type,
            playable_on_platform: true,
            duration_hint: None,
            cached: AtomicBool::new(false),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_cached(self, cached: bool) -> Self {
        self.cached.store(cached, Ordering::Relaxed);
        self
    }

    pub fn with_playable(mut self, playable: bool) -> Self {
        self.playable_on_platform = playable;
        self
    }

    pub fn with_duration_hint(mut self, duration: Duration) -> Self {
        self.duration_hint = Some(duration);
        self
    }

    /// Finish construction and hand out a shared reference.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Whether the item's bytes are available in the local cache.
    pub fn is_cached(&self) -> bool {
        self.cached.load(Ordering::Acquire)
    }

    /// Record a cache state change (download finished, file evicted).
    pub fn set_cached(&self, cached: bool) {
        self.cached.store(cached, Ordering::Release);
    }

    /// Artist with the display fallback applied.
    pub fn artist_or_default(&self) -> &str {
        self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }

    /// Album with the display fallback applied.
    pub fn album_or_default(&self) -> &str {
        self.album.as_deref().unwrap_or(UNKNOWN_ALBUM)
    }

    /// Validate item data
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(LibraryError::InvalidInput {
                field: "title".to_string(),
                message: "Item title cannot be empty".to_string(),
            });
        }

        if self.duration_hint == Some(Duration::ZERO) {
            return Err(LibraryError::InvalidInput {
                field: "duration_hint".to_string(),
                message: "Duration hint must be positive when present".to_string(),
            });
        }

        Ok(())
    }
}

/// Playlist repeat policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Stop after the last entry
    #[default]
    Off,
    /// Wrap around at either end
    All,
    /// Replay the current entry when it finishes
    Single,
}

impl RepeatMode {
    /// The mode a "repeat" button press moves to: off → all → single → off.
    pub fn cycled(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::Single,
            RepeatMode::Single => RepeatMode::Off,
        }
    }
}

/// Persisted shape of the playback queue.
///
/// The persistence bridge decides how (and whether) to serialise the items
/// themselves; the core only hands snapshots out on change and takes one back
/// at startup.
#[derive(Debug, Clone, Default)]
pub struct PlaylistSnapshot {
    pub items: Vec<Arc<PlayableItem>>,
    pub current_index: usize,
    pub shuffle: bool,
    pub repeat_mode: RepeatMode,
    pub auto_cache: bool,
}

impl PlaylistSnapshot {
    pub fn item_ids(&self) -> Vec<ItemId> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

/// Payload pushed to now-playing surfaces (lock screen, media session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub item_id: ItemId,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Option<Duration>,
    pub elapsed: Duration,
    pub is_playing: bool,
}

impl NowPlayingInfo {
    /// Build the display payload for `item`, applying the artist and album
    /// fallbacks.
    pub fn from_item(item: &PlayableItem, elapsed: Duration, is_playing: bool) -> Self {
        Self {
            item_id: item.id.clone(),
            title: item.title.clone(),
            artist: item.artist_or_default().to_string(),
            album: item.album_or_default().to_string(),
            duration: item.duration_hint,
            elapsed,
            is_playing,
        }
    }

    /// Replace the duration with the one reported by the loaded resource.
    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        if duration.is_some() {
            self.duration = duration;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn song(title: &str) -> PlayableItem {
        PlayableItem::new(ItemId::new(), title, ContentType::Song)
    }

    #[test]
    fn test_item_id_rejects_empty() {
        assert!(ItemId::from_string("  ").is_err());
        assert_eq!(ItemId::from_string("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_cached_flag_is_shared() {
        let item = song("Track").shared();
        let other = Arc::clone(&item);
        assert!(!other.is_cached());

        item.set_cached(true);
        assert!(other.is_cached());
    }

    #[test]
    fn test_display_fallbacks() {
        let item = song("Track");
        assert_eq!(item.artist_or_default(), UNKNOWN_ARTIST);
        assert_eq!(item.album_or_default(), UNKNOWN_ALBUM);

        let item = song("Track").with_artist("Band").with_album("Record");
        let info = NowPlayingInfo::from_item(&item, Duration::from_secs(3), true);
        assert_eq!(info.artist, "Band");
        assert_eq!(info.album, "Record");
        assert_eq!(info.elapsed, Duration::from_secs(3));
    }

    #[test]
    fn test_validate() {
        assert!(song("Fine").validate().is_ok());
        assert!(song(" ").validate().is_err());
        assert!(song("Zero")
            .with_duration_hint(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[test]
    fn test_repeat_mode_cycle() {
        assert_eq!(RepeatMode::Off.cycled(), RepeatMode::All);
        assert_eq!(RepeatMode::All.cycled(), RepeatMode::Single);
        assert_eq!(RepeatMode::Single.cycled(), RepeatMode::Off);
    }

    #[test]
    fn test_repeat_mode_serialization() {
        let json = serde_json::to_string(&RepeatMode::Single).unwrap();
        assert_eq!(json, "\"single\"");
        let mode: RepeatMode = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(mode, RepeatMode::All);
    }
}
