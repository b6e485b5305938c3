//! # Core Configuration Module
//!
//! Provides the explicit context object the player is built from.
//!
//! ## Overview
//!
//! `CoreConfig` bundles every host collaborator together with the tunable
//! [`PlaybackSettings`]. It is constructed once at startup through
//! [`CoreConfigBuilder`] and passed by reference to the components that need
//! it; nothing in the core reaches for a global.
//!
//! The builder fails fast: a missing required bridge is reported as
//! [`Error::CapabilityMissing`] naming the capability, before any task is
//! spawned.
//!
//! ## Required Dependencies
//!
//! - `MediaEngine` - decode/render pipeline
//! - `CacheStore` - cached item lookup
//! - `StreamResolver` - streaming locators for uncached items
//! - `Downloader` - background caching
//!
//! ## Optional Dependencies
//!
//! - `PlaylistStore` - playlist persistence across restarts
//! - `NowPlayingPublisher` - lock screen / media session display
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CoreConfig, PlaybackSettings};
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .media_engine(Arc::new(MyEngine::new()))
//!     .cache_store(Arc::new(MyCache))
//!     .stream_resolver(Arc::new(MyResolver))
//!     .downloader(Arc::new(MyDownloader))
//!     .playlist_store(Arc::new(MyStore))
//!     .settings(PlaybackSettings::default().with_prefetch_depth(5))
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // No bridges injected
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - missing required bridges");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{
    CacheStore, Downloader, MediaEngine, NowPlayingPublisher, PlaylistStore, StreamResolver,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::events::DEFAULT_EVENT_BUFFER_SIZE;

/// Tunable behaviour of the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Interval of the progress tick pushed while a resource is attached
    pub tick_interval: Duration,

    /// Elapsed time after which "previous" restarts the current item instead
    pub replay_threshold: Duration,

    /// Number of upcoming entries requested from the downloader when an item starts
    pub prefetch_depth: usize,

    /// Skip entries that are already cached when prefetching
    pub prefetch_skip_cached: bool,

    /// Consecutive failed loads tolerated before giving up and stopping.
    /// `None` allows one full traversal of the playlist.
    pub max_failure_cascade: Option<usize>,

    /// Per-subscriber buffer of the event bus
    pub event_buffer_size: usize,

    /// Initial value of the playlist's auto-cache flag when nothing is restored
    pub auto_cache_default: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            replay_threshold: Duration::from_secs(5),
            prefetch_depth: 3,
            prefetch_skip_cached: true,
            max_failure_cascade: None,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            auto_cache_default: false,
        }
    }
}

impl PlaybackSettings {
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_replay_threshold(mut self, threshold: Duration) -> Self {
        self.replay_threshold = threshold;
        self
    }

    pub fn with_prefetch_depth(mut self, depth: usize) -> Self {
        self.prefetch_depth = depth;
        self
    }

    pub fn with_prefetch_skip_cached(mut self, skip: bool) -> Self {
        self.prefetch_skip_cached = skip;
        self
    }

    pub fn with_max_failure_cascade(mut self, bound: usize) -> Self {
        self.max_failure_cascade = Some(bound);
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn with_auto_cache_default(mut self, enabled: bool) -> Self {
        self.auto_cache_default = enabled;
        self
    }

    /// Failure cascade bound for a playlist of `playlist_len` entries.
    ///
    /// Never less than one, so an empty or single-entry playlist still stops
    /// after its first failure.
    pub fn failure_bound(&self, playlist_len: usize) -> usize {
        self.max_failure_cascade.unwrap_or(playlist_len).max(1)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(Error::Config(
                "Tick interval must be greater than zero".to_string(),
            ));
        }

        if self.prefetch_depth == 0 {
            return Err(Error::Config(
                "Prefetch depth must be at least 1".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than zero".to_string(),
            ));
        }

        if self.max_failure_cascade == Some(0) {
            return Err(Error::Config(
                "Failure cascade bound must be at least 1 when set".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the player.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Media decode/render pipeline (required)
    pub media_engine: Arc<dyn MediaEngine>,

    /// Cached item lookup (required)
    pub cache_store: Arc<dyn CacheStore>,

    /// Streaming locator resolution (required)
    pub stream_resolver: Arc<dyn StreamResolver>,

    /// Background caching (required)
    pub downloader: Arc<dyn Downloader>,

    /// Playlist persistence (optional)
    pub playlist_store: Option<Arc<dyn PlaylistStore>>,

    /// Now-playing display (optional)
    pub now_playing: Option<Arc<dyn NowPlayingPublisher>>,

    /// Tunable behaviour
    pub settings: PlaybackSettings,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_engine", &"MediaEngine { ... }")
            .field("cache_store", &"CacheStore { ... }")
            .field("stream_resolver", &"StreamResolver { ... }")
            .field("downloader", &"Downloader { ... }")
            .field(
                "playlist_store",
                &self
                    .playlist_store
                    .as_ref()
                    .map(|_| "PlaylistStore { ... }"),
            )
            .field(
                "now_playing",
                &self
                    .now_playing
                    .as_ref()
                    .map(|_| "NowPlayingPublisher { ... }"),
            )
            .field("settings", &self.settings)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.settings.validate()
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_engine: Option<Arc<dyn MediaEngine>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    stream_resolver: Option<Arc<dyn StreamResolver>>,
    downloader: Option<Arc<dyn Downloader>>,
    playlist_store: Option<Arc<dyn PlaylistStore>>,
    now_playing: Option<Arc<dyn NowPlayingPublisher>>,
    settings: Option<PlaybackSettings>,
}

impl CoreConfigBuilder {
    /// Sets the media engine (required).
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.media_engine = Some(engine);
        self
    }

    /// Sets the cache lookup (required).
    pub fn cache_store(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(cache);
        self
    }

    /// Sets the streaming resolver (required).
    pub fn stream_resolver(mut self, resolver: Arc<dyn StreamResolver>) -> Self {
        self.stream_resolver = Some(resolver);
        self
    }

    /// Sets the background downloader (required).
    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Sets the playlist store (optional).
    ///
    /// Without one the playlist starts empty and changes are not persisted.
    pub fn playlist_store(mut self, store: Arc<dyn PlaylistStore>) -> Self {
        self.playlist_store = Some(store);
        self
    }

    /// Sets the now-playing publisher (optional).
    pub fn now_playing(mut self, publisher: Arc<dyn NowPlayingPublisher>) -> Self {
        self.now_playing = Some(publisher);
        self
    }

    /// Sets the playback settings.
    ///
    /// Default: [`PlaybackSettings::default()`]
    pub fn settings(mut self, settings: PlaybackSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns an error if:
    /// - A required bridge is missing (`Error::CapabilityMissing`)
    /// - Settings are invalid (`Error::Config`)
    pub fn build(self) -> Result<CoreConfig> {
        let media_engine = self.media_engine.ok_or_else(|| {
            capability_missing(
                "MediaEngine",
                "A MediaEngine implementation is required to decode and render audio. \
                 Inject the platform player with .media_engine().",
            )
        })?;

        let cache_store = self.cache_store.ok_or_else(|| {
            capability_missing(
                "CacheStore",
                "A CacheStore implementation is required to read cached items. \
                 Inject one with .cache_store(); an empty cache is acceptable.",
            )
        })?;

        let stream_resolver = self.stream_resolver.ok_or_else(|| {
            capability_missing(
                "StreamResolver",
                "A StreamResolver implementation is required to play uncached items. \
                 Inject one with .stream_resolver().",
            )
        })?;

        let downloader = self.downloader.ok_or_else(|| {
            capability_missing(
                "Downloader",
                "A Downloader implementation is required for prefetch and auto-cache. \
                 Inject one with .downloader().",
            )
        })?;

        let config = CoreConfig {
            media_engine,
            cache_store,
            stream_resolver,
            downloader,
            playlist_store: self.playlist_store,
            now_playing: self.now_playing,
            settings: self.settings.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
