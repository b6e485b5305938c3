//! # Playback Backend
//!
//! Owns the single active media resource and executes the request-to-play
//! protocol.
//!
//! ## Request to play
//!
//! [`PlaybackBackend::request_to_play`] runs as a critical section guarded by
//! an async mutex, so only one swap is ever in flight:
//!
//! 1. Record the request as the latest one.
//! 2. Refuse items that cannot be played on this platform, releasing
//!    whatever was attached.
//! 3. Resolve a source: cached bytes when the item is cached and the cache
//!    has them, otherwise a streaming locator (plus a background download
//!    when auto-cache is on).
//! 4. Release the old resource, attach the new one under a fresh generation
//!    tag and start it.
//! 5. Report the entry that is now active.
//!
//! ## Asynchronous events
//!
//! Engine callbacks and the progress ticker are turned into
//! [`BackendEvent`]s on an unbounded channel. Every event carries the
//! generation of the resource it belongs to; the consumer checks
//! [`PlaybackBackend::is_current`] before acting so callbacks from a replaced
//! resource are dropped.

use crate::error::{PlaybackError, Result};
use crate::request::{PlayRequest, PlaylistEntry};
use bridge_traits::{
    AttachRequest, CacheStore, DownloadPriority, Downloader, MediaEngine, MediaEvent,
    MediaEventSink, MediaSource, StreamLocator, StreamResolver,
};
use core_library::models::PlayableItem;
use core_runtime::logging::{redact_if_sensitive, strip_path};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

/// Generation value meaning "nothing attached".
const NO_GENERATION: u64 = 0;

/// Event raised by the backend outside of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    /// Progress of the attached resource.
    Tick {
        generation: u64,
        elapsed: Duration,
        duration: Option<Duration>,
    },
    /// The attached resource played to the end.
    Finished { generation: u64 },
    /// The attached resource failed after it was started.
    Failed { generation: u64, message: String },
}

impl BackendEvent {
    pub fn generation(&self) -> u64 {
        match self {
            BackendEvent::Tick { generation, .. }
            | BackendEvent::Finished { generation }
            | BackendEvent::Failed { generation, .. } => *generation,
        }
    }
}

/// Receiving half of the backend event channel.
pub type BackendEvents = mpsc::UnboundedReceiver<BackendEvent>;

/// The loaded resource.
#[derive(Debug, Clone)]
struct ActiveResource {
    entry: PlaylistEntry,
    generation: u64,
    playing: bool,
    elapsed: Duration,
    duration: Option<Duration>,
}

/// Read-only view of the active resource.
#[derive(Debug, Clone)]
pub struct ActiveSnapshot {
    pub entry: PlaylistEntry,
    pub generation: u64,
    pub playing: bool,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
}

impl From<&ActiveResource> for ActiveSnapshot {
    fn from(active: &ActiveResource) -> Self {
        Self {
            entry: active.entry.clone(),
            generation: active.generation,
            playing: active.playing,
            elapsed: active.elapsed,
            duration: active.duration,
        }
    }
}

/// Result of a successful swap.
#[derive(Debug, Clone)]
pub struct LoadedEntry {
    pub entry: PlaylistEntry,
    pub generation: u64,
}

#[derive(Default)]
struct BackendState {
    active: Option<ActiveResource>,
    latest: Option<PlayRequest>,
}

/// Forwards engine callbacks into the backend event channel.
struct ChannelSink {
    events: mpsc::UnboundedSender<BackendEvent>,
}

impl MediaEventSink for ChannelSink {
    fn notify(&self, event: MediaEvent) {
        let event = match event {
            MediaEvent::Finished { generation } => BackendEvent::Finished { generation },
            MediaEvent::Failed {
                generation,
                message,
            } => BackendEvent::Failed {
                generation,
                message,
            },
        };
        // Receiver gone means the player shut down
        let _ = self.events.send(event);
    }
}

pub struct PlaybackBackend {
    engine: Arc<dyn MediaEngine>,
    cache: Arc<dyn CacheStore>,
    resolver: Arc<dyn StreamResolver>,
    downloader: Arc<dyn Downloader>,
    state: Mutex<BackendState>,
    next_generation: AtomicU64,
    active_generation: AtomicU64,
    auto_cache: AtomicBool,
    events: mpsc::UnboundedSender<BackendEvent>,
    sink: Arc<dyn MediaEventSink>,
}

impl PlaybackBackend {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        cache: Arc<dyn CacheStore>,
        resolver: Arc<dyn StreamResolver>,
        downloader: Arc<dyn Downloader>,
    ) -> (Self, BackendEvents) {
        let (events, receiver) = mpsc::unbounded_channel();
        let sink: Arc<dyn MediaEventSink> = Arc::new(ChannelSink {
            events: events.clone(),
        });

        let backend = Self {
            engine,
            cache,
            resolver,
            downloader,
            state: Mutex::new(BackendState::default()),
            next_generation: AtomicU64::new(NO_GENERATION + 1),
            active_generation: AtomicU64::new(NO_GENERATION),
            auto_cache: AtomicBool::new(false),
            events,
            sink,
        };
        (backend, receiver)
    }

    pub fn set_auto_cache(&self, enabled: bool) {
        self.auto_cache.store(enabled, Ordering::Release);
    }

    pub fn auto_cache(&self) -> bool {
        self.auto_cache.load(Ordering::Acquire)
    }

    /// Whether `generation` tags the resource that is attached right now.
    pub fn is_current(&self, generation: u64) -> bool {
        generation != NO_GENERATION && self.active_generation.load(Ordering::Acquire) == generation
    }

    /// Whether a resource is attached (playing or paused).
    pub fn is_active(&self) -> bool {
        self.active_generation.load(Ordering::Acquire) != NO_GENERATION
    }

    pub async fn is_playing(&self) -> bool {
        self.state
            .lock()
            .await
            .active
            .as_ref()
            .is_some_and(|active| active.playing)
    }

    pub async fn active(&self) -> Option<ActiveSnapshot> {
        self.state.lock().await.active.as_ref().map(ActiveSnapshot::from)
    }

    /// The last request handed to [`request_to_play`](Self::request_to_play).
    pub async fn latest_request(&self) -> Option<PlayRequest> {
        self.state.lock().await.latest.clone()
    }

    /// Load `request.entry` into the engine, replacing the active resource.
    #[instrument(skip(self, request), fields(index = request.entry.index, item_id = %request.entry.item.id, reaction = %request.reaction))]
    pub async fn request_to_play(&self, request: PlayRequest) -> Result<LoadedEntry> {
        let mut state = self.state.lock().await;
        state.latest = Some(request.clone());

        match self.swap(&mut state, &request.entry).await {
            Ok(loaded) => {
                info!(generation = loaded.generation, "Item started");
                Ok(loaded)
            }
            Err(err) => {
                warn!(error = %err, "Failed to load item");
                self.release(&mut state).await;
                Err(err)
            }
        }
    }

    async fn swap(&self, state: &mut BackendState, entry: &PlaylistEntry) -> Result<LoadedEntry> {
        let item = &entry.item;
        if !item.playable_on_platform {
            return Err(PlaybackError::ItemNotPlayable(format!(
                "{} cannot be decoded on this platform",
                item.id
            )));
        }

        let source = self.resolve_source(item).await?;

        self.release(state).await;

        let generation = self.next_generation.fetch_add(1, Ordering::AcqRel);
        let attach = AttachRequest {
            generation,
            item_id: item.id.clone(),
            source,
        };

        self.engine
            .attach(attach, Arc::clone(&self.sink))
            .await
            .map_err(|e| PlaybackError::EngineError(e.to_string()))?;

        if let Err(e) = self.engine.play().await {
            if let Err(detach_err) = self.engine.detach().await {
                debug!(error = %detach_err, "Detach after failed start also failed");
            }
            return Err(PlaybackError::EngineError(e.to_string()));
        }

        state.active = Some(ActiveResource {
            entry: entry.clone(),
            generation,
            playing: true,
            elapsed: Duration::ZERO,
            duration: item.duration_hint,
        });
        self.active_generation.store(generation, Ordering::Release);

        Ok(LoadedEntry {
            entry: entry.clone(),
            generation,
        })
    }

    async fn resolve_source(&self, item: &Arc<PlayableItem>) -> Result<MediaSource> {
        if item.is_cached() {
            match self.cache.get_file(item) {
                Ok(Some(file)) => {
                    debug!(size = file.metadata.size, "Playing from cache");
                    return Ok(MediaSource::Cached {
                        data: file.data,
                        content_type: file.metadata.content_type,
                    });
                }
                Ok(None) => {
                    let miss = PlaybackError::CacheMiss(item.id.to_string());
                    warn!(error = %miss, "Falling back to streaming");
                }
                Err(e) => {
                    warn!(error = %e, "Cache lookup failed, falling back to streaming");
                }
            }
        }

        let locator = self
            .resolver
            .generate_url(item)
            .await?
            .ok_or_else(|| PlaybackError::SourceUnavailable(item.id.to_string()))?;
        debug!(
            locator = %strip_path(&locator.url),
            headers = %loggable_headers(&locator),
            "Streaming"
        );

        if self.auto_cache() {
            self.downloader
                .download(Arc::clone(item), DownloadPriority::High);
        }

        Ok(MediaSource::Stream(locator))
    }

    /// Detach the active resource, if any. Returns the entry it was built from.
    async fn release(&self, state: &mut BackendState) -> Option<PlaylistEntry> {
        let active = state.active.take()?;
        self.active_generation
            .store(NO_GENERATION, Ordering::Release);
        if let Err(e) = self.engine.detach().await {
            warn!(generation = active.generation, error = %e, "Failed to detach resource");
        }
        Some(active.entry)
    }

    /// Release the active resource. Returns the item that was attached.
    pub async fn stop(&self) -> Option<Arc<PlayableItem>> {
        let mut state = self.state.lock().await;
        self.release(&mut state).await.map(|entry| entry.item)
    }

    /// Resume the attached resource. `Ok(None)` when nothing is attached.
    pub async fn resume(&self) -> Result<Option<Arc<PlayableItem>>> {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.as_mut() else {
            return Ok(None);
        };

        self.engine
            .play()
            .await
            .map_err(|e| PlaybackError::EngineError(e.to_string()))?;
        active.playing = true;
        Ok(Some(Arc::clone(&active.entry.item)))
    }

    /// Pause the attached resource and return it together with the elapsed time.
    pub async fn pause(&self) -> Result<Option<ActiveSnapshot>> {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.as_mut() else {
            return Ok(None);
        };

        self.engine
            .pause()
            .await
            .map_err(|e| PlaybackError::EngineError(e.to_string()))?;
        active.playing = false;
        if let Ok(position) = self.engine.position().await {
            active.elapsed = position;
        }
        Ok(Some(ActiveSnapshot::from(&*active)))
    }

    /// Seek the attached resource. No-op when nothing is attached.
    pub async fn seek(&self, position: Duration) -> Result<Option<ActiveSnapshot>> {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.as_mut() else {
            return Ok(None);
        };

        self.engine
            .seek(position)
            .await
            .map_err(|e| PlaybackError::EngineError(e.to_string()))?;
        active.elapsed = position;
        Ok(Some(ActiveSnapshot::from(&*active)))
    }

    /// Re-attach the active entry from time zero under a fresh generation.
    ///
    /// Callbacks the engine queued for the previous attachment (a `Finished`
    /// racing the restart) no longer match and are dropped.
    #[instrument(skip(self))]
    pub async fn restart(&self) -> Result<Option<Arc<PlayableItem>>> {
        let mut state = self.state.lock().await;
        let Some(entry) = state.active.as_ref().map(|active| active.entry.clone()) else {
            return Ok(None);
        };

        match self.swap(&mut state, &entry).await {
            Ok(loaded) => {
                debug!(generation = loaded.generation, "Restarted from the beginning");
                Ok(Some(loaded.entry.item))
            }
            Err(err) => {
                self.release(&mut state).await;
                Err(err)
            }
        }
    }

    /// Elapsed time of the attached resource, asking the engine first.
    pub async fn elapsed(&self) -> Duration {
        let mut state = self.state.lock().await;
        let Some(active) = state.active.as_mut() else {
            return Duration::ZERO;
        };
        if let Ok(position) = self.engine.position().await {
            active.elapsed = position;
        }
        active.elapsed
    }

    /// Sample the engine and push a tick for the attached, playing resource.
    ///
    /// Skipped while a swap holds the lock.
    pub async fn tick(&self) {
        let Ok(mut state) = self.state.try_lock() else {
            trace!("Swap in progress, skipping tick");
            return;
        };
        let Some(active) = state.active.as_mut() else {
            return;
        };
        if !active.playing {
            return;
        }

        match self.engine.position().await {
            Ok(position) => active.elapsed = position,
            Err(e) => {
                debug!(error = %e, "Engine not ready for progress");
                return;
            }
        }
        if let Some(duration) = self.engine.duration().await {
            active.duration = Some(duration);
        }

        let _ = self.events.send(BackendEvent::Tick {
            generation: active.generation,
            elapsed: active.elapsed,
            duration: active.duration,
        });
    }

    /// Run [`tick`](Self::tick) every `interval` until `cancel` fires.
    pub fn spawn_ticker(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let backend = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Progress ticker stopped");
                        break;
                    }
                    _ = ticker.tick() => backend.tick().await,
                }
            }
        })
    }
}

impl std::fmt::Debug for PlaybackBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackBackend")
            .field(
                "active_generation",
                &self.active_generation.load(Ordering::Acquire),
            )
            .field("auto_cache", &self.auto_cache())
            .finish()
    }
}

/// Locator headers as `name=value` pairs, sorted, credentials redacted.
fn loggable_headers(locator: &StreamLocator) -> String {
    let mut headers: Vec<String> = locator
        .headers
        .iter()
        .map(|(name, value)| format!("{name}={}", redact_if_sensitive(name, value)))
        .collect();
    headers.sort();
    headers.join(", ")
}
