//! Test doubles for the host bridges and a harness around the controller.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AttachRequest, CacheStore, CachedFile, DownloadPriority, Downloader, MediaEngine, MediaEvent,
    MediaEventSink, NowPlayingPublisher, PlaylistStore, StreamLocator, StreamResolver,
};
use bytes::Bytes;
use core_library::models::{
    ContentType, ItemId, NowPlayingInfo, PlayableItem, PlaylistSnapshot,
};
use core_playback::{BackendEvents, NotifierRegistry, PlaybackController, PlayerEvent};
use core_runtime::{CoreConfig, PlaybackSettings};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Items
// ============================================================================

pub fn song(id: &str) -> Arc<PlayableItem> {
    PlayableItem::new(ItemId::from_string(id).unwrap(), id.to_uppercase(), ContentType::Song)
        .with_duration_hint(Duration::from_secs(180))
        .shared()
}

pub fn cached_song(id: &str) -> Arc<PlayableItem> {
    let item = song(id);
    item.set_cached(true);
    item
}

pub fn unplayable(id: &str) -> Arc<PlayableItem> {
    PlayableItem::new(ItemId::from_string(id).unwrap(), id, ContentType::Song)
        .with_playable(false)
        .shared()
}

// ============================================================================
// Media engine
// ============================================================================

#[derive(Debug, Clone)]
pub struct Attachment {
    pub generation: u64,
    pub item_id: String,
    pub remote: bool,
}

#[derive(Default)]
pub struct FakeEngine {
    attachments: Mutex<Vec<Attachment>>,
    sink: Mutex<Option<Arc<dyn MediaEventSink>>>,
    attached: Mutex<Option<Attachment>>,
    position: Mutex<Duration>,
    duration: Mutex<Option<Duration>>,
    playing: Mutex<bool>,
    fail_attach: Mutex<HashSet<String>>,
    detaches: Mutex<usize>,
}

impl FakeEngine {
    pub fn fail_attach_for(&self, id: &str) {
        self.fail_attach.lock().insert(id.to_string());
    }

    pub fn attachments(&self) -> Vec<Attachment> {
        self.attachments.lock().clone()
    }

    pub fn attached_ids(&self) -> Vec<String> {
        self.attachments
            .lock()
            .iter()
            .map(|attachment| attachment.item_id.clone())
            .collect()
    }

    pub fn current(&self) -> Option<Attachment> {
        self.attached.lock().clone()
    }

    pub fn is_playing(&self) -> bool {
        *self.playing.lock()
    }

    pub fn position(&self) -> Duration {
        *self.position.lock()
    }

    pub fn set_position(&self, position: Duration) {
        *self.position.lock() = position;
    }

    pub fn set_duration(&self, duration: Duration) {
        *self.duration.lock() = Some(duration);
    }

    pub fn detaches(&self) -> usize {
        *self.detaches.lock()
    }

    /// Raise an event through the sink handed over at attach time.
    pub fn raise(&self, event: MediaEvent) {
        let sink = self.sink.lock().clone();
        sink.expect("nothing attached yet").notify(event);
    }

    /// Report the attached resource as finished.
    pub fn finish(&self) {
        let generation = self.current().expect("nothing attached").generation;
        self.raise(MediaEvent::Finished { generation });
    }

    pub fn fail(&self, message: &str) {
        let generation = self.current().expect("nothing attached").generation;
        self.raise(MediaEvent::Failed {
            generation,
            message: message.to_string(),
        });
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn attach(&self, request: AttachRequest, events: Arc<dyn MediaEventSink>) -> BridgeResult<()> {
        if self.fail_attach.lock().contains(request.item_id.as_str()) {
            return Err(BridgeError::OperationFailed(format!(
                "cannot open {}",
                request.item_id
            )));
        }

        let attachment = Attachment {
            generation: request.generation,
            item_id: request.item_id.as_str().to_string(),
            remote: request.source.is_remote(),
        };
        self.attachments.lock().push(attachment.clone());
        *self.attached.lock() = Some(attachment);
        *self.sink.lock() = Some(events);
        *self.position.lock() = Duration::ZERO;
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        *self.playing.lock() = true;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        *self.playing.lock() = false;
        Ok(())
    }

    async fn seek(&self, position: Duration) -> BridgeResult<()> {
        *self.position.lock() = position;
        Ok(())
    }

    async fn position(&self) -> BridgeResult<Duration> {
        Ok(*self.position.lock())
    }

    async fn duration(&self) -> Option<Duration> {
        *self.duration.lock()
    }

    async fn detach(&self) -> BridgeResult<()> {
        *self.detaches.lock() += 1;
        *self.attached.lock() = None;
        *self.playing.lock() = false;
        Ok(())
    }
}

// ============================================================================
// Sources
// ============================================================================

#[derive(Default)]
pub struct FakeCache {
    files: Mutex<HashMap<String, Bytes>>,
}

impl FakeCache {
    pub fn store(&self, id: &str) {
        self.files
            .lock()
            .insert(id.to_string(), Bytes::from(format!("audio:{}", id)));
    }
}

impl CacheStore for FakeCache {
    fn get_file(&self, item: &PlayableItem) -> BridgeResult<Option<CachedFile>> {
        Ok(self
            .files
            .lock()
            .get(item.id.as_str())
            .cloned()
            .map(|data| CachedFile::new(data).with_content_type("audio/mpeg")))
    }
}

#[derive(Default)]
pub struct FakeResolver {
    missing: Mutex<HashSet<String>>,
}

impl FakeResolver {
    pub fn without_stream(&self, id: &str) {
        self.missing.lock().insert(id.to_string());
    }
}

#[async_trait]
impl StreamResolver for FakeResolver {
    async fn generate_url(&self, item: &PlayableItem) -> BridgeResult<Option<StreamLocator>> {
        if self.missing.lock().contains(item.id.as_str()) {
            return Ok(None);
        }
        Ok(Some(
            StreamLocator::new(format!("https://media.example.com/stream/{}?sig=abc", item.id))
                .with_header("Authorization", "Bearer test"),
        ))
    }
}

#[derive(Default)]
pub struct RecordingDownloader {
    requests: Mutex<Vec<(String, DownloadPriority)>>,
}

impl RecordingDownloader {
    pub fn requested_ids(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(id, _)| id.clone()).collect()
    }

    pub fn clear(&self) {
        self.requests.lock().clear();
    }
}

impl Downloader for RecordingDownloader {
    fn download(&self, item: Arc<PlayableItem>, priority: DownloadPriority) {
        self.requests
            .lock()
            .push((item.id.as_str().to_string(), priority));
    }
}

// ============================================================================
// Persistence and display
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    pub initial: Mutex<Option<PlaylistSnapshot>>,
    pub saved: Mutex<Vec<PlaylistSnapshot>>,
    pub fail_load: bool,
}

impl MemoryStore {
    pub fn last_saved(&self) -> Option<PlaylistSnapshot> {
        self.saved.lock().last().cloned()
    }
}

#[async_trait]
impl PlaylistStore for MemoryStore {
    async fn load(&self) -> BridgeResult<Option<PlaylistSnapshot>> {
        if self.fail_load {
            return Err(BridgeError::OperationFailed("corrupt playlist file".into()));
        }
        Ok(self.initial.lock().clone())
    }

    async fn save(&self, snapshot: &PlaylistSnapshot) -> BridgeResult<()> {
        self.saved.lock().push(snapshot.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<Option<NowPlayingInfo>>>,
}

impl RecordingPublisher {
    pub fn last(&self) -> Option<Option<NowPlayingInfo>> {
        self.published.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.published.lock().len()
    }
}

impl NowPlayingPublisher for RecordingPublisher {
    fn publish(&self, info: Option<NowPlayingInfo>) {
        self.published.lock().push(info);
    }
}

// ============================================================================
// Listener log
// ============================================================================

/// Records lifecycle events as short strings such as `started:a`.
#[derive(Default)]
pub struct EventLog {
    entries: Mutex<Vec<String>>,
}

impl EventLog {
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn last(&self) -> Option<String> {
        self.entries.lock().last().cloned()
    }

    fn describe(event: &PlayerEvent) -> String {
        match event {
            PlayerEvent::Started(item) => format!("started:{}", item.id),
            PlayerEvent::Paused { item, .. } => match item {
                Some(item) => format!("paused:{}", item.id),
                None => "paused:-".to_string(),
            },
            PlayerEvent::Stopped(item) => match item {
                Some(item) => format!("stopped:{}", item.id),
                None => "stopped:-".to_string(),
            },
            PlayerEvent::ElapsedTimeChanged { item, elapsed, .. } => {
                format!("elapsed:{}@{}", item.id, elapsed.as_secs())
            }
            PlayerEvent::PlaylistChanged {
                length,
                current_index,
            } => format!("playlist:{}@{}", length, current_index),
            PlayerEvent::LoadFailed { item, .. } => format!("failed:{}", item.id),
        }
    }
}

impl core_playback::PlaybackListener for EventLog {
    fn on_event(&self, event: &PlayerEvent) -> anyhow::Result<()> {
        self.entries.lock().push(Self::describe(event));
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub controller: PlaybackController,
    pub backend_events: BackendEvents,
    pub engine: Arc<FakeEngine>,
    pub cache: Arc<FakeCache>,
    pub resolver: Arc<FakeResolver>,
    pub downloader: Arc<RecordingDownloader>,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub log: Arc<EventLog>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(PlaybackSettings::default())
    }

    pub fn with_settings(settings: PlaybackSettings) -> Self {
        let engine = Arc::new(FakeEngine::default());
        let cache = Arc::new(FakeCache::default());
        let resolver = Arc::new(FakeResolver::default());
        let downloader = Arc::new(RecordingDownloader::default());
        let store = Arc::new(MemoryStore::default());
        let publisher = Arc::new(RecordingPublisher::default());

        let config = CoreConfig::builder()
            .media_engine(engine.clone())
            .cache_store(cache.clone())
            .stream_resolver(resolver.clone())
            .downloader(downloader.clone())
            .playlist_store(store.clone())
            .now_playing(publisher.clone())
            .settings(settings)
            .build()
            .expect("complete config");

        let log = Arc::new(EventLog::default());
        let notifier = Arc::new(NotifierRegistry::new());
        notifier.register(log.clone());

        let (controller, backend_events) = PlaybackController::new(&config, notifier);

        Self {
            controller: controller.with_shuffle_seed(7),
            backend_events,
            engine,
            cache,
            resolver,
            downloader,
            store,
            publisher,
            log,
        }
    }

    /// Cached items also get bytes in the fake cache.
    pub async fn queue(&self, items: &[Arc<PlayableItem>]) {
        for item in items {
            if item.is_cached() {
                self.cache.store(item.id.as_str());
            }
        }
        self.controller.append_all(items.to_vec()).await;
        self.log.take();
    }

    /// Deliver every backend event raised so far.
    pub async fn pump(&mut self) {
        while let Ok(event) = self.backend_events.try_recv() {
            self.controller.handle_backend_event(event).await;
        }
    }

    /// Sample progress and deliver the resulting tick.
    pub async fn tick(&mut self) {
        self.controller.backend().tick().await;
        self.pump().await;
    }

    pub async fn current_index(&self) -> usize {
        self.controller.status().await.current_index
    }

    pub fn current_item(&self) -> Option<String> {
        self.engine.current().map(|attachment| attachment.item_id)
    }
}
