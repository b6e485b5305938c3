//! End-to-end tests for the player service
//!
//! Covers bootstrap (validation, restore), the backend event pump, the
//! progress ticker, event bus delivery and shutdown.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{
    AttachRequest, CacheStore, CachedFile, DownloadPriority, Downloader, MediaEngine, MediaEvent,
    MediaEventSink, PlaylistStore, StreamLocator, StreamResolver,
};
use core_library::models::{ContentType, ItemId, PlayableItem, PlaylistSnapshot, RepeatMode};
use core_playback::{ErrorReaction, PlayerEvent, PlayerState};
use core_runtime::events::{CoreEvent, PlaybackEvent, PlaylistEvent};
use core_runtime::{CoreConfig, PlaybackSettings};
use core_service::{CoreError, PlayerService};
use mockall::mock;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Bridges
// ============================================================================

#[derive(Default)]
struct Engine {
    sink: Mutex<Option<Arc<dyn MediaEventSink>>>,
    generation: Mutex<Option<u64>>,
    position: Mutex<Duration>,
    attached: Mutex<Vec<String>>,
}

impl Engine {
    fn finish(&self) {
        let generation = self.generation.lock().expect("nothing attached");
        let sink = self.sink.lock().clone().expect("no sink");
        sink.notify(MediaEvent::Finished { generation });
    }
}

#[async_trait]
impl MediaEngine for Engine {
    async fn attach(&self, request: AttachRequest, events: Arc<dyn MediaEventSink>) -> BridgeResult<()> {
        *self.generation.lock() = Some(request.generation);
        *self.sink.lock() = Some(events);
        *self.position.lock() = Duration::ZERO;
        self.attached.lock().push(request.item_id.to_string());
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
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
        None
    }

    async fn detach(&self) -> BridgeResult<()> {
        *self.generation.lock() = None;
        Ok(())
    }
}

struct NoCache;

impl CacheStore for NoCache {
    fn get_file(&self, _item: &PlayableItem) -> BridgeResult<Option<CachedFile>> {
        Ok(None)
    }
}

struct Streams;

#[async_trait]
impl StreamResolver for Streams {
    async fn generate_url(&self, item: &PlayableItem) -> BridgeResult<Option<StreamLocator>> {
        Ok(Some(StreamLocator::new(format!(
            "https://media.example.com/{}",
            item.id
        ))))
    }
}

struct NoDownloads;

impl Downloader for NoDownloads {
    fn download(&self, _item: Arc<PlayableItem>, _priority: DownloadPriority) {}
}

mock! {
    Store {}

    #[async_trait]
    impl PlaylistStore for Store {
        async fn load(&self) -> BridgeResult<Option<PlaylistSnapshot>>;
        async fn save(&self, snapshot: &PlaylistSnapshot) -> BridgeResult<()>;
    }
}

fn song(id: &str) -> Arc<PlayableItem> {
    PlayableItem::new(ItemId::from_string(id).unwrap(), id, ContentType::Episode).shared()
}

fn config(engine: Arc<Engine>, store: Option<MockStore>) -> CoreConfig {
    let mut builder = CoreConfig::builder()
        .media_engine(engine)
        .cache_store(Arc::new(NoCache))
        .stream_resolver(Arc::new(Streams))
        .downloader(Arc::new(NoDownloads));
    if let Some(store) = store {
        builder = builder.playlist_store(Arc::new(store));
    }
    builder.build().unwrap()
}

// ============================================================================
// Bootstrap
// ============================================================================

#[test]
fn test_missing_engine_is_reported_as_capability() {
    let err = CoreConfig::builder()
        .cache_store(Arc::new(NoCache))
        .stream_resolver(Arc::new(Streams))
        .downloader(Arc::new(NoDownloads))
        .build()
        .unwrap_err();

    match CoreError::from(err) {
        CoreError::CapabilityMissing { capability, .. } => assert_eq!(capability, "MediaEngine"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_invalid_settings_are_rejected() {
    let mut config = config(Arc::new(Engine::default()), None);
    config.settings.tick_interval = Duration::ZERO;

    let err = PlayerService::start(config).await.unwrap_err();
    assert!(matches!(err, CoreError::Runtime(_)));
}

#[tokio::test]
async fn test_start_restores_saved_playlist_without_playing() {
    let engine = Arc::new(Engine::default());
    let mut store = MockStore::new();
    store.expect_load().times(1).returning(|| {
        Ok(Some(PlaylistSnapshot {
            items: vec![song("a"), song("b"), song("c")],
            current_index: 1,
            shuffle: false,
            repeat_mode: RepeatMode::All,
            auto_cache: false,
        }))
    });
    store.expect_save().returning(|_| Ok(()));

    let service = PlayerService::start(config(engine.clone(), Some(store)))
        .await
        .unwrap();

    let status = service.controller().status().await;
    assert_eq!(status.state, PlayerState::Idle);
    assert_eq!(status.current_index, 1);
    assert_eq!(status.playlist_len, 3);
    assert!(engine.attached.lock().is_empty());

    service.controller().play().await;
    assert_eq!(*engine.attached.lock(), vec!["b"]);

    service.shutdown().await;
}

#[tokio::test]
async fn test_unreadable_store_starts_empty() {
    let mut store = MockStore::new();
    store
        .expect_load()
        .returning(|| Err(BridgeError::OperationFailed("bad file".into())));
    store.expect_save().returning(|_| Ok(()));

    let service = PlayerService::start(config(Arc::new(Engine::default()), Some(store)))
        .await
        .unwrap();

    assert_eq!(service.controller().status().await.playlist_len, 0);
    service.shutdown().await;
}

// ============================================================================
// Running service
// ============================================================================

#[tokio::test]
async fn test_events_reach_bus_and_listeners() {
    let engine = Arc::new(Engine::default());
    let service = PlayerService::start(config(engine.clone(), None))
        .await
        .unwrap();
    let mut events = service.subscribe();

    let seen = Arc::new(Mutex::new(Vec::new()));
    {
        let seen = Arc::clone(&seen);
        service.register_listener(Arc::new(move |event: &PlayerEvent| -> anyhow::Result<()> {
            if let PlayerEvent::Started(item) = event {
                seen.lock().push(item.id.to_string());
            }
            Ok(())
        }));
    }

    service.controller().append_all(vec![song("a"), song("b")]).await;
    service.controller().play().await;

    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Playlist(PlaylistEvent::Changed {
            length: 2,
            current_index: 0,
        })
    );
    assert_eq!(
        events.recv().await.unwrap(),
        CoreEvent::Playback(PlaybackEvent::Started {
            item_id: "a".to_string(),
            title: "a".to_string(),
        })
    );
    assert_eq!(*seen.lock(), vec!["a"]);

    service.shutdown().await;
}

#[tokio::test]
async fn test_pump_advances_on_finish() {
    let engine = Arc::new(Engine::default());
    let service = PlayerService::start(config(engine.clone(), None))
        .await
        .unwrap();
    let mut started = service
        .subscribe()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Started { .. })));

    service.controller().append_all(vec![song("a"), song("b")]).await;
    service.controller().play_at(0, ErrorReaction::Advance).await;
    started.recv().await.unwrap();

    engine.finish();

    assert_eq!(
        started.recv().await.unwrap(),
        CoreEvent::Playback(PlaybackEvent::Started {
            item_id: "b".to_string(),
            title: "b".to_string(),
        })
    );
    assert_eq!(service.controller().status().await.current_index, 1);

    service.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_ticker_publishes_progress() {
    let engine = Arc::new(Engine::default());
    let service = PlayerService::start(config(engine.clone(), None))
        .await
        .unwrap();
    let mut progress = service
        .subscribe()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::PositionChanged { .. })));

    service.controller().append(song("a")).await;
    service.controller().play().await;
    *engine.position.lock() = Duration::from_secs(3);

    match progress.recv().await.unwrap() {
        CoreEvent::Playback(PlaybackEvent::PositionChanged {
            item_id,
            position_ms,
            ..
        }) => {
            assert_eq!(item_id, "a");
            assert_eq!(position_ms, 3_000);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    service.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_flushes_playlist_and_is_idempotent() {
    let engine = Arc::new(Engine::default());
    let saved = Arc::new(Mutex::new(Vec::<PlaylistSnapshot>::new()));
    let mut store = MockStore::new();
    store.expect_load().returning(|| Ok(None));
    {
        let saved = Arc::clone(&saved);
        store.expect_save().returning(move |snapshot| {
            saved.lock().push(snapshot.clone());
            Ok(())
        });
    }

    let service = PlayerService::start(config(engine.clone(), Some(store)))
        .await
        .unwrap();
    service
        .controller()
        .append_all(vec![song("a"), song("b"), song("c")])
        .await;
    service.controller().play_at(2, ErrorReaction::Advance).await;

    service.shutdown().await;
    service.shutdown().await;

    let last = saved.lock().last().cloned().unwrap();
    assert_eq!(last.items.len(), 3);
    assert_eq!(last.current_index, 2);
    assert!(engine.generation.lock().is_none());
}
