//! Core service façade and bootstrap.
//!
//! This crate wires host-provided bridge implementations (media engine,
//! cache, stream resolver, downloader, playlist store, now-playing display)
//! into a running player. [`PlayerService::start`] restores the saved
//! playlist, starts the progress ticker and the task that marshals backend
//! events into the controller, and hands back the command surface plus the
//! event bus.
//!
//! ```no_run
//! # async fn example(config: core_runtime::CoreConfig) -> core_service::Result<()> {
//! use core_service::PlayerService;
//!
//! let service = PlayerService::start(config).await?;
//! let mut events = service.subscribe();
//!
//! service.controller().play().await;
//! if let Ok(event) = events.recv().await {
//!     println!("{}", event.description());
//! }
//!
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_playback::{
    BackendEvents, EventBusListener, NotifierRegistry, PlaybackController, PlaybackListener,
};
use core_runtime::{CoreConfig, EventBus, EventStream};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Primary façade exposed to host applications.
pub struct PlayerService {
    controller: Arc<PlaybackController>,
    event_bus: EventBus,
    notifier: Arc<NotifierRegistry>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl PlayerService {
    /// Validate `config`, restore the saved playlist and start the
    /// background tasks. Playback is not started.
    #[instrument(skip(config))]
    pub async fn start(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

        let event_bus = EventBus::new(config.settings.event_buffer_size);
        let notifier = Arc::new(NotifierRegistry::new());
        notifier.register(Arc::new(EventBusListener::new(event_bus.clone())));

        let (controller, backend_events) =
            PlaybackController::new(&config, Arc::clone(&notifier));
        let controller = Arc::new(controller);

        if let Some(store) = &config.playlist_store {
            match store.load().await {
                Ok(Some(snapshot)) => controller.restore(snapshot).await,
                Ok(None) => debug!("No saved playlist"),
                Err(err) => warn!(error = %err, "Failed to load saved playlist, starting empty"),
            }
        }

        let cancel = CancellationToken::new();
        let ticker = controller
            .backend()
            .spawn_ticker(config.settings.tick_interval, cancel.child_token());
        let pump = spawn_event_pump(
            Arc::clone(&controller),
            backend_events,
            cancel.child_token(),
        );

        info!(
            tick_ms = config.settings.tick_interval.as_millis() as u64,
            persistence = config.playlist_store.is_some(),
            "Player service started"
        );

        Ok(Self {
            controller,
            event_bus,
            notifier,
            cancel,
            tasks: Mutex::new(vec![ticker, pump]),
        })
    }

    /// The command surface.
    pub fn controller(&self) -> &Arc<PlaybackController> {
        &self.controller
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to serialisable player events.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Add a synchronous lifecycle listener. Listeners run on the control
    /// context after the event bus bridge, in registration order.
    pub fn register_listener(&self, listener: Arc<dyn PlaybackListener>) {
        self.notifier.register(listener);
    }

    /// Stop the background tasks, release the active resource and flush the
    /// playlist to the store. Safe to call more than once.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        self.cancel.cancel();

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(err) = task.await {
                warn!(error = %err, "Background task ended abnormally");
            }
        }

        self.controller.shutdown().await;
        info!("Player service stopped");
    }
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("controller", &self.controller)
            .field("event_bus", &self.event_bus)
            .field("stopped", &self.cancel.is_cancelled())
            .finish()
    }
}

/// Marshal backend events onto the controller, one at a time.
fn spawn_event_pump(
    controller: Arc<PlaybackController>,
    mut events: BackendEvents,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => controller.handle_backend_event(event).await,
                    None => break,
                },
            }
        }
        debug!("Backend event pump stopped");
    })
}
