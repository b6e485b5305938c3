//! # Lifecycle Notifications
//!
//! Synchronous, ordered fan-out of player lifecycle events to registered
//! listeners.
//!
//! Registration is append-only; the only removal is [`NotifierRegistry::clear`].
//! Broadcast visits listeners in registration order and isolates each one:
//! a listener that returns an error or panics is logged and skipped, and
//! delivery continues with the next listener.
//!
//! [`EventBusListener`] bridges the registry onto the asynchronous
//! [`EventBus`] so observers outside the control context see the same events.

use core_library::models::PlayableItem;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, PlaylistEvent};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, warn};

/// Lifecycle event delivered to listeners.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// An item started (or resumed) playing.
    Started(Arc<PlayableItem>),
    /// Playback paused. Carries the paused item, if one was attached.
    Paused {
        item: Option<Arc<PlayableItem>>,
        elapsed: Duration,
    },
    /// Playback stopped. Carries the item that was playing, if any.
    Stopped(Option<Arc<PlayableItem>>),
    /// Periodic progress of the active item.
    ElapsedTimeChanged {
        item: Arc<PlayableItem>,
        elapsed: Duration,
        duration: Option<Duration>,
    },
    /// Entries, cursor or queue settings changed.
    PlaylistChanged { length: usize, current_index: usize },
    /// An item could not be loaded; the player applies the request's error
    /// reaction on its own.
    LoadFailed {
        item: Arc<PlayableItem>,
        reason: String,
    },
}

/// Receiver of lifecycle events.
///
/// Called synchronously from the control context; implementations should
/// return quickly and hand heavy work elsewhere.
pub trait PlaybackListener: Send + Sync {
    fn on_event(&self, event: &PlayerEvent) -> anyhow::Result<()>;
}

impl<F> PlaybackListener for F
where
    F: Fn(&PlayerEvent) -> anyhow::Result<()> + Send + Sync,
{
    fn on_event(&self, event: &PlayerEvent) -> anyhow::Result<()> {
        self(event)
    }
}

#[derive(Default)]
pub struct NotifierRegistry {
    listeners: RwLock<Vec<Arc<dyn PlaybackListener>>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: Arc<dyn PlaybackListener>) {
        self.listeners.write().push(listener);
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// Returns the number of listeners that handled the event successfully.
    pub fn broadcast(&self, event: &PlayerEvent) -> usize {
        // Listeners may register others from inside a callback
        let listeners = self.listeners.read().clone();

        let mut delivered = 0;
        for (position, listener) in listeners.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(err)) => {
                    warn!(listener = position, error = %err, "Playback listener failed");
                }
                Err(_) => {
                    error!(listener = position, "Playback listener panicked");
                }
            }
        }
        delivered
    }
}

impl std::fmt::Debug for NotifierRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifierRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Republishes lifecycle events on the [`EventBus`].
pub struct EventBusListener {
    bus: EventBus,
}

impl EventBusListener {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    fn to_core_event(event: &PlayerEvent) -> CoreEvent {
        match event {
            PlayerEvent::Started(item) => CoreEvent::Playback(PlaybackEvent::Started {
                item_id: item.id.to_string(),
                title: item.title.clone(),
            }),
            PlayerEvent::Paused { item, elapsed } => CoreEvent::Playback(PlaybackEvent::Paused {
                item_id: item
                    .as_ref()
                    .map(|item| item.id.to_string())
                    .unwrap_or_default(),
                position_ms: millis(*elapsed),
            }),
            PlayerEvent::Stopped(item) => CoreEvent::Playback(PlaybackEvent::Stopped {
                item_id: item.as_ref().map(|item| item.id.to_string()),
            }),
            PlayerEvent::ElapsedTimeChanged {
                item,
                elapsed,
                duration,
            } => CoreEvent::Playback(PlaybackEvent::PositionChanged {
                item_id: item.id.to_string(),
                position_ms: millis(*elapsed),
                duration_ms: duration.map(millis).unwrap_or(0),
            }),
            PlayerEvent::PlaylistChanged {
                length,
                current_index,
            } => CoreEvent::Playlist(PlaylistEvent::Changed {
                length: *length,
                current_index: *current_index,
            }),
            PlayerEvent::LoadFailed { item, reason } => {
                CoreEvent::Playback(PlaybackEvent::Error {
                    item_id: Some(item.id.to_string()),
                    message: reason.clone(),
                    recoverable: true,
                })
            }
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl PlaybackListener for EventBusListener {
    fn on_event(&self, event: &PlayerEvent) -> anyhow::Result<()> {
        // No subscribers is not a failure
        let _ = self.bus.emit(Self::to_core_event(event));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::models::{ContentType, ItemId};
    use parking_lot::Mutex;

    fn item(name: &str) -> Arc<PlayableItem> {
        PlayableItem::new(ItemId::from_string(name).unwrap(), name, ContentType::Episode).shared()
    }

    fn listener<F>(f: F) -> Arc<dyn PlaybackListener>
    where
        F: Fn(&PlayerEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Arc::new(f)
    }

    #[test]
    fn test_broadcast_in_registration_order() {
        let registry = NotifierRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            registry.register(listener(move |_| {
                log.lock().push(tag);
                Ok(())
            }));
        }

        assert_eq!(registry.broadcast(&PlayerEvent::Stopped(None)), 3);
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failing_listener_does_not_block_others() {
        let registry = NotifierRegistry::new();
        let reached = Arc::new(Mutex::new(0));

        registry.register(listener(|_| anyhow::bail!("listener offline")));
        registry.register(listener(|_| panic!("listener bug")));
        {
            let reached = Arc::clone(&reached);
            registry.register(listener(move |_| {
                *reached.lock() += 1;
                Ok(())
            }));
        }

        let delivered = registry.broadcast(&PlayerEvent::Started(item("a")));
        assert_eq!(delivered, 1);
        assert_eq!(*reached.lock(), 1);
    }

    #[test]
    fn test_clear_removes_all() {
        let registry = NotifierRegistry::new();
        registry.register(listener(|_| Ok(())));
        registry.register(listener(|_| Ok(())));
        assert_eq!(registry.len(), 2);

        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.broadcast(&PlayerEvent::Stopped(None)), 0);
    }

    #[tokio::test]
    async fn test_event_bus_listener_republishes() {
        let bus = EventBus::new(16);
        let mut subscriber = bus.subscribe();
        let registry = NotifierRegistry::new();
        registry.register(Arc::new(EventBusListener::new(bus.clone())));

        registry.broadcast(&PlayerEvent::ElapsedTimeChanged {
            item: item("ep-1"),
            elapsed: Duration::from_millis(2_500),
            duration: None,
        });
        registry.broadcast(&PlayerEvent::LoadFailed {
            item: item("ep-2"),
            reason: "unsupported codec".to_string(),
        });

        assert_eq!(
            subscriber.recv().await.unwrap(),
            CoreEvent::Playback(PlaybackEvent::PositionChanged {
                item_id: "ep-1".to_string(),
                position_ms: 2_500,
                duration_ms: 0,
            })
        );
        assert_eq!(
            subscriber.recv().await.unwrap(),
            CoreEvent::Playback(PlaybackEvent::Error {
                item_id: Some("ep-2".to_string()),
                message: "unsupported codec".to_string(),
                recoverable: true,
            })
        );
    }
}
