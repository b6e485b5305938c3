//! Background playlist persistence.
//!
//! Snapshots are queued without blocking the control context and written by
//! a single task, strictly in order. Snapshots that pile up while a save is
//! running are coalesced so only the most recent one is written next.

use bridge_traits::PlaylistStore;
use core_library::models::PlaylistSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

enum PersistCommand {
    Save(PlaylistSnapshot),
    Flush(oneshot::Sender<()>),
}

pub struct PlaylistPersister {
    commands: Mutex<Option<mpsc::UnboundedSender<PersistCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PlaylistPersister {
    /// Spawn the save task on the current runtime.
    pub fn spawn(store: Arc<dyn PlaylistStore>) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(store, receiver));
        Self {
            commands: Mutex::new(Some(commands)),
            task: Mutex::new(Some(task)),
        }
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<PersistCommand>> {
        self.commands.lock().clone()
    }

    /// Queue `snapshot` for saving.
    pub fn schedule(&self, snapshot: PlaylistSnapshot) {
        let sent = self
            .sender()
            .is_some_and(|commands| commands.send(PersistCommand::Save(snapshot)).is_ok());
        if !sent {
            warn!("Playlist persister is gone, snapshot dropped");
        }
    }

    /// Wait until every snapshot queued so far has been written.
    pub async fn flush(&self) {
        let Some(commands) = self.sender() else {
            return;
        };
        let (ack, done) = oneshot::channel();
        if commands.send(PersistCommand::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush and stop the save task. Later snapshots are dropped.
    pub async fn shutdown(&self) {
        self.flush().await;
        self.commands.lock().take();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Playlist persister task ended abnormally");
            }
        }
    }
}

async fn run(store: Arc<dyn PlaylistStore>, mut commands: mpsc::UnboundedReceiver<PersistCommand>) {
    while let Some(command) = commands.recv().await {
        let mut latest = None;
        let mut acks = Vec::new();

        let mut next = Some(command);
        while let Some(command) = next {
            match command {
                PersistCommand::Save(snapshot) => latest = Some(snapshot),
                PersistCommand::Flush(ack) => acks.push(ack),
            }
            next = commands.try_recv().ok();
        }

        if let Some(snapshot) = latest {
            match store.save(&snapshot).await {
                Ok(()) => debug!(
                    length = snapshot.items.len(),
                    current_index = snapshot.current_index,
                    "Playlist saved"
                ),
                Err(e) => warn!(error = %e, "Failed to save playlist"),
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }
}

impl std::fmt::Debug for PlaylistPersister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistPersister")
            .field(
                "running",
                &self.task.lock().as_ref().is_some_and(|task| !task.is_finished()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use core_library::models::{ContentType, ItemId, PlayableItem, RepeatMode};

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<PlaylistSnapshot>>,
        fail: bool,
    }

    #[async_trait]
    impl PlaylistStore for MemoryStore {
        async fn load(&self) -> BridgeResult<Option<PlaylistSnapshot>> {
            Ok(self.saved.lock().last().cloned())
        }

        async fn save(&self, snapshot: &PlaylistSnapshot) -> BridgeResult<()> {
            if self.fail {
                return Err(BridgeError::OperationFailed("disk full".into()));
            }
            self.saved.lock().push(snapshot.clone());
            Ok(())
        }
    }

    fn snapshot(len: usize, current_index: usize) -> PlaylistSnapshot {
        PlaylistSnapshot {
            items: (0..len)
                .map(|i| {
                    PlayableItem::new(ItemId::new(), format!("Track {}", i), ContentType::Song)
                        .shared()
                })
                .collect(),
            current_index,
            shuffle: false,
            repeat_mode: RepeatMode::All,
            auto_cache: true,
        }
    }

    #[tokio::test]
    async fn test_latest_snapshot_is_saved_last() {
        let store = Arc::new(MemoryStore::default());
        let persister = PlaylistPersister::spawn(store.clone());

        persister.schedule(snapshot(1, 0));
        persister.schedule(snapshot(2, 1));
        persister.schedule(snapshot(3, 2));
        persister.flush().await;

        let saved = store.saved.lock();
        assert!(!saved.is_empty());
        let last = saved.last().unwrap();
        assert_eq!(last.items.len(), 3);
        assert_eq!(last.current_index, 2);
        assert_eq!(last.repeat_mode, RepeatMode::All);
    }

    #[tokio::test]
    async fn test_save_failure_is_not_fatal() {
        let store = Arc::new(MemoryStore {
            fail: true,
            ..Default::default()
        });
        let persister = PlaylistPersister::spawn(store.clone());

        persister.schedule(snapshot(1, 0));
        persister.flush().await;
        persister.schedule(snapshot(2, 0));
        persister.shutdown().await;
        persister.schedule(snapshot(3, 0));

        assert!(store.saved.lock().is_empty());
    }
}
