//! # Playback Controller
//!
//! Top-level orchestrator behind the user-facing command surface.
//!
//! ## Serialisation
//!
//! Every command and every backend event takes the controller lock for its
//! whole duration, including the awaited swap inside the backend. Commands
//! from the control context and callbacks from the media engine therefore
//! never interleave, and the playlist cursor only ever moves under the lock.
//!
//! ## Loading
//!
//! A load sets the cursor, asks the backend to play the entry and, on
//! success, schedules prefetch, emits `Started` and refreshes the
//! now-playing display. On failure it emits `LoadFailed` and applies the
//! request's [`ErrorReaction`]. Consecutive failures are counted; once the
//! count reaches [`PlaybackSettings::failure_bound`] the controller stops
//! instead of moving on, so an unplayable playlist always ends in `Stopped`.
//!
//! The counter is reset by every user command and by signs of healthy
//! playback (a tick with non-zero elapsed time, or an item finishing).

use crate::backend::{ActiveSnapshot, BackendEvent, BackendEvents, PlaybackBackend};
use crate::notifier::{NotifierRegistry, PlayerEvent};
use crate::persistence::PlaylistPersister;
use crate::playlist::PlaylistState;
use crate::prefetch::PrefetchScheduler;
use crate::request::{ErrorReaction, PlayRequest, PlaylistEntry};
use bridge_traits::NowPlayingPublisher;
use core_library::models::{NowPlayingInfo, PlayableItem, PlaylistSnapshot, RepeatMode};
use core_runtime::{CoreConfig, PlaybackSettings};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, trace, warn};

/// Coarse player state for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

/// Point-in-time view of the player.
#[derive(Debug, Clone)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub current_index: usize,
    /// Item under the cursor, whether or not it is loaded
    pub current_item: Option<Arc<PlayableItem>>,
    pub playlist_len: usize,
    pub elapsed: Duration,
    pub duration: Option<Duration>,
    /// Generation tag of the attached resource
    pub generation: Option<u64>,
}

struct ControllerState {
    playlist: PlaylistState,
    failure_streak: usize,
}

pub struct PlaybackController {
    state: Mutex<ControllerState>,
    backend: Arc<PlaybackBackend>,
    prefetch: PrefetchScheduler,
    notifier: Arc<NotifierRegistry>,
    now_playing: Option<Arc<dyn NowPlayingPublisher>>,
    persister: Option<PlaylistPersister>,
    settings: PlaybackSettings,
}

impl PlaybackController {
    /// Build the controller and its backend from `config`.
    ///
    /// Must be called inside a tokio runtime when `config` carries a
    /// playlist store, since the save task is spawned here. The returned
    /// receiver yields the backend's asynchronous events; feed each one to
    /// [`handle_backend_event`](Self::handle_backend_event).
    pub fn new(config: &CoreConfig, notifier: Arc<NotifierRegistry>) -> (Self, BackendEvents) {
        let settings = config.settings.clone();
        let (backend, events) = PlaybackBackend::new(
            Arc::clone(&config.media_engine),
            Arc::clone(&config.cache_store),
            Arc::clone(&config.stream_resolver),
            Arc::clone(&config.downloader),
        );
        backend.set_auto_cache(settings.auto_cache_default);

        let controller = Self {
            state: Mutex::new(ControllerState {
                playlist: PlaylistState::new(settings.auto_cache_default),
                failure_streak: 0,
            }),
            backend: Arc::new(backend),
            prefetch: PrefetchScheduler::from_settings(Arc::clone(&config.downloader), &settings),
            notifier,
            now_playing: config.now_playing.clone(),
            persister: config
                .playlist_store
                .clone()
                .map(PlaylistPersister::spawn),
            settings,
        };
        (controller, events)
    }

    /// Make shuffle draws deterministic.
    pub fn with_shuffle_seed(mut self, seed: u64) -> Self {
        self.state.get_mut().playlist.reseed(seed);
        self
    }

    pub fn backend(&self) -> &Arc<PlaybackBackend> {
        &self.backend
    }

    pub fn notifier(&self) -> &Arc<NotifierRegistry> {
        &self.notifier
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    // ========================================================================
    // Transport commands
    // ========================================================================

    /// Resume the attached resource, or load the entry under the cursor.
    #[instrument(skip(self))]
    pub async fn play(&self) {
        let mut state = self.begin_command().await;
        self.play_locked(&mut state).await;
    }

    /// Replace the playlist with `item` and play it.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn play_item(&self, item: Arc<PlayableItem>) {
        let mut state = self.begin_command().await;
        state.playlist.clear();
        state.playlist.append(item);
        self.playlist_changed(&state);
        self.load(&mut state, 0, ErrorReaction::Stop).await;
    }

    /// Play the entry at `index`. Out-of-range indices stop playback.
    #[instrument(skip(self))]
    pub async fn play_at(&self, index: usize, reaction: ErrorReaction) {
        let mut state = self.begin_command().await;
        self.load(&mut state, index, reaction).await;
    }

    #[instrument(skip(self))]
    pub async fn play_next(&self) {
        let mut state = self.begin_command().await;
        let target = state.playlist.next_index();
        self.load_or_stop(&mut state, target, ErrorReaction::Advance)
            .await;
    }

    /// Skip forward to the next cached entry.
    #[instrument(skip(self))]
    pub async fn play_next_cached(&self) {
        let mut state = self.begin_command().await;
        let from = state.playlist.current_index();
        let target = state.playlist.next_cached_index(from);
        self.load_or_stop(&mut state, target, ErrorReaction::AdvanceToCached)
            .await;
    }

    #[instrument(skip(self))]
    pub async fn play_previous(&self) {
        let mut state = self.begin_command().await;
        let target = state.playlist.previous_index();
        self.load_or_stop(&mut state, target, ErrorReaction::Retreat)
            .await;
    }

    /// Skip back to the previous cached entry.
    #[instrument(skip(self))]
    pub async fn play_previous_cached(&self) {
        let mut state = self.begin_command().await;
        let from = state.playlist.current_index();
        let target = state.playlist.previous_cached_index(from);
        self.load_or_stop(&mut state, target, ErrorReaction::RetreatToCached)
            .await;
    }

    /// Restart the current item when it has played for at least the replay
    /// threshold, otherwise behave like [`play_previous`](Self::play_previous).
    #[instrument(skip(self))]
    pub async fn play_previous_or_replay(&self) {
        let mut state = self.begin_command().await;

        if self.backend.is_active() {
            let elapsed = self.backend.elapsed().await;
            if elapsed >= self.settings.replay_threshold {
                match self.backend.restart().await {
                    Ok(Some(item)) => {
                        info!(item_id = %item.id, elapsed_ms = elapsed.as_millis() as u64, "Replaying current item");
                        self.notifier.broadcast(&PlayerEvent::Started(item));
                        self.refresh_now_playing().await;
                        return;
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "Replay failed, moving to previous entry"),
                }
            }
        }

        let target = state.playlist.previous_index();
        self.load_or_stop(&mut state, target, ErrorReaction::Retreat)
            .await;
    }

    #[instrument(skip(self))]
    pub async fn pause(&self) {
        let _state = self.begin_command().await;
        self.pause_locked().await;
    }

    /// Release the active resource and reset the cursor to the first entry.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut state = self.begin_command().await;
        self.stop_locked(&mut state, None).await;
    }

    /// Pause when playing, play otherwise.
    #[instrument(skip(self))]
    pub async fn toggle(&self) {
        let mut state = self.begin_command().await;
        if self.backend.is_playing().await {
            self.pause_locked().await;
        } else {
            self.play_locked(&mut state).await;
        }
    }

    #[instrument(skip(self))]
    pub async fn seek(&self, position: Duration) {
        let _state = self.begin_command().await;
        match self.backend.seek(position).await {
            Ok(Some(_)) => self.refresh_now_playing().await,
            Ok(None) => debug!("Nothing attached, seek ignored"),
            Err(err) => warn!(error = %err, "Seek failed"),
        }
    }

    // ========================================================================
    // Playlist edits
    // ========================================================================

    pub async fn append(&self, item: Arc<PlayableItem>) {
        let mut state = self.begin_command().await;
        state.playlist.append(item);
        self.playlist_changed(&state);
    }

    pub async fn append_all(&self, items: Vec<Arc<PlayableItem>>) {
        let mut state = self.begin_command().await;
        state.playlist.append_all(items);
        self.playlist_changed(&state);
    }

    /// Insert `items` before `index` (clamped to the end). The cursor stays
    /// on its entry. Returns the index of the first inserted item.
    pub async fn insert(&self, index: usize, items: Vec<Arc<PlayableItem>>) -> usize {
        let mut state = self.begin_command().await;
        let index = state.playlist.insert(index, items);
        self.playlist_changed(&state);
        index
    }

    /// Insert `item` right after the cursor and play it.
    #[instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn insert_and_play(&self, item: Arc<PlayableItem>) {
        let mut state = self.begin_command().await;
        let position = if state.playlist.is_empty() {
            0
        } else {
            state.playlist.current_index() + 1
        };
        let index = state.playlist.insert(position, vec![item]);
        self.playlist_changed(&state);
        self.load(&mut state, index, ErrorReaction::Advance).await;
    }

    /// Remove the entry at `index`.
    ///
    /// Removing the entry that is playing moves playback to the entry that
    /// takes its place, or stops when there is none.
    #[instrument(skip(self))]
    pub async fn remove_at(&self, index: usize) {
        let mut state = self.begin_command().await;
        let Some(removed) = state.playlist.remove_at(index) else {
            debug!(index, "Index out of range, nothing removed");
            return;
        };
        self.playlist_changed(&state);

        if removed.was_current && self.backend.is_active() {
            self.load_or_stop(&mut state, removed.successor, ErrorReaction::Advance)
                .await;
        }
    }

    /// Move the entry at `from` to `to`. Returns false when either index is
    /// out of range.
    pub async fn move_entry(&self, from: usize, to: usize) -> bool {
        let mut state = self.begin_command().await;
        let moved = state.playlist.move_entry(from, to);
        if moved {
            self.playlist_changed(&state);
        }
        moved
    }

    /// Remove every entry, stopping playback if something is attached.
    pub async fn clear(&self) {
        let mut state = self.begin_command().await;
        state.playlist.clear();
        self.playlist_changed(&state);
        if self.backend.is_active() {
            self.stop_locked(&mut state, None).await;
        }
    }

    // ========================================================================
    // Queue settings
    // ========================================================================

    pub async fn set_shuffle(&self, shuffle: bool) {
        let mut state = self.begin_command().await;
        state.playlist.set_shuffle(shuffle);
        self.playlist_changed(&state);
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        let mut state = self.begin_command().await;
        state.playlist.set_repeat_mode(mode);
        self.playlist_changed(&state);
    }

    /// Advance off → all → single → off. Returns the new mode.
    pub async fn cycle_repeat_mode(&self) -> RepeatMode {
        let mut state = self.begin_command().await;
        let mode = state.playlist.repeat_mode().cycled();
        state.playlist.set_repeat_mode(mode);
        self.playlist_changed(&state);
        mode
    }

    pub async fn set_auto_cache(&self, enabled: bool) {
        let mut state = self.begin_command().await;
        state.playlist.set_auto_cache(enabled);
        self.backend.set_auto_cache(enabled);
        self.playlist_changed(&state);
    }

    // ========================================================================
    // Observation and lifecycle
    // ========================================================================

    pub async fn snapshot(&self) -> PlaylistSnapshot {
        self.state.lock().await.playlist.snapshot()
    }

    pub async fn status(&self) -> PlayerStatus {
        let state = self.state.lock().await;
        let active = self.backend.active().await;
        let playlist = &state.playlist;

        let player_state = match &active {
            None => PlayerState::Idle,
            Some(active) if active.playing => PlayerState::Playing,
            Some(_) => PlayerState::Paused,
        };

        PlayerStatus {
            state: player_state,
            current_index: playlist.current_index(),
            current_item: playlist.current_entry().map(|entry| entry.item),
            playlist_len: playlist.len(),
            elapsed: active
                .as_ref()
                .map(|active| active.elapsed)
                .unwrap_or_default(),
            duration: active.as_ref().and_then(|active| active.duration),
            generation: active.as_ref().map(|active| active.generation),
        }
    }

    /// Replace the playlist with a persisted snapshot. Does not start
    /// playback.
    #[instrument(skip(self, snapshot), fields(length = snapshot.items.len()))]
    pub async fn restore(&self, snapshot: PlaylistSnapshot) {
        let mut state = self.begin_command().await;
        state.playlist.restore(snapshot);
        self.backend.set_auto_cache(state.playlist.auto_cache());
        info!(
            current_index = state.playlist.current_index(),
            "Playlist restored"
        );
        self.notifier.broadcast(&PlayerEvent::PlaylistChanged {
            length: state.playlist.len(),
            current_index: state.playlist.current_index(),
        });
    }

    /// Wait until every queued playlist save has been written.
    pub async fn flush_persistence(&self) {
        if let Some(persister) = &self.persister {
            persister.flush().await;
        }
    }

    /// Release the active resource without touching the cursor, save the
    /// final playlist and stop the save task.
    pub async fn shutdown(&self) {
        let state = self.state.lock().await;
        if let Some(item) = self.backend.stop().await {
            debug!(item_id = %item.id, "Released active item for shutdown");
        }
        self.persist(&state);
        drop(state);

        if let Some(persister) = &self.persister {
            persister.shutdown().await;
        }
    }

    // ========================================================================
    // Backend events
    // ========================================================================

    /// Apply one event from the backend channel. Events tagged with a
    /// generation other than the attached one are dropped.
    #[instrument(skip(self, event), fields(generation = event.generation()))]
    pub async fn handle_backend_event(&self, event: BackendEvent) {
        let mut state = self.state.lock().await;
        if !self.backend.is_current(event.generation()) {
            trace!("Discarding stale backend event");
            return;
        }

        match event {
            BackendEvent::Tick {
                elapsed, duration, ..
            } => {
                if !elapsed.is_zero() {
                    state.failure_streak = 0;
                }
                let Some(active) = self.backend.active().await else {
                    return;
                };
                self.notifier.broadcast(&PlayerEvent::ElapsedTimeChanged {
                    item: Arc::clone(&active.entry.item),
                    elapsed,
                    duration,
                });
                self.publish(Some(&active));
            }
            BackendEvent::Finished { .. } => {
                state.failure_streak = 0;
                if state.playlist.repeat_mode() == RepeatMode::Single {
                    let index = state.playlist.current_index();
                    debug!(index, "Repeating current entry");
                    self.load(&mut state, index, ErrorReaction::Advance).await;
                } else {
                    let target = state.playlist.next_index();
                    self.load_or_stop(&mut state, target, ErrorReaction::Advance)
                        .await;
                }
            }
            BackendEvent::Failed { message, .. } => {
                let reaction = self
                    .backend
                    .latest_request()
                    .await
                    .map(|request| request.reaction)
                    .unwrap_or(ErrorReaction::Advance);
                let Some(item) = self.backend.stop().await else {
                    return;
                };
                warn!(item_id = %item.id, error = %message, "Playback failed after start");

                let failed = PlaylistEntry::new(state.playlist.current_index(), item);
                match self.handle_failure(&mut state, &failed, message, reaction) {
                    Some(next) => {
                        self.load_after(&mut state, next, reaction, Some(failed.item))
                            .await
                    }
                    None => self.stop_locked(&mut state, Some(failed.item)).await,
                }
            }
        }
    }

    // ========================================================================
    // Internals (controller lock held)
    // ========================================================================

    async fn begin_command(&self) -> MutexGuard<'_, ControllerState> {
        let mut state = self.state.lock().await;
        state.failure_streak = 0;
        state
    }

    async fn play_locked(&self, state: &mut ControllerState) {
        match self.backend.resume().await {
            Ok(Some(item)) => {
                debug!(item_id = %item.id, "Resumed");
                self.notifier.broadcast(&PlayerEvent::Started(item));
                self.refresh_now_playing().await;
                return;
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "Resume failed, reloading current entry"),
        }

        let index = state.playlist.current_index();
        self.load(state, index, ErrorReaction::Advance).await;
    }

    async fn pause_locked(&self) {
        let event = match self.backend.pause().await {
            Ok(Some(active)) => PlayerEvent::Paused {
                item: Some(Arc::clone(&active.entry.item)),
                elapsed: active.elapsed,
            },
            Ok(None) => PlayerEvent::Paused {
                item: None,
                elapsed: Duration::ZERO,
            },
            Err(err) => {
                warn!(error = %err, "Pause failed");
                return;
            }
        };
        self.notifier.broadcast(&event);
        self.refresh_now_playing().await;
    }

    async fn load_or_stop(
        &self,
        state: &mut ControllerState,
        target: Option<usize>,
        reaction: ErrorReaction,
    ) {
        match target {
            Some(index) => self.load(state, index, reaction).await,
            None => self.stop_locked(state, None).await,
        }
    }

    /// Load the entry at `index`, following `reaction` through failures
    /// until something plays, the reaction gives up or the failure bound is
    /// reached.
    async fn load(&self, state: &mut ControllerState, index: usize, reaction: ErrorReaction) {
        let playing = self
            .backend
            .active()
            .await
            .map(|active| active.entry.item);
        self.load_after(state, index, reaction, playing).await;
    }

    /// [`load`](Self::load) where `playing` is the item attached before the
    /// first attempt. A failed swap releases it, so a resulting stop still
    /// reports it.
    async fn load_after(
        &self,
        state: &mut ControllerState,
        mut index: usize,
        reaction: ErrorReaction,
        playing: Option<Arc<PlayableItem>>,
    ) {
        loop {
            let Some(entry) = state.playlist.entry(index) else {
                debug!(index, len = state.playlist.len(), "No entry to load");
                self.stop_locked(state, playing).await;
                return;
            };
            state.playlist.set_current_index(index);

            let request = PlayRequest::new(entry.clone(), reaction);
            match self.backend.request_to_play(request).await {
                Ok(loaded) => {
                    let requested = self.prefetch.schedule(&state.playlist, loaded.entry.index);
                    trace!(requested, "Prefetch scheduled");
                    self.notifier
                        .broadcast(&PlayerEvent::Started(Arc::clone(&loaded.entry.item)));
                    self.refresh_now_playing().await;
                    self.persist(state);
                    return;
                }
                Err(err) => match self.handle_failure(state, &entry, err.to_string(), reaction) {
                    Some(next) => index = next,
                    None => {
                        self.stop_locked(state, playing).await;
                        return;
                    }
                },
            }
        }
    }

    /// Count a failed load and pick where the reaction goes next.
    fn handle_failure(
        &self,
        state: &mut ControllerState,
        failed: &PlaylistEntry,
        reason: String,
        reaction: ErrorReaction,
    ) -> Option<usize> {
        state.failure_streak += 1;
        self.notifier.broadcast(&PlayerEvent::LoadFailed {
            item: Arc::clone(&failed.item),
            reason,
        });

        let bound = self.settings.failure_bound(state.playlist.len());
        if state.failure_streak >= bound {
            warn!(
                failures = state.failure_streak,
                bound, "Too many consecutive load failures, stopping"
            );
            return None;
        }

        let playlist = &mut state.playlist;
        let target = match reaction {
            ErrorReaction::Advance => playlist.next_index(),
            ErrorReaction::AdvanceToCached => playlist.next_cached_index(failed.index),
            ErrorReaction::Retreat => playlist.previous_index(),
            ErrorReaction::RetreatToCached => playlist.previous_cached_index(failed.index),
            ErrorReaction::Stop => None,
        };
        debug!(failed = failed.index, %reaction, ?target, "Applying error reaction");
        target
    }

    /// Release the backend and reset the cursor. `released` names the item
    /// when the backend already dropped it.
    async fn stop_locked(
        &self,
        state: &mut ControllerState,
        released: Option<Arc<PlayableItem>>,
    ) {
        let item = self.backend.stop().await.or(released);
        state.playlist.reset_cursor();
        match &item {
            Some(item) => info!(item_id = %item.id, "Playback stopped"),
            None => debug!("Stopped with nothing attached"),
        }

        self.notifier.broadcast(&PlayerEvent::Stopped(item));
        self.publish(None);
        self.persist(state);
    }

    fn playlist_changed(&self, state: &ControllerState) {
        self.notifier.broadcast(&PlayerEvent::PlaylistChanged {
            length: state.playlist.len(),
            current_index: state.playlist.current_index(),
        });
        self.persist(state);
    }

    fn persist(&self, state: &ControllerState) {
        if let Some(persister) = &self.persister {
            persister.schedule(state.playlist.snapshot());
        }
    }

    async fn refresh_now_playing(&self) {
        if self.now_playing.is_none() {
            return;
        }
        let active = self.backend.active().await;
        self.publish(active.as_ref());
    }

    fn publish(&self, active: Option<&ActiveSnapshot>) {
        let Some(publisher) = &self.now_playing else {
            return;
        };
        let info = active.map(|active| {
            NowPlayingInfo::from_item(&active.entry.item, active.elapsed, active.playing)
                .with_duration(active.duration)
        });
        publisher.publish(info);
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("backend", &self.backend)
            .field("listeners", &self.notifier.len())
            .field("persistence", &self.persister.is_some())
            .finish()
    }
}
