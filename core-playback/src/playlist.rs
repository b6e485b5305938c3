//! # Playlist State
//!
//! Ordered queue of playable items plus the cursor and queue settings.
//!
//! Pure data and traversal; no I/O. The controller is the only writer.
//!
//! ## Invariants
//!
//! - Non-empty: `0 <= current_index < len`.
//! - Empty: `current_index == 0` and every traversal query returns `None`.
//! - Edits keep the cursor on the entry it pointed at whenever that entry
//!   survives the edit.

use crate::request::PlaylistEntry;
use core_library::models::{PlayableItem, PlaylistSnapshot, RepeatMode};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Arc;

/// Outcome of removing an entry.
#[derive(Debug, Clone)]
pub struct RemovedEntry {
    /// The item that was removed
    pub item: Arc<PlayableItem>,
    /// Whether the removed entry was under the cursor
    pub was_current: bool,
    /// When the current entry was removed: index of the entry that now
    /// follows it (the one that slid into its place, or the first entry when
    /// the last one was removed and the playlist wraps)
    pub successor: Option<usize>,
}

pub struct PlaylistState {
    items: Vec<Arc<PlayableItem>>,
    current_index: usize,
    shuffle: bool,
    repeat_mode: RepeatMode,
    auto_cache: bool,
    rng: StdRng,
}

impl std::fmt::Debug for PlaylistState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistState")
            .field("len", &self.items.len())
            .field("current_index", &self.current_index)
            .field("shuffle", &self.shuffle)
            .field("repeat_mode", &self.repeat_mode)
            .field("auto_cache", &self.auto_cache)
            .finish()
    }
}

impl Default for PlaylistState {
    fn default() -> Self {
        Self::new(false)
    }
}

impl PlaylistState {
    pub fn new(auto_cache: bool) -> Self {
        Self::with_rng(auto_cache, StdRng::from_entropy())
    }

    /// Deterministic shuffle draws.
    pub fn with_seed(auto_cache: bool, seed: u64) -> Self {
        Self::with_rng(auto_cache, StdRng::seed_from_u64(seed))
    }

    /// Restart shuffle draws from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    fn with_rng(auto_cache: bool, rng: StdRng) -> Self {
        Self {
            items: Vec::new(),
            current_index: 0,
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            auto_cache,
            rng,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Arc<PlayableItem>] {
        &self.items
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn entry(&self, index: usize) -> Option<PlaylistEntry> {
        self.items
            .get(index)
            .map(|item| PlaylistEntry::new(index, Arc::clone(item)))
    }

    pub fn current_entry(&self) -> Option<PlaylistEntry> {
        self.entry(self.current_index)
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    pub fn auto_cache(&self) -> bool {
        self.auto_cache
    }

    // ========================================================================
    // Cursor and settings
    // ========================================================================

    /// Move the cursor. Out-of-range indices are ignored.
    pub fn set_current_index(&mut self, index: usize) -> bool {
        if index < self.items.len() {
            self.current_index = index;
            true
        } else {
            false
        }
    }

    pub fn reset_cursor(&mut self) {
        self.current_index = 0;
    }

    pub fn set_shuffle(&mut self, shuffle: bool) {
        self.shuffle = shuffle;
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    pub fn set_auto_cache(&mut self, auto_cache: bool) {
        self.auto_cache = auto_cache;
    }

    // ========================================================================
    // Edits
    // ========================================================================

    pub fn append(&mut self, item: Arc<PlayableItem>) {
        self.items.push(item);
    }

    pub fn append_all(&mut self, items: impl IntoIterator<Item = Arc<PlayableItem>>) {
        self.items.extend(items);
    }

    /// Insert `items` before position `index` (clamped to the end).
    ///
    /// Returns the index the first inserted item landed at.
    pub fn insert(&mut self, index: usize, items: Vec<Arc<PlayableItem>>) -> usize {
        let index = index.min(self.items.len());
        let count = items.len();
        let was_empty = self.items.is_empty();

        self.items.splice(index..index, items);

        if !was_empty && index <= self.current_index {
            self.current_index += count;
        }
        index
    }

    /// Remove the entry at `index`. Out-of-range indices are ignored.
    pub fn remove_at(&mut self, index: usize) -> Option<RemovedEntry> {
        if index >= self.items.len() {
            return None;
        }

        let item = self.items.remove(index);
        let len = self.items.len();

        if index < self.current_index {
            self.current_index -= 1;
            return Some(RemovedEntry {
                item,
                was_current: false,
                successor: None,
            });
        }

        if index > self.current_index {
            return Some(RemovedEntry {
                item,
                was_current: false,
                successor: None,
            });
        }

        let successor = if self.current_index < len {
            Some(self.current_index)
        } else if len > 0 && self.wraps() {
            Some(0)
        } else {
            None
        };

        self.current_index = successor.unwrap_or_else(|| len.saturating_sub(1));

        Some(RemovedEntry {
            item,
            was_current: true,
            successor,
        })
    }

    /// Move the entry at `from` so it ends up at `to`. The cursor follows the
    /// entry it pointed at.
    pub fn move_entry(&mut self, from: usize, to: usize) -> bool {
        let len = self.items.len();
        if from >= len || to >= len {
            return false;
        }
        if from == to {
            return true;
        }

        let item = self.items.remove(from);
        self.items.insert(to, item);

        let current = self.current_index;
        self.current_index = if current == from {
            to
        } else if from < current && to >= current {
            current - 1
        } else if from > current && to <= current {
            current + 1
        } else {
            current
        };
        true
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.current_index = 0;
    }

    // ========================================================================
    // Traversal
    // ========================================================================

    /// Whether traversal wraps at the ends. Single-repeat wraps like
    /// repeat-all so an explicit skip never dead-ends.
    fn wraps(&self) -> bool {
        matches!(self.repeat_mode, RepeatMode::All | RepeatMode::Single)
    }

    /// Index to play after the current one, or `None` at the end of a
    /// non-wrapping playlist.
    ///
    /// With shuffle on every call draws independently from all entries other
    /// than the current one.
    pub fn next_index(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        if self.shuffle {
            return self.random_other_index();
        }

        let candidate = self.current_index + 1;
        if candidate < len {
            Some(candidate)
        } else if self.wraps() {
            Some(0)
        } else {
            None
        }
    }

    /// Index to play before the current one.
    pub fn previous_index(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        if self.shuffle {
            return self.random_other_index();
        }

        if self.current_index > 0 {
            Some(self.current_index - 1)
        } else if self.wraps() {
            Some(len - 1)
        } else {
            None
        }
    }

    fn random_other_index(&mut self) -> Option<usize> {
        let len = self.items.len();
        if len == 1 {
            return self.wraps().then_some(0);
        }
        // Draw from the len - 1 other slots, then skip over the cursor
        let pick = self.rng.gen_range(0..len - 1);
        Some(if pick >= self.current_index {
            pick + 1
        } else {
            pick
        })
    }

    /// First cached entry after `from` (exclusive), wrapping only under
    /// repeat-all. Visits each position at most once.
    pub fn next_cached_index(&self, from: usize) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        let from = from.min(len - 1);
        let wrap = self.repeat_mode == RepeatMode::All;

        (1..=len)
            .map_while(|step| {
                let raw = from + step;
                if raw < len {
                    Some(raw)
                } else if wrap {
                    Some(raw - len)
                } else {
                    None
                }
            })
            .find(|&index| self.items[index].is_cached())
    }

    /// Last cached entry before `from` (exclusive), wrapping only under
    /// repeat-all. Visits each position at most once.
    pub fn previous_cached_index(&self, from: usize) -> Option<usize> {
        let len = self.items.len();
        if len == 0 {
            return None;
        }
        let from = from.min(len - 1);
        let wrap = self.repeat_mode == RepeatMode::All;

        (1..=len)
            .map_while(|step| {
                if step <= from {
                    Some(from - step)
                } else if wrap {
                    Some(len + from - step)
                } else {
                    None
                }
            })
            .find(|&index| self.items[index].is_cached())
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn snapshot(&self) -> PlaylistSnapshot {
        PlaylistSnapshot {
            items: self.items.clone(),
            current_index: self.current_index,
            shuffle: self.shuffle,
            repeat_mode: self.repeat_mode,
            auto_cache: self.auto_cache,
        }
    }

    /// Replace the whole state with a persisted snapshot, clamping the cursor.
    pub fn restore(&mut self, snapshot: PlaylistSnapshot) {
        let len = snapshot.items.len();
        self.items = snapshot.items;
        self.current_index = if len == 0 {
            0
        } else {
            snapshot.current_index.min(len - 1)
        };
        self.shuffle = snapshot.shuffle;
        self.repeat_mode = snapshot.repeat_mode;
        self.auto_cache = snapshot.auto_cache;
    }
}
