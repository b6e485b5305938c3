//! Load requests and the error reactions they carry.

use core_library::models::PlayableItem;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A playable item at a specific queue position.
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub index: usize,
    pub item: Arc<PlayableItem>,
}

impl PlaylistEntry {
    pub fn new(index: usize, item: Arc<PlayableItem>) -> Self {
        Self { index, item }
    }
}

/// Navigation applied when a load fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorReaction {
    /// Move to the previous entry
    Retreat,
    /// Move to the previous cached entry
    RetreatToCached,
    /// Move to the next entry
    Advance,
    /// Move to the next cached entry
    AdvanceToCached,
    /// Give up and stop
    Stop,
}

impl fmt::Display for ErrorReaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorReaction::Retreat => "retreat",
            ErrorReaction::RetreatToCached => "retreat_to_cached",
            ErrorReaction::Advance => "advance",
            ErrorReaction::AdvanceToCached => "advance_to_cached",
            ErrorReaction::Stop => "stop",
        };
        f.write_str(name)
    }
}

/// One load attempt: the target entry plus what to do if it fails.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub entry: PlaylistEntry,
    pub reaction: ErrorReaction,
}

impl PlayRequest {
    pub fn new(entry: PlaylistEntry, reaction: ErrorReaction) -> Self {
        Self { entry, reaction }
    }
}
