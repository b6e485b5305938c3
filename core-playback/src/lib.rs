//! # Playback Orchestration Module
//!
//! Drives a queue of playable items through a single media engine.
//!
//! ## Overview
//!
//! This module handles:
//! - Playlist state and traversal (repeat modes, shuffle, cached-only skips)
//! - Loading items through the host media engine, one swap at a time
//! - Error reactions that move past unplayable items, with a bounded cascade
//! - Prefetch of upcoming items through the host downloader
//! - Lifecycle notifications to registered listeners
//! - Background persistence of the playlist
//!
//! [`PlaybackController`] is the entry point; the other types are exposed
//! for hosts that want to drive or observe individual pieces.

pub mod backend;
pub mod controller;
pub mod error;
pub mod notifier;
pub mod persistence;
pub mod playlist;
pub mod prefetch;
pub mod request;

pub use backend::{ActiveSnapshot, BackendEvent, BackendEvents, LoadedEntry, PlaybackBackend};
pub use controller::{PlaybackController, PlayerState, PlayerStatus};
pub use error::{PlaybackError, Result};
pub use notifier::{EventBusListener, NotifierRegistry, PlaybackListener, PlayerEvent};
pub use persistence::PlaylistPersister;
pub use playlist::{PlaylistState, RemovedEntry};
pub use prefetch::PrefetchScheduler;
pub use request::{ErrorReaction, PlayRequest, PlaylistEntry};
