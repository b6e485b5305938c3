//! # Library Models
//!
//! Library-side entities the playback core refers to but does not own.
//!
//! ## Overview
//!
//! Playable items live in the host's library. The playback core only holds
//! shared references (`Arc<PlayableItem>`) to them, so a download completing
//! elsewhere can flip an item's cached flag and every playlist that contains
//! the item observes the change immediately.
//!
//! This crate also carries the persisted shape of a playlist
//! ([`PlaylistSnapshot`](models::PlaylistSnapshot)) and the display payload
//! pushed to now-playing surfaces ([`NowPlayingInfo`](models::NowPlayingInfo)).

pub mod error;
pub mod models;

pub use error::{LibraryError, Result};
pub use models::{
    ContentType, ItemId, NowPlayingInfo, PlayableItem, PlaylistSnapshot, RepeatMode,
    UNKNOWN_ALBUM, UNKNOWN_ARTIST,
};
