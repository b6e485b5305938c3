//! # Playback Error Types
//!
//! Errors raised while loading and driving the active item.
//!
//! None of these escape the controller's command surface: a failed load is
//! answered with the request's error reaction, and everything else degrades
//! to a logged warning or a stop.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Item Errors
    // ========================================================================
    /// Item cannot be decoded on this platform, or its encoding is corrupt.
    #[error("Item not playable: {0}")]
    ItemNotPlayable(String),

    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Neither the cache nor the streaming resolver could supply the item.
    #[error("Media source unavailable: {0}")]
    SourceUnavailable(String),

    /// Item is flagged cached but the cache returned nothing.
    #[error("Cache miss: {0}")]
    CacheMiss(String),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// The media engine refused to open or start the resource.
    #[error("Media engine error: {0}")]
    EngineError(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Error reported by a host bridge.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if the item itself cannot be played, regardless of source.
    pub fn is_playability_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::ItemNotPlayable(_) | PlaybackError::EngineError(_)
        )
    }

    /// Returns `true` if the failure came from locating the item's bytes.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceUnavailable(_)
                | PlaybackError::CacheMiss(_)
                | PlaybackError::Bridge(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
