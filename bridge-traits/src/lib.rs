//! # Host Bridge Traits
//!
//! Collaborator traits the playback core depends on but never implements.
//!
//! ## Overview
//!
//! The playback core is purely the decision and state layer between "what
//! should be playing" and "make it so". Everything that touches bytes, disks,
//! networks or the audio device lives behind one of these traits and is
//! supplied by the host application.
//!
//! ## Traits
//!
//! ### Media
//! - [`MediaEngine`](playback::MediaEngine) - Opaque decode/render pipeline holding one attached resource
//! - [`MediaEventSink`](playback::MediaEventSink) - Callback channel the engine reports completion/failure through
//! - [`NowPlayingPublisher`](playback::NowPlayingPublisher) - Lock screen / media session display
//!
//! ### Sources
//! - [`CacheStore`](storage::CacheStore) - Synchronous lookup of cached item bytes
//! - [`StreamResolver`](network::StreamResolver) - Streaming locator for uncached items
//! - [`Downloader`](network::Downloader) - Fire-and-forget, idempotent background caching
//!
//! ### Persistence & Utilities
//! - [`PlaylistStore`](storage::PlaylistStore) - Load-at-start / save-on-change playlist state
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All fallible bridge operations use [`BridgeError`](error::BridgeError).
//! The core never surfaces these to its callers; a failing bridge degrades
//! to "not cached", "cannot stream" or "not persisted".
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync`; the core shares them as
//! `Arc<dyn Trait>` across the control task, the event pump and the tick task.

pub mod error;
pub mod logging;
pub mod network;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use network::{DownloadPriority, Downloader, StreamLocator, StreamResolver};
pub use playback::{
    AttachRequest, MediaEngine, MediaEvent, MediaEventSink, MediaSource, NowPlayingPublisher,
};
pub use storage::{CacheStore, CachedFile, CachedFileMetadata, PlaylistStore};
