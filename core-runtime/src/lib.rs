//! # Core Runtime Module
//!
//! Provides the ambient runtime infrastructure for the playback core:
//! - Configuration (`CoreConfig`, `PlaybackSettings`) with fail-fast validation
//! - Logging and tracing infrastructure
//! - Event bus for asynchronous observers
//!
//! ## Overview
//!
//! Nothing here knows how playback works. This crate establishes the logging
//! conventions, the explicit configuration context and the broadcast channel
//! that the playback and service crates build on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, PlaybackSettings};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream, PlaybackEvent, PlaylistEvent};
