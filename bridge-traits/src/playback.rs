//! Media engine bridge traits and supporting types.
//!
//! The engine is the opaque decode/render pipeline. It holds at most one
//! attached resource at a time; the core's backend decides what gets attached
//! and when, and tags every attachment with a generation number that the
//! engine echoes back on each callback so late callbacks from a replaced
//! resource can be recognised.

use crate::error::Result;
use bytes::Bytes;
use core_library::models::{ItemId, NowPlayingInfo};
use std::sync::Arc;
use std::time::Duration;

use crate::network::StreamLocator;

/// Source handed to the engine for one attachment.
#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Bytes read from the local cache.
    Cached {
        data: Bytes,
        content_type: Option<String>,
    },
    /// Remote stream the engine fetches itself.
    Stream(StreamLocator),
}

impl MediaSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::Stream(_))
    }
}

/// Everything the engine needs to open one resource.
#[derive(Debug, Clone)]
pub struct AttachRequest {
    /// Generation tag to echo back on every callback for this resource
    pub generation: u64,
    /// Item the resource is built from
    pub item_id: ItemId,
    /// Where to read the media from
    pub source: MediaSource,
}

/// Callbacks an engine raises for an attached resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Playback reached the end of the resource.
    Finished { generation: u64 },
    /// The resource could not be opened or playback could not start.
    Failed { generation: u64, message: String },
}

impl MediaEvent {
    pub fn generation(&self) -> u64 {
        match self {
            MediaEvent::Finished { generation } | MediaEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }
}

/// Channel the engine reports asynchronous events through.
///
/// May be called from any thread; implementations only enqueue.
pub trait MediaEventSink: Send + Sync {
    fn notify(&self, event: MediaEvent);
}

/// Platform media engine.
///
/// `attach` replaces whatever the engine currently holds. Errors returned from
/// `attach` or `play` mean the resource cannot be used; failures detected
/// later (a decode error after start) are reported through the sink instead.
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync {
    /// Open the resource described by `request`.
    async fn attach(&self, request: AttachRequest, events: Arc<dyn MediaEventSink>) -> Result<()>;

    /// Begin or resume playback of the attached resource.
    async fn play(&self) -> Result<()>;

    /// Pause playback without releasing the resource.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position within the attached resource.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Current playback position of the attached resource.
    async fn position(&self) -> Result<Duration>;

    /// Total duration of the attached resource, when known.
    async fn duration(&self) -> Option<Duration>;

    /// Release the attached resource.
    async fn detach(&self) -> Result<()>;
}

/// Lock screen / media session display. `None` clears the display.
pub trait NowPlayingPublisher: Send + Sync {
    fn publish(&self, info: Option<NowPlayingInfo>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_source_classification() {
        let cached = MediaSource::Cached {
            data: Bytes::from_static(&[0, 1]),
            content_type: None,
        };
        assert!(!cached.is_remote());

        let remote = MediaSource::Stream(StreamLocator::new("https://example.com/a"));
        assert!(remote.is_remote());
    }

    #[test]
    fn media_event_generation() {
        assert_eq!(MediaEvent::Finished { generation: 4 }.generation(), 4);
        assert_eq!(
            MediaEvent::Failed {
                generation: 9,
                message: "corrupt".into()
            }
            .generation(),
            9
        );
    }
}
