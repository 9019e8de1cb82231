//! Tracks module for annotool
//!
//! Keeps every track of a video, decides which of them are visible and loads
//! annotations only for those.

mod collection;

pub use collection::Tracks;

use async_trait::async_trait;

use crate::resource::{Annotation, ResourceId, Track};
use crate::Result;

/// Loads the annotations of a track
#[async_trait]
pub trait AnnotationSource: Send + Sync {
    async fn load_annotations(&self, track: &Track) -> Result<Vec<Annotation>>;
}

/// Notifications emitted by [`Tracks`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracksEvent {
    /// Ids of the visible tracks, in display order
    Visibility(Vec<ResourceId>),
    /// The track selected for annotating changed
    Selected(Option<ResourceId>),
}
