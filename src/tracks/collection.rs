//! Track collection and visibility policy

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::context::AppContext;
use crate::resource::{Persistable, ResourceId, Track};
use crate::sync::SyncDispatcher;
use crate::tracks::{AnnotationSource, TracksEvent};
use crate::{AnnotoolError, Result};

const EVENT_CAPACITY: usize = 64;

/// All tracks of one video.
///
/// At most `max_visible` tracks are visible at once and each visible track
/// has its annotations loaded, fetched once per track.
pub struct Tracks {
    ctx: Arc<AppContext>,
    source: Arc<dyn AnnotationSource>,
    collection_url: String,
    tracks: Vec<Track>,
    visible: Vec<ResourceId>,
    selected: Option<ResourceId>,
    max_visible: usize,
    events: broadcast::Sender<TracksEvent>,
}

impl Tracks {
    pub fn new(
        ctx: Arc<AppContext>,
        source: Arc<dyn AnnotationSource>,
        collection_url: impl Into<String>,
    ) -> Self {
        let max_visible = ctx.settings.tracks.visible_cap();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            ctx,
            source,
            collection_url: collection_url.into().trim_matches('/').to_string(),
            tracks: Vec::new(),
            visible: Vec::new(),
            selected: None,
            max_visible,
            events,
        }
    }

    /// Override the configured visible-track cap
    pub fn with_max_visible(mut self, max_visible: usize) -> Self {
        self.max_visible = max_visible;
        self
    }

    pub fn max_visible(&self) -> usize {
        self.max_visible
    }

    pub fn collection_url(&self) -> &str {
        &self.collection_url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TracksEvent> {
        self.events.subscribe()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == Some(id))
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.id() == Some(id))
    }

    /// Ids of the visible tracks in display order
    pub fn visible_tracks(&self) -> &[ResourceId] {
        &self.visible
    }

    pub fn visible(&self) -> impl Iterator<Item = &Track> {
        self.visible.iter().filter_map(|id| self.get(id))
    }

    pub fn selected(&self) -> Option<&Track> {
        self.selected.as_deref().and_then(|id| self.get(id))
    }

    /// Replace the whole collection; nothing is visible afterwards
    pub fn reset(&mut self, tracks: Vec<Track>) {
        let hidden = std::mem::take(&mut self.visible);
        self.tracks.clear();
        self.selected = None;

        for track in tracks {
            if track.id().is_none() {
                warn!(name = %track.name, "skipping track without id");
                continue;
            }
            self.tracks.push(track.in_collection(&self.collection_url));
        }
        self.tracks.sort_by_key(|t| t.order);

        for track in &mut self.tracks {
            track.visible = false;
        }
        if !hidden.is_empty() {
            self.emit(TracksEvent::Visibility(Vec::new()));
        }
    }

    /// Load every track of the video from the backend
    pub async fn fetch(&mut self, dispatcher: &SyncDispatcher) -> Result<usize> {
        let tracks = dispatcher.fetch_all::<Track>(&self.collection_url).await?;
        self.reset(tracks);
        debug!(count = self.tracks.len(), "tracks loaded");
        Ok(self.tracks.len())
    }

    /// Insert a persisted track. Tracks of the current user are shown right away.
    pub async fn add(&mut self, track: Track) -> Result<()> {
        let id = track
            .id()
            .map(str::to_string)
            .ok_or_else(|| AnnotoolError::contract("only saved tracks can be added"))?;
        if self.get(&id).is_some() {
            return Err(AnnotoolError::contract(format!("track {id} is already in the collection")));
        }

        let mine = track.meta().is_mine;
        self.tracks.push(track.in_collection(&self.collection_url));

        if mine {
            self.show_tracks(Some(std::slice::from_ref(&id)), true).await;
        }
        Ok(())
    }

    /// Hide and drop a track
    pub fn remove(&mut self, id: &str) -> Option<Track> {
        let index = self.tracks.iter().position(|t| t.id() == Some(id))?;
        if self.visible.iter().any(|v| v == id) {
            self.hide_tracks(&[id.to_string()]);
        }
        Some(self.tracks.remove(index))
    }

    /// Show the initial set: the user's own tracks, else the first track
    pub async fn show_initial(&mut self) {
        let mut ids: Vec<ResourceId> = self
            .tracks
            .iter()
            .filter(|t| t.meta().is_mine)
            .filter_map(|t| t.id().map(str::to_string))
            .collect();
        if ids.is_empty() {
            ids.extend(self.tracks.first().and_then(|t| t.id()).map(str::to_string));
        }
        self.show_tracks(Some(ids.as_slice()), false).await;
    }

    /// Make `tracks` visible, hiding what no longer fits.
    ///
    /// Requests beyond the cap are cut from the tail. With `keep_previous`,
    /// already visible tracks stay as long as there is room for them.
    pub async fn show_tracks(&mut self, tracks: Option<&[ResourceId]>, keep_previous: bool) {
        let Some(requested) = tracks else {
            return;
        };

        let mut wanted: Vec<ResourceId> = Vec::with_capacity(requested.len());
        for id in requested {
            if self.get(id).is_none() {
                debug!(id = %id, "ignoring unknown track");
                continue;
            }
            if !wanted.contains(id) {
                wanted.push(id.clone());
            }
        }

        if wanted.len() > self.max_visible {
            warn!(
                requested = wanted.len(),
                max = self.max_visible,
                "more tracks requested than can be visible, dropping the tail"
            );
            wanted.truncate(self.max_visible);
        }

        let mut next: Vec<ResourceId> = Vec::with_capacity(wanted.len());
        if keep_previous && wanted.len() < self.max_visible {
            let room = self.max_visible - wanted.len();
            next.extend(
                self.visible
                    .iter()
                    .filter(|id| !wanted.contains(id))
                    .take(room)
                    .cloned(),
            );
        }
        next.extend(wanted);

        let to_hide: Vec<ResourceId> = self
            .visible
            .iter()
            .filter(|id| !next.contains(id))
            .cloned()
            .collect();
        self.hide_quietly(&to_hide);

        // Display order follows `next`, including tracks that stay visible.
        let previous = std::mem::take(&mut self.visible);
        for id in next {
            if !previous.contains(&id) {
                self.load_annotations(&id).await;
                if let Some(track) = self.get_mut(&id) {
                    track.visible = true;
                }
            }
            self.visible.push(id);
        }

        self.settle_selection();
        self.emit(TracksEvent::Visibility(self.visible.clone()));
    }

    /// Resolve ids first; unknown ids are reported and skipped
    pub async fn show_tracks_by_id(&mut self, ids: &[ResourceId]) {
        let resolved: Vec<ResourceId> = ids
            .iter()
            .filter(|id| {
                let known = self.get(id).is_some();
                if !known {
                    warn!(id = %id, "no track with this id");
                }
                known
            })
            .cloned()
            .collect();
        self.show_tracks(Some(resolved.as_slice()), false).await;
    }

    /// Hide the given tracks; ids that are not visible are ignored
    pub fn hide_tracks(&mut self, ids: &[ResourceId]) {
        self.hide_quietly(ids);
        self.settle_selection();
        self.emit(TracksEvent::Visibility(self.visible.clone()));
    }

    /// Select a visible track for annotating
    pub fn select(&mut self, id: &str) -> Result<()> {
        if !self.visible.iter().any(|v| v == id) {
            return Err(AnnotoolError::NotFound(format!("visible track {id}")));
        }
        if self.selected.as_deref() != Some(id) {
            self.selected = Some(id.to_string());
            self.emit(TracksEvent::Selected(self.selected.clone()));
        }
        Ok(())
    }

    fn hide_quietly(&mut self, ids: &[ResourceId]) {
        for id in ids {
            let Some(position) = self.visible.iter().position(|v| v == id) else {
                continue;
            };
            self.visible.remove(position);
            if let Some(track) = self.get_mut(id) {
                track.visible = false;
            }
        }
    }

    /// Fetch annotations of a track unless that already happened
    async fn load_annotations(&mut self, id: &str) {
        let source = Arc::clone(&self.source);
        let Some(track) = self.get_mut(id) else {
            return;
        };
        if track.annotations_loaded {
            return;
        }
        track.annotations_loaded = true;

        let Some(track) = self.get(id) else {
            return;
        };
        match source.load_annotations(track).await {
            Ok(annotations) => {
                debug!(track = id, count = annotations.len(), "annotations loaded");
                if let Some(track) = self.get_mut(id) {
                    track.annotations = annotations;
                }
            }
            Err(e) => {
                warn!(track = id, "failed to load annotations: {}", e);
                if let Some(track) = self.get_mut(id) {
                    track.annotations_loaded = false;
                }
            }
        }
    }

    /// Keep the selected track among the visible ones
    fn settle_selection(&mut self) {
        let still_visible = self
            .selected
            .as_ref()
            .is_some_and(|id| self.visible.contains(id));
        if still_visible {
            return;
        }

        let next = self
            .visible
            .iter()
            .find(|id| self.get(id).is_some_and(|t| t.is_editable(&self.ctx)))
            .cloned();

        if next != self.selected {
            self.selected = next;
            self.emit(TracksEvent::Selected(self.selected.clone()));
        }
    }

    fn emit(&self, event: TracksEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
