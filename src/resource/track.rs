use serde_json::Value;

use crate::context::AppContext;
use crate::resource::{
    as_i64, init_resource, insert_opt, opt_string, Annotation, Attributes, Persistable,
    ResourceMeta, SyncState, WireOptions,
};
use crate::Result;

/// A named lane of annotations on the timeline
#[derive(Debug, Clone, Default)]
pub struct Track {
    meta: ResourceMeta,
    sync: SyncState,
    pub name: String,
    pub description: Option<String>,
    /// Position among the video's tracks
    pub order: i64,
    /// Currently displayed; never sent to the backend
    pub visible: bool,
    /// Annotation fetch already issued
    pub annotations_loaded: bool,
    pub annotations: Vec<Annotation>,
}

impl Track {
    /// Path of the annotation collection below this track
    pub fn annotations_url(&self) -> Option<String> {
        self.sync.url.as_ref().map(|url| format!("{url}/annotations"))
    }

    /// Annotations overlapping `[start, end)`
    pub fn annotations_between(&self, start: f64, end: f64) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| a.start < end && a.end() >= start)
    }
}

impl Persistable for Track {
    const COLLECTION: &'static str = "tracks";

    fn meta(&self) -> &ResourceMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ResourceMeta {
        &mut self.meta
    }

    fn sync_state(&self) -> &SyncState {
        &self.sync
    }

    fn sync_state_mut(&mut self) -> &mut SyncState {
        &mut self.sync
    }

    fn from_attributes(attrs: &Attributes, ctx: &AppContext) -> Result<Self> {
        let (meta, sync) = init_resource(attrs, ctx)?;
        let mut track = Self {
            meta,
            sync,
            ..Default::default()
        };
        track.merge_fields(attrs)?;
        Ok(track)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(value) = attrs.get("name") {
            self.name = opt_string(value).unwrap_or_default();
        }
        if let Some(value) = attrs.get("description") {
            self.description = opt_string(value);
        }
        if let Some(order) = attrs.get("order").and_then(as_i64) {
            self.order = order;
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        out.insert("name".into(), Value::String(self.name.clone()));
        insert_opt(out, "description", &self.description);
        out.insert("order".into(), Value::from(self.order));
    }

    fn validate_fields(&self, attrs: &Attributes) -> Option<String> {
        match attrs.get("order") {
            Some(value) if as_i64(value).is_none() => Some("'order' must be an integer".to_string()),
            _ => None,
        }
    }
}
