use serde_json::Value;

use crate::context::AppContext;
use crate::resource::{
    init_resource, insert_opt, opt_string, Attributes, Persistable, ResourceMeta, SyncState,
    WireOptions,
};
use crate::Result;

/// The annotated media
#[derive(Debug, Clone, Default)]
pub struct Video {
    meta: ResourceMeta,
    sync: SyncState,
    /// Id of the media in the hosting platform
    pub video_extid: Option<String>,
    pub title: Option<String>,
    pub src_owner: Option<String>,
}

impl Video {
    /// Path of the track collection below this video
    pub fn tracks_url(&self) -> Option<String> {
        self.sync.url.as_ref().map(|url| format!("{url}/tracks"))
    }

    pub fn categories_url(&self) -> Option<String> {
        self.sync.url.as_ref().map(|url| format!("{url}/categories"))
    }
}

impl Persistable for Video {
    const COLLECTION: &'static str = "videos";
    // Videos are addressed by their external id and upserted.
    const NO_POST: bool = true;

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
        let mut video = Self {
            meta,
            sync,
            ..Default::default()
        };
        video.merge_fields(attrs)?;
        Ok(video)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(value) = attrs.get("video_extid") {
            self.video_extid = opt_string(value);
        }
        if let Some(value) = attrs.get("title") {
            self.title = opt_string(value);
        }
        if let Some(value) = attrs.get("src_owner") {
            self.src_owner = opt_string(value);
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        insert_opt(out, "video_extid", &self.video_extid);
        insert_opt(out, "title", &self.title);
        insert_opt(out, "src_owner", &self.src_owner);
    }

    fn validate_fields(&self, attrs: &Attributes) -> Option<String> {
        match attrs.get("video_extid") {
            Some(Value::String(s)) if s.trim().is_empty() => {
                Some("'video_extid' must not be empty".to_string())
            }
            _ => None,
        }
    }
}
