use serde_json::Value;

use crate::context::AppContext;
use crate::resource::{
    as_bool, init_resource, insert_opt, opt_string, required, value_to_id, Attributes, CategorySnapshot,
    LabelSnapshot, Persistable, ResourceId, ResourceMeta, SyncState, WireOptions,
};
use crate::{AnnotoolError, Result};

/// Group of labels, optionally rated on a scale.
///
/// Categories without a video are templates and get copied on first use.
#[derive(Debug, Clone, Default)]
pub struct Category {
    meta: ResourceMeta,
    sync: SyncState,
    pub name: String,
    pub description: Option<String>,
    pub video_id: Option<ResourceId>,
    pub scale_id: Option<ResourceId>,
    pub labels: Vec<Label>,
}

impl Category {
    /// Not bound to a video yet
    pub fn is_template(&self) -> bool {
        self.video_id.is_none()
    }

    /// Color and scale flag are kept in the settings map
    pub fn color(&self) -> Option<&str> {
        self.meta.setting("color").and_then(Value::as_str)
    }

    pub fn set_color(&mut self, color: &str) {
        self.meta.set_setting("color", Value::String(color.to_string()));
    }

    pub fn has_scale(&self) -> bool {
        self.meta
            .setting("hasScale")
            .and_then(as_bool)
            .unwrap_or(false)
    }

    pub fn labels_url(&self) -> Option<String> {
        self.sync.url.as_ref().map(|url| format!("{url}/labels"))
    }

    /// Unsaved copy of a template, to be created below `collection_url`
    pub fn copy_of(template: &Category, collection_url: &str) -> Result<Self> {
        let template_id = template
            .meta
            .id
            .clone()
            .ok_or_else(|| AnnotoolError::contract("only persisted categories can be copied"))?;

        let mut copy = template.clone();
        copy.meta = template.meta.fork();
        copy.labels.clear();
        copy.sync = SyncState::new(collection_url);
        copy.sync.copy_url = Some("/copy".to_string());
        copy.sync.recompute_url(Some(&template_id));
        Ok(copy)
    }

    pub fn snapshot(&self) -> CategorySnapshot {
        CategorySnapshot {
            id: self.meta.id.clone(),
            name: self.name.clone(),
            color: self.color().map(str::to_string),
            scale_id: self.scale_id.clone(),
        }
    }
}

impl Persistable for Category {
    const COLLECTION: &'static str = "categories";
    const ADMIN_EDITS_PUBLIC: bool = true;

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
        required(attrs, "name", "Category")?;
        let (meta, sync) = init_resource(attrs, ctx)?;
        let mut category = Self {
            meta,
            sync,
            ..Default::default()
        };
        category.merge_fields(attrs)?;
        Ok(category)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(value) = attrs.get("name") {
            self.name = opt_string(value).unwrap_or_default();
        }
        if let Some(value) = attrs.get("description") {
            self.description = opt_string(value);
        }
        if let Some(value) = attrs.get("video_id") {
            self.video_id = value_to_id(value);
        }
        if let Some(value) = attrs.get("scale_id") {
            self.scale_id = value_to_id(value);
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        out.insert("name".into(), Value::String(self.name.clone()));
        insert_opt(out, "description", &self.description);
        insert_opt(out, "video_id", &self.video_id);
        insert_opt(out, "scale_id", &self.scale_id);
    }

    fn validate_fields(&self, attrs: &Attributes) -> Option<String> {
        match attrs.get("name") {
            Some(Value::String(s)) if s.trim().is_empty() => {
                Some("'name' attribute must not be empty".to_string())
            }
            _ => None,
        }
    }
}

/// Entry of a category that annotations can carry
#[derive(Debug, Clone, Default)]
pub struct Label {
    meta: ResourceMeta,
    sync: SyncState,
    pub value: String,
    pub abbreviation: Option<String>,
    pub description: Option<String>,
    pub category_id: ResourceId,
}

impl Label {
    /// Denormalized copy stored on annotations
    pub fn snapshot(&self, category: &Category) -> LabelSnapshot {
        LabelSnapshot {
            id: self.meta.id.clone(),
            value: self.value.clone(),
            abbreviation: self.abbreviation.clone(),
            category: category.snapshot(),
        }
    }
}

impl Persistable for Label {
    const COLLECTION: &'static str = "labels";
    const ADMIN_EDITS_PUBLIC: bool = true;

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
        // The category arrives either as a nested object or as a bare id.
        let category_id = attrs
            .get("category")
            .and_then(|c| c.get("id").or(Some(c)))
            .and_then(value_to_id)
            .or_else(|| attrs.get("category_id").and_then(value_to_id))
            .ok_or_else(|| AnnotoolError::contract("Label requires a category"))?;

        let (meta, sync) = init_resource(attrs, ctx)?;
        let mut label = Self {
            meta,
            sync,
            category_id,
            ..Default::default()
        };
        label.merge_fields(attrs)?;
        Ok(label)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(value) = attrs.get("value") {
            self.value = opt_string(value).unwrap_or_default();
        }
        if let Some(value) = attrs.get("abbreviation") {
            self.abbreviation = opt_string(value);
        }
        if let Some(value) = attrs.get("description") {
            self.description = opt_string(value);
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        out.insert("value".into(), Value::String(self.value.clone()));
        insert_opt(out, "abbreviation", &self.abbreviation);
        insert_opt(out, "description", &self.description);
        out.insert("category_id".into(), Value::String(self.category_id.clone()));
    }
}
