//! Persisted resources: videos, tracks, annotations and the label/scale templates
//!
//! Every resource carries a [`ResourceMeta`] and a [`SyncState`] and implements
//! [`Persistable`], which is all the sync layer needs to know about it.

mod annotation;
mod category;
mod meta;
mod scale;
mod track;
mod video;

pub use annotation::{Annotation, CategorySnapshot, Comment, LabelSnapshot, ScaleValueSnapshot};
pub use category::{Category, Label};
pub use meta::{format_timestamp, parse_sub, parse_timestamp, value_to_id, Access, ReadySignal, ResourceMeta};
pub use scale::{Scale, ScaleValue, ScaleValues};
pub use track::Track;
pub use video::Video;

use serde_json::Value;

use crate::context::AppContext;
use crate::{AnnotoolError, Result};

/// Raw wire attributes
pub type Attributes = serde_json::Map<String, Value>;

/// Server-assigned identifier
pub type ResourceId = String;

/// Serialization switches for [`Persistable::to_wire`]
#[derive(Debug, Clone, Copy, Default)]
pub struct WireOptions {
    /// Encode `tags`/`settings` as JSON strings
    pub stringify_sub: bool,
}

/// Where a resource lives on the backend and whether it exists there yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Collection path relative to the API base, e.g. `videos/1/tracks`
    pub collection_url: String,
    /// Canonical item path, known once the resource has an id
    pub url: Option<String>,
    /// Never persisted yet
    pub to_create: bool,
    /// Suffix appended to the item path when instantiating from a template
    pub copy_url: Option<String>,
}

impl SyncState {
    pub fn new(collection_url: impl Into<String>) -> Self {
        Self {
            collection_url: collection_url.into().trim_matches('/').to_string(),
            url: None,
            to_create: true,
            copy_url: None,
        }
    }

    pub fn item_url(&self, id: &str) -> String {
        if self.collection_url.is_empty() {
            id.to_string()
        } else {
            format!("{}/{}", self.collection_url, id)
        }
    }

    pub fn recompute_url(&mut self, id: Option<&str>) {
        self.url = id.map(|id| self.item_url(id));
    }
}

/// Behaviour shared by every persisted resource
pub trait Persistable: Sized + Send {
    /// Collection segment used in URLs and as the wrapper key of list responses
    const COLLECTION: &'static str;
    /// Created with PUT instead of POST
    const NO_POST: bool = false;
    /// Always kept in the local store
    const LOCAL_ONLY: bool = false;
    /// Administrators may edit public instances
    const ADMIN_EDITS_PUBLIC: bool = false;

    fn meta(&self) -> &ResourceMeta;
    fn meta_mut(&mut self) -> &mut ResourceMeta;
    fn sync_state(&self) -> &SyncState;
    fn sync_state_mut(&mut self) -> &mut SyncState;

    /// Build from wire attributes. Missing required attributes are contract errors.
    fn from_attributes(attrs: &Attributes, ctx: &AppContext) -> Result<Self>;

    /// Apply the type-specific keys present in `attrs`
    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()>;

    fn write_fields(&self, out: &mut Attributes, opts: WireOptions);

    fn validate_fields(&self, _attrs: &Attributes) -> Option<String> {
        None
    }

    fn id(&self) -> Option<&str> {
        self.meta().id.as_deref()
    }

    /// Attach to the collection at `collection_url`
    fn in_collection(mut self, collection_url: &str) -> Self {
        let id = self.meta().id.clone();
        let state = self.sync_state_mut();
        state.collection_url = collection_url.trim_matches('/').to_string();
        state.recompute_url(id.as_deref());
        self
    }

    /// Wire representation
    fn to_wire(&self, opts: WireOptions) -> Attributes {
        let mut out = Attributes::new();
        self.meta().write_wire(&mut out, opts);
        self.write_fields(&mut out, opts);
        out
    }

    /// Error message for an invalid attribute update, `None` when acceptable
    fn validate(&self, attrs: &Attributes) -> Option<String> {
        self.meta().validate(attrs).or_else(|| self.validate_fields(attrs))
    }

    /// Merge attributes without validation, e.g. a server response
    fn merge(&mut self, attrs: &Attributes, ctx: &AppContext) -> Result<()> {
        self.meta_mut().merge(attrs, ctx.user_id())?;
        self.merge_fields(attrs)?;
        if let Some(id) = self.meta().id.clone() {
            self.sync_state_mut().recompute_url(Some(&id));
        }
        Ok(())
    }

    /// Validate then merge a local attribute update
    fn set(&mut self, attrs: &Attributes, ctx: &AppContext) -> Result<()> {
        if let Some(message) = self.validate(attrs) {
            return Err(AnnotoolError::Validation(message));
        }
        self.merge(attrs, ctx)
    }

    /// The current user may modify this resource
    fn is_editable(&self, ctx: &AppContext) -> bool {
        let meta = self.meta();
        meta.is_mine || (Self::ADMIN_EDITS_PUBLIC && meta.is_public() && ctx.is_admin())
    }
}

/// Shared tail of every `from_attributes`: parse meta and decide persistence state
pub(crate) fn init_resource(attrs: &Attributes, ctx: &AppContext) -> Result<(ResourceMeta, SyncState)> {
    let meta = ResourceMeta::parse(attrs, ctx.user_id())?;
    let mut sync = SyncState::default();
    sync.to_create = meta.id.is_none();
    Ok((meta, sync))
}

pub(crate) fn required<'a>(attrs: &'a Attributes, key: &str, kind: &str) -> Result<&'a Value> {
    match attrs.get(key) {
        Some(Value::Null) | None => Err(AnnotoolError::contract(format!(
            "{kind} requires the '{key}' attribute"
        ))),
        Some(value) => Ok(value),
    }
}

/// Numbers may arrive as strings from form-encoded backends
pub(crate) fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        _ => None,
    }
}

pub(crate) fn opt_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn insert_opt(out: &mut Attributes, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        out.insert(key.to_string(), Value::String(value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Role, User};
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn ctx_for(user: User) -> AppContext {
        AppContext::new(Default::default(), Some(user))
    }

    #[test]
    fn public_category_editable_by_admin_only() {
        let owner = ctx_for(User::new("owner", "Owner"));
        let admin = ctx_for(User::new("admin", "Admin").with_role(Role::Administrator));
        let other = ctx_for(User::new("other", "Other"));

        let raw = attrs(json!({"id": 1, "name": "Emotions", "access": 1, "created_by": "owner"}));
        let as_owner = Category::from_attributes(&raw, &owner).unwrap();
        let as_admin = Category::from_attributes(&raw, &admin).unwrap();
        let as_other = Category::from_attributes(&raw, &other).unwrap();

        assert!(as_owner.is_editable(&owner));
        assert!(as_admin.is_editable(&admin));
        assert!(!as_other.is_editable(&other));
    }

    #[test]
    fn admin_cannot_edit_foreign_tracks() {
        let admin = ctx_for(User::new("admin", "Admin").with_role(Role::Administrator));
        let raw = attrs(json!({"id": 1, "name": "Gestures", "access": 1, "created_by": "someone"}));
        let track = Track::from_attributes(&raw, &admin).unwrap();
        assert!(!track.is_editable(&admin));
    }

    #[test]
    fn set_blocks_invalid_updates() {
        let ctx = AppContext::default();
        let raw = attrs(json!({"id": 4, "start": 1.0, "created_at": "2024-01-01T00:00:00Z"}));
        let mut annotation = Annotation::from_attributes(&raw, &ctx).unwrap();

        let err = annotation
            .set(&attrs(json!({"created_at": "2025-01-01T00:00:00Z"})), &ctx)
            .unwrap_err();
        assert!(matches!(err, AnnotoolError::Validation(_)));

        annotation.set(&attrs(json!({"duration": 2.5})), &ctx).unwrap();
        assert_eq!(annotation.end(), 3.5);
    }

    #[test]
    fn sync_state_tracks_canonical_url() {
        let mut state = SyncState::new("/videos/1/tracks/");
        assert!(state.to_create);
        assert_eq!(state.collection_url, "videos/1/tracks");

        state.recompute_url(Some("5"));
        assert_eq!(state.url.as_deref(), Some("videos/1/tracks/5"));
    }
}
