use serde_json::Value;

use crate::context::AppContext;
use crate::resource::{
    as_f64, as_i64, init_resource, insert_opt, opt_string, required, value_to_id, Attributes,
    Persistable, ResourceId, ResourceMeta, ScaleValueSnapshot, SyncState, WireOptions,
};
use crate::Result;

/// Ordered rating vocabulary attachable to a category
#[derive(Debug, Clone, Default)]
pub struct Scale {
    meta: ResourceMeta,
    sync: SyncState,
    pub name: String,
    pub description: Option<String>,
    pub values: ScaleValues,
}

impl Scale {
    pub fn scalevalues_url(&self) -> Option<String> {
        self.sync.url.as_ref().map(|url| format!("{url}/scalevalues"))
    }
}

impl Persistable for Scale {
    const COLLECTION: &'static str = "scales";
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
        required(attrs, "name", "Scale")?;
        let (meta, sync) = init_resource(attrs, ctx)?;
        let mut scale = Self {
            meta,
            sync,
            ..Default::default()
        };
        scale.merge_fields(attrs)?;
        Ok(scale)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(value) = attrs.get("name") {
            self.name = opt_string(value).unwrap_or_default();
        }
        if let Some(value) = attrs.get("description") {
            self.description = opt_string(value);
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        out.insert("name".into(), Value::String(self.name.clone()));
        insert_opt(out, "description", &self.description);
    }
}

/// One step of a scale
#[derive(Debug, Clone, Default)]
pub struct ScaleValue {
    meta: ResourceMeta,
    sync: SyncState,
    pub name: String,
    pub value: f64,
    pub order: i64,
    pub scale_id: Option<ResourceId>,
}

impl ScaleValue {
    pub fn snapshot(&self) -> ScaleValueSnapshot {
        ScaleValueSnapshot {
            id: self.meta.id.clone(),
            name: self.name.clone(),
            value: self.value,
            order: self.order,
        }
    }
}

impl Persistable for ScaleValue {
    const COLLECTION: &'static str = "scalevalues";
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
        required(attrs, "name", "ScaleValue")?;
        let (meta, sync) = init_resource(attrs, ctx)?;
        let mut scale_value = Self {
            meta,
            sync,
            ..Default::default()
        };
        scale_value.merge_fields(attrs)?;
        Ok(scale_value)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(value) = attrs.get("name") {
            self.name = opt_string(value).unwrap_or_default();
        }
        if let Some(value) = attrs.get("value").and_then(as_f64) {
            self.value = value;
        }
        if let Some(order) = attrs.get("order").and_then(as_i64) {
            self.order = order;
        }
        if let Some(value) = attrs.get("scale_id") {
            self.scale_id = value_to_id(value);
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        out.insert("name".into(), Value::String(self.name.clone()));
        out.insert("value".into(), Value::from(self.value));
        out.insert("order".into(), Value::from(self.order));
        insert_opt(out, "scale_id", &self.scale_id);
    }

    fn validate_fields(&self, attrs: &Attributes) -> Option<String> {
        if let Some(value) = attrs.get("value") {
            if as_f64(value).is_none() {
                return Some("'value' attribute must be a number".to_string());
            }
        }
        match attrs.get("order") {
            Some(value) if as_i64(value).is_none() => Some("'order' attribute must be an integer".to_string()),
            _ => None,
        }
    }
}

/// Scale values kept sorted by `order`.
///
/// Reordering swaps neighbours; only removal re-indexes the tail. Every
/// mutation returns the positions whose `order` changed and need saving.
#[derive(Debug, Clone, Default)]
pub struct ScaleValues {
    items: Vec<ScaleValue>,
}

impl ScaleValues {
    pub fn new(mut items: Vec<ScaleValue>) -> Self {
        items.sort_by_key(|v| v.order);
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ScaleValue> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ScaleValue> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScaleValue> {
        self.items.iter()
    }

    /// Append with the next free order
    pub fn push(&mut self, mut value: ScaleValue) -> usize {
        value.order = self.items.last().map_or(0, |last| last.order + 1);
        self.items.push(value);
        self.items.len() - 1
    }

    pub fn move_up(&mut self, index: usize) -> Vec<usize> {
        if index == 0 || index >= self.items.len() {
            return Vec::new();
        }
        self.swap(index - 1, index)
    }

    pub fn move_down(&mut self, index: usize) -> Vec<usize> {
        if index + 1 >= self.items.len() {
            return Vec::new();
        }
        self.swap(index, index + 1)
    }

    /// Remove and renumber everything after it
    pub fn remove(&mut self, index: usize) -> Option<(ScaleValue, Vec<usize>)> {
        if index >= self.items.len() {
            return None;
        }
        let removed = self.items.remove(index);

        let mut changed = Vec::new();
        for (i, value) in self.items.iter_mut().enumerate().skip(index) {
            let order = i as i64;
            if value.order != order {
                value.order = order;
                changed.push(i);
            }
        }
        Some((removed, changed))
    }

    fn swap(&mut self, a: usize, b: usize) -> Vec<usize> {
        let order_a = self.items[a].order;
        self.items[a].order = self.items[b].order;
        self.items[b].order = order_a;
        self.items.swap(a, b);
        vec![a, b]
    }
}
