use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::context::AppContext;
use crate::resource::{
    as_f64, init_resource, insert_opt, opt_string, required, value_to_id, Attributes, Persistable,
    ResourceId, ResourceMeta, SyncState, WireOptions,
};
use crate::{AnnotoolError, Result};

/// Category as it was when an annotation was made
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    #[serde(default, deserialize_with = "de_id")]
    pub id: Option<ResourceId>,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "de_id")]
    pub scale_id: Option<ResourceId>,
}

/// Label copied into an annotation at creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelSnapshot {
    #[serde(default, deserialize_with = "de_id")]
    pub id: Option<ResourceId>,
    pub value: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
    pub category: CategorySnapshot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleValueSnapshot {
    #[serde(default, deserialize_with = "de_id")]
    pub id: Option<ResourceId>,
    pub name: String,
    pub value: f64,
    #[serde(default)]
    pub order: i64,
}

fn de_id<'de, D>(deserializer: D) -> std::result::Result<Option<ResourceId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_id(&value))
}

/// Nested objects may come back from the backend as JSON strings
fn parse_nested<T: DeserializeOwned>(value: &Value, key: &str) -> Result<Option<T>> {
    let value = match value {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => serde_json::from_str::<Value>(s)?,
        other => other.clone(),
    };
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| AnnotoolError::Validation(format!("'{key}' attribute is not valid: {e}")))
}

/// A timestamped entry on a track
#[derive(Debug, Clone, Default)]
pub struct Annotation {
    meta: ResourceMeta,
    sync: SyncState,
    /// Seconds from the start of the video
    pub start: f64,
    /// Seconds, never negative
    pub duration: f64,
    pub text: Option<String>,
    pub label: Option<LabelSnapshot>,
    pub scalevalue: Option<ScaleValueSnapshot>,
    pub comments: Vec<Comment>,
    /// Comment fetch already issued
    pub comments_fetched: bool,
}

impl Annotation {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    /// The annotation spans `time`
    pub fn covers(&self, time: f64) -> bool {
        time >= self.start && time <= self.end()
    }

    pub fn comments_url(&self) -> Option<String> {
        self.sync.url.as_ref().map(|url| format!("{url}/comments"))
    }
}

impl Persistable for Annotation {
    const COLLECTION: &'static str = "annotations";

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
        let start = required(attrs, "start", "Annotation")?;
        if as_f64(start).is_none() {
            return Err(AnnotoolError::contract("Annotation 'start' must be a number"));
        }

        let (meta, sync) = init_resource(attrs, ctx)?;
        let mut annotation = Self {
            meta,
            sync,
            ..Default::default()
        };
        annotation.merge_fields(attrs)?;
        Ok(annotation)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(start) = attrs.get("start").and_then(as_f64) {
            self.start = start;
        }
        if let Some(duration) = attrs.get("duration").and_then(as_f64) {
            self.duration = duration.max(0.0);
        }
        if let Some(value) = attrs.get("text") {
            self.text = opt_string(value);
        }
        if let Some(value) = attrs.get("label") {
            self.label = parse_nested(value, "label")?;
        }
        if let Some(value) = attrs.get("scalevalue") {
            self.scalevalue = parse_nested(value, "scalevalue")?;
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        out.insert("start".into(), Value::from(self.start));
        out.insert("duration".into(), Value::from(self.duration));
        insert_opt(out, "text", &self.text);
        if let Some(label) = &self.label {
            if let Ok(value) = serde_json::to_value(label) {
                out.insert("label".into(), value);
            }
        }
        if let Some(scalevalue) = &self.scalevalue {
            if let Ok(value) = serde_json::to_value(scalevalue) {
                out.insert("scalevalue".into(), value);
            }
        }
    }

    fn validate_fields(&self, attrs: &Attributes) -> Option<String> {
        if let Some(value) = attrs.get("start") {
            match as_f64(value) {
                Some(start) if start >= 0.0 => {}
                _ => return Some("'start' attribute must be a positive number".to_string()),
            }
        }
        if let Some(value) = attrs.get("duration") {
            match as_f64(value) {
                Some(duration) if duration >= 0.0 => {}
                _ => return Some("'duration' attribute must be a positive number".to_string()),
            }
        }
        None
    }
}

/// Free-text remark on an annotation, optionally replying to another comment
#[derive(Debug, Clone, Default)]
pub struct Comment {
    meta: ResourceMeta,
    sync: SyncState,
    pub text: String,
    pub reply_to: Option<ResourceId>,
    pub replies: Vec<Comment>,
}

impl Comment {
    pub fn replies_url(&self) -> Option<String> {
        self.sync.url.as_ref().map(|url| format!("{url}/replies"))
    }
}

impl Persistable for Comment {
    const COLLECTION: &'static str = "comments";

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
        required(attrs, "text", "Comment")?;
        let (meta, sync) = init_resource(attrs, ctx)?;
        let mut comment = Self {
            meta,
            sync,
            ..Default::default()
        };
        comment.merge_fields(attrs)?;
        Ok(comment)
    }

    fn merge_fields(&mut self, attrs: &Attributes) -> Result<()> {
        if let Some(value) = attrs.get("text") {
            self.text = opt_string(value).unwrap_or_default();
        }
        if let Some(value) = attrs.get("replied_to_comment_id") {
            self.reply_to = value_to_id(value);
        }
        Ok(())
    }

    fn write_fields(&self, out: &mut Attributes, _opts: WireOptions) {
        out.insert("text".into(), Value::String(self.text.clone()));
        insert_opt(out, "replied_to_comment_id", &self.reply_to);
    }

    fn validate_fields(&self, attrs: &Attributes) -> Option<String> {
        match attrs.get("text") {
            Some(Value::String(s)) if !s.trim().is_empty() => None,
            Some(_) => Some("'text' attribute must be a non-empty string".to_string()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn annotation_without_start_is_a_contract_error() {
        let err = Annotation::from_attributes(&attrs(json!({"text": "hi"})), &AppContext::default())
            .unwrap_err();
        assert!(matches!(err, AnnotoolError::Contract(_)));
    }

    #[test]
    fn stringified_label_is_expanded() {
        let label = json!({
            "id": 3,
            "value": "Happy",
            "abbreviation": "HA",
            "category": {"id": 1, "name": "Emotions", "color": "#00ff00"}
        });
        let annotation = Annotation::from_attributes(
            &attrs(json!({"start": "12.5", "duration": 2, "label": label.to_string()})),
            &AppContext::default(),
        )
        .unwrap();

        let snapshot = annotation.label.as_ref().unwrap();
        assert_eq!(snapshot.id.as_deref(), Some("3"));
        assert_eq!(snapshot.category.name, "Emotions");
        assert_eq!(annotation.start, 12.5);
        assert_eq!(annotation.end(), 14.5);
        assert!(annotation.covers(13.0));
        assert!(!annotation.covers(15.0));
    }

    #[test]
    fn negative_duration_rejected_on_update() {
        let annotation =
            Annotation::from_attributes(&attrs(json!({"start": 0})), &AppContext::default()).unwrap();
        assert!(annotation.validate(&attrs(json!({"duration": -1}))).is_some());
        assert!(annotation.validate(&attrs(json!({"duration": 0}))).is_none());
    }

    #[test]
    fn comment_requires_text() {
        let err = Comment::from_attributes(&attrs(json!({})), &AppContext::default()).unwrap_err();
        assert!(matches!(err, AnnotoolError::Contract(_)));

        let reply = Comment::from_attributes(
            &attrs(json!({"text": "agreed", "replied_to_comment_id": 8})),
            &AppContext::default(),
        )
        .unwrap();
        assert_eq!(reply.reply_to.as_deref(), Some("8"));
    }
}
