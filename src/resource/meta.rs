//! Attributes shared by every persisted entity

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

use crate::resource::{Attributes, ResourceId, WireOptions};
use crate::{AnnotoolError, Result};

/// Visibility of a resource to other users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    Private,
    Public,
    SharedWithAdmin,
    SharedWithEveryone,
}

impl Access {
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Private => 0,
            Self::Public => 1,
            Self::SharedWithAdmin => 2,
            Self::SharedWithEveryone => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Private),
            1 => Some(Self::Public),
            2 => Some(Self::SharedWithAdmin),
            3 => Some(Self::SharedWithEveryone),
            _ => None,
        }
    }

    /// Accepts the numeric wire value, also when it arrives as a string
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_u64().and_then(|n| u8::try_from(n).ok()).and_then(Self::from_u8),
            Value::String(s) => s.trim().parse::<u8>().ok().and_then(Self::from_u8),
            _ => None,
        }
    }
}

/// Fires once, when a resource receives its server-assigned id
#[derive(Clone)]
pub struct ReadySignal(Arc<watch::Sender<Option<ResourceId>>>);

impl ReadySignal {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self(Arc::new(tx))
    }

    /// Returns true only for the first call
    pub fn fire(&self, id: &str) -> bool {
        self.0.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(id.to_string());
            true
        })
    }

    pub fn is_ready(&self) -> bool {
        self.0.borrow().is_some()
    }

    /// Wait until the id is known
    pub async fn wait(&self) -> Option<ResourceId> {
        let mut rx = self.0.subscribe();
        let ready = rx.wait_for(|id| id.is_some()).await.ok()?;
        ready.clone()
    }
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReadySignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReadySignal").field(&*self.0.borrow()).finish()
    }
}

/// Common attributes of a persisted resource
#[derive(Debug, Clone, Default)]
pub struct ResourceMeta {
    pub id: Option<ResourceId>,
    pub access: Access,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub deleted_by: Option<String>,
    pub created_by_nickname: Option<String>,
    pub tags: Option<Attributes>,
    pub settings: Option<Attributes>,
    /// Creator is the current user
    pub is_mine: bool,
    ready: ReadySignal,
}

const TIMESTAMP_KEYS: [&str; 3] = ["created_at", "updated_at", "deleted_at"];

impl ResourceMeta {
    /// Parse wire attributes. Parsing already-parsed output yields the same value.
    pub fn parse(attrs: &Attributes, user_id: Option<&str>) -> Result<Self> {
        let mut meta = Self::default();
        meta.merge(attrs, user_id)?;
        Ok(meta)
    }

    /// Apply the keys present in `attrs`, leaving the rest untouched
    pub fn merge(&mut self, attrs: &Attributes, user_id: Option<&str>) -> Result<()> {
        if let Some(id) = attrs.get("id").and_then(value_to_id) {
            self.set_id(id);
        }

        if let Some(value) = attrs.get("access") {
            self.access = Access::from_value(value)
                .ok_or_else(|| AnnotoolError::Validation(format!("'access' attribute is not valid: {value}")))?;
        }

        for key in TIMESTAMP_KEYS {
            if let Some(value) = attrs.get(key) {
                let parsed = parse_timestamp(value).map_err(AnnotoolError::Validation)?;
                *self.timestamp_mut(key) = parsed;
            }
        }

        if let Some(value) = attrs.get("created_by") {
            self.created_by = value_to_id(value);
        }
        if let Some(value) = attrs.get("updated_by") {
            self.updated_by = value_to_id(value);
        }
        if let Some(value) = attrs.get("deleted_by") {
            self.deleted_by = value_to_id(value);
        }
        if let Some(value) = attrs.get("created_by_nickname") {
            self.created_by_nickname = value.as_str().map(str::to_string);
        }

        if let Some(value) = attrs.get("tags") {
            self.tags = parse_sub(value).map_err(|e| AnnotoolError::Validation(format!("'tags' {e}")))?;
        }
        if let Some(value) = attrs.get("settings") {
            self.settings =
                parse_sub(value).map_err(|e| AnnotoolError::Validation(format!("'settings' {e}")))?;
        }

        self.is_mine = match (&self.created_by, user_id) {
            (Some(creator), Some(user)) => creator == user,
            _ => false,
        };

        Ok(())
    }

    /// Check an attribute update before it is applied
    pub fn validate(&self, attrs: &Attributes) -> Option<String> {
        for key in TIMESTAMP_KEYS {
            if let Some(value) = attrs.get(key) {
                if parse_timestamp(value).is_err() {
                    return Some(format!("'{key}' attribute must be a valid date"));
                }
            }
        }

        if let (Some(current), Some(value)) = (self.created_at, attrs.get("created_at")) {
            if parse_timestamp(value).ok().flatten() != Some(current) {
                return Some("'created_at' attribute can not be modified after initialization".to_string());
            }
        }

        if let Some(value) = attrs.get("tags") {
            if let Err(e) = parse_sub(value) {
                return Some(format!("'tags' {e}"));
            }
        }
        if let Some(value) = attrs.get("settings") {
            if let Err(e) = parse_sub(value) {
                return Some(format!("'settings' {e}"));
            }
        }

        if let Some(value) = attrs.get("access") {
            if Access::from_value(value).is_none() {
                return Some(format!("'access' attribute is not valid: {value}"));
            }
        }

        None
    }

    pub fn write_wire(&self, out: &mut Attributes, opts: WireOptions) {
        if let Some(id) = &self.id {
            out.insert("id".into(), Value::String(id.clone()));
        }
        out.insert("access".into(), Value::from(self.access.as_u8()));

        for key in TIMESTAMP_KEYS {
            if let Some(ts) = self.timestamp(key) {
                out.insert(key.into(), Value::String(format_timestamp(ts)));
            }
        }

        for (key, value) in [
            ("created_by", &self.created_by),
            ("updated_by", &self.updated_by),
            ("deleted_by", &self.deleted_by),
            ("created_by_nickname", &self.created_by_nickname),
        ] {
            if let Some(value) = value {
                out.insert(key.into(), Value::String(value.clone()));
            }
        }

        for (key, sub) in [("tags", &self.tags), ("settings", &self.settings)] {
            if let Some(map) = sub {
                let value = if opts.stringify_sub {
                    Value::String(Value::Object(map.clone()).to_string())
                } else {
                    Value::Object(map.clone())
                };
                out.insert(key.into(), value);
            }
        }
    }

    /// Record the id; the ready signal fires the first time
    pub fn set_id(&mut self, id: ResourceId) {
        if self.ready.fire(&id) {
            tracing::debug!(id = %id, "resource ready");
        }
        self.id = Some(id);
    }

    /// Copy for a new resource: same content, no identity or history
    pub fn fork(&self) -> Self {
        Self {
            access: self.access,
            tags: self.tags.clone(),
            settings: self.settings.clone(),
            ..Self::default()
        }
    }

    pub fn ready(&self) -> &ReadySignal {
        &self.ready
    }

    pub fn is_public(&self) -> bool {
        self.access == Access::Public
    }

    /// Fill ownership and creation time when nothing else will
    pub fn stamp_local(&mut self, user_id: Option<&str>, now: DateTime<Utc>) {
        if self.created_by.is_none() {
            self.created_by = user_id.map(str::to_string);
        }
        if self.created_at.is_none() {
            self.created_at = Some(now);
        }
        self.is_mine = self.created_by.is_some() && self.created_by.as_deref() == user_id;
    }

    /// Lookup in the settings map
    pub fn setting(&self, key: &str) -> Option<&Value> {
        self.settings.as_ref().and_then(|s| s.get(key))
    }

    pub fn set_setting(&mut self, key: &str, value: Value) {
        self.settings.get_or_insert_with(Attributes::new).insert(key.to_string(), value);
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        match key {
            "created_at" => self.created_at,
            "updated_at" => self.updated_at,
            _ => self.deleted_at,
        }
    }

    fn timestamp_mut(&mut self, key: &str) -> &mut Option<DateTime<Utc>> {
        match key {
            "created_at" => &mut self.created_at,
            "updated_at" => &mut self.updated_at,
            _ => &mut self.deleted_at,
        }
    }
}

/// Ids arrive as strings or numbers
pub fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// RFC 3339 strings or epoch milliseconds
pub fn parse_timestamp(value: &Value) -> std::result::Result<Option<DateTime<Utc>>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| format!("invalid date '{s}': {e}")),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .map(Some)
            .ok_or_else(|| format!("invalid timestamp {n}")),
        other => Err(format!("invalid date {other}")),
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Sub-maps arrive either as objects or as JSON-encoded strings
pub fn parse_sub(value: &Value) -> std::result::Result<Option<Attributes>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map.clone())),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(Some(map)),
            Ok(Value::Null) => Ok(None),
            Ok(other) => Err(format!("attribute must be an object, got {other}")),
            Err(e) => Err(format!("attribute is not valid JSON: {e}")),
        },
        other => Err(format!("attribute must be an object, got {other}")),
    }
}
