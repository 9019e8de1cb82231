//! SQLite-backed store for the local-storage-only path

use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

use crate::config::Settings;
use crate::resource::Attributes;
use crate::sync::Paging;
use crate::{AnnotoolError, Result};

/// Resources stored as JSON documents keyed by collection path and id
pub struct LocalStore {
    conn: Connection,
}

const CURRENT_SCHEMA_VERSION: i64 = 1;

impl LocalStore {
    /// Open or create the store under the configured data directory
    pub fn open(settings: &Settings) -> Result<Self> {
        let db_path = settings.database_path();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        Self::open_path(&db_path)
    }

    /// Open the store at a specific path (useful for testing)
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let current_version = self.schema_version()?;
        if current_version > CURRENT_SCHEMA_VERSION {
            return Err(AnnotoolError::Config(format!(
                "Local store schema version {} is newer than supported version {}",
                current_version, CURRENT_SCHEMA_VERSION
            )));
        }

        if current_version < 1 {
            self.migrate_to_v1()?;
            self.set_schema_version(1)?;
        }

        Ok(())
    }

    /// Current schema version tracked in PRAGMA user_version.
    pub fn schema_version(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))?)
    }

    fn set_schema_version(&self, version: i64) -> Result<()> {
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {};", version))?;
        Ok(())
    }

    fn migrate_to_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS resources (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body TEXT NOT NULL,
                UNIQUE (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_resources_collection
                ON resources(collection, seq);
            "#,
        )?;
        Ok(())
    }

    /// Store a new resource, assigning an id when it has none
    pub fn insert(&self, collection: &str, mut attrs: Attributes) -> Result<Attributes> {
        let id = match attrs.get("id").and_then(crate::resource::value_to_id) {
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };
        attrs.insert("id".into(), Value::String(id.clone()));

        self.conn.execute(
            "INSERT INTO resources (collection, id, body) VALUES (?1, ?2, ?3)",
            params![collection, id, Value::Object(attrs.clone()).to_string()],
        )?;

        Ok(attrs)
    }

    /// Replace a stored resource, inserting it if missing
    pub fn upsert(&self, collection: &str, id: &str, mut attrs: Attributes) -> Result<Attributes> {
        attrs.insert("id".into(), Value::String(id.to_string()));

        self.conn.execute(
            r#"
            INSERT INTO resources (collection, id, body) VALUES (?1, ?2, ?3)
            ON CONFLICT (collection, id) DO UPDATE SET body = excluded.body
            "#,
            params![collection, id, Value::Object(attrs.clone()).to_string()],
        )?;

        Ok(attrs)
    }

    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Attributes>> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM resources WHERE collection = ?1 AND id = ?2",
                params![collection, id],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| parse_body(&b)).transpose()
    }

    /// List a collection in insertion order, returning the page and the total count
    pub fn list(&self, collection: &str, paging: Option<Paging>) -> Result<(Vec<Attributes>, usize)> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM resources WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;

        let (limit, offset) = match paging {
            Some(p) => (p.limit as i64, p.offset as i64),
            None => (-1, 0),
        };

        let mut stmt = self.conn.prepare(
            "SELECT body FROM resources WHERE collection = ?1 ORDER BY seq LIMIT ?2 OFFSET ?3",
        )?;
        let bodies = stmt
            .query_map(params![collection, limit, offset], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let items = bodies
            .iter()
            .map(|b| parse_body(b))
            .collect::<Result<Vec<_>>>()?;

        Ok((items, count as usize))
    }

    /// Delete a resource and everything nested below it
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let removed = self.conn.execute(
            "DELETE FROM resources WHERE collection = ?1 AND id = ?2",
            params![collection, id],
        )?;

        let nested = format!("{}/%", escape_like(&format!("{}/{}", collection, id)));
        self.conn.execute(
            "DELETE FROM resources WHERE collection LIKE ?1 ESCAPE '\\'",
            params![nested],
        )?;

        Ok(removed > 0)
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn parse_body(body: &str) -> Result<Attributes> {
    match serde_json::from_str::<Value>(body)? {
        Value::Object(map) => Ok(map),
        other => Err(AnnotoolError::Other(format!(
            "stored resource is not an object: {other}"
        ))),
    }
}
