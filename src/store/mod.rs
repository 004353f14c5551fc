//! `ProjectStore`: SQLite row store of projects, each holding an opaque JSON
//! blob (the client's whole project state: graph, message log, UI data).
//!
//! ## Storage layout
//! ```text
//! {work_dir}/
//! └── tapestry.db        # SQLite, WAL mode
//!     └── projects(id, name, data, updated_at)
//! ```
//!
//! The store never interprets `data` except through [`ProjectData`], which
//! the weave endpoint uses to read and write the graph + message log while
//! keeping every other key untouched.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AppError;
use crate::graph::Graph;
use crate::turn::ChatMessage;

/// Schema version stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

// ── Types ─────────────────────────────────────────────────────────────────────

/// Listing row: everything but the blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub updated_at: String,
}

/// A full project row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub data: serde_json::Value,
    pub updated_at: String,
}

/// Typed view of the project blob.
///
/// Unknown keys land in `extra` and are written back verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectData {
    #[serde(flatten)]
    pub graph: Graph,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProjectData {
    pub fn from_value(value: serde_json::Value) -> Result<Self, AppError> {
        let value = if value.is_null() { serde_json::Value::Object(Default::default()) } else { value };
        serde_json::from_value(value).map_err(|e| AppError::Store(format!("project data: {e}")))
    }

    pub fn to_value(&self) -> Result<serde_json::Value, AppError> {
        serde_json::to_value(self).map_err(|e| AppError::Store(format!("project data: {e}")))
    }
}

// ── ProjectStore ──────────────────────────────────────────────────────────────

/// SQLite-backed project store. One connection, serialised by a mutex;
/// every operation is a single short statement.
#[derive(Debug)]
pub struct ProjectStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl ProjectStore {
    /// Open (or create) the database at `db_path`, creating parent dirs.
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| AppError::Store(format!("create {}: {e}", parent.display())))?;
        }
        let conn = open_conn(db_path)?;
        init_db(&conn)?;
        debug!(path = %db_path.display(), "project store opened");
        Ok(Self { path: db_path.to_path_buf(), conn: Mutex::new(conn) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new project and return its summary.
    pub fn create(&self, name: &str, data: Option<serde_json::Value>) -> Result<ProjectSummary, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let data = data.unwrap_or_else(|| serde_json::json!({}));
        let updated_at = now_rfc3339();
        self.lock()?
            .execute(
                "INSERT INTO projects (id, name, data, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, name, data.to_string(), updated_at],
            )
            .map_err(|e| AppError::Store(format!("insert project: {e}")))?;
        Ok(ProjectSummary { id, name: name.to_string(), updated_at })
    }

    /// All projects, most recently updated first.
    pub fn list(&self) -> Result<Vec<ProjectSummary>, AppError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, name, updated_at FROM projects ORDER BY updated_at DESC, rowid DESC")
            .map_err(|e| AppError::Store(format!("prepare list: {e}")))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProjectSummary { id: row.get(0)?, name: row.get(1)?, updated_at: row.get(2)? })
            })
            .map_err(|e| AppError::Store(format!("list projects: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("read project row: {e}")))
    }

    pub fn get(&self, id: &str) -> Result<Option<Project>, AppError> {
        let row = self
            .lock()?
            .query_row(
                "SELECT id, name, data, updated_at FROM projects WHERE id = ?1",
                params![id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .map_err(|e| AppError::Store(format!("get project {id}: {e}")))?;

        let Some((id, name, data, updated_at)) = row else {
            return Ok(None);
        };
        let data = serde_json::from_str(&data)
            .map_err(|e| AppError::Store(format!("malformed data for project {id}: {e}")))?;
        Ok(Some(Project { id, name, data, updated_at }))
    }

    /// Update name and/or data. Returns `false` when the project does not
    /// exist. With neither field set the row is left untouched.
    pub fn update(&self, id: &str, name: Option<&str>, data: Option<&serde_json::Value>) -> Result<bool, AppError> {
        let conn = self.lock()?;
        if name.is_none() && data.is_none() {
            let exists = conn
                .query_row("SELECT 1 FROM projects WHERE id = ?1", params![id], |_| Ok(()))
                .optional()
                .map_err(|e| AppError::Store(format!("check project {id}: {e}")))?;
            return Ok(exists.is_some());
        }
        let changed = conn
            .execute(
                "UPDATE projects SET
                    name = COALESCE(?2, name),
                    data = COALESCE(?3, data),
                    updated_at = ?4
                 WHERE id = ?1",
                params![id, name, data.map(|d| d.to_string()), now_rfc3339()],
            )
            .map_err(|e| AppError::Store(format!("update project {id}: {e}")))?;
        Ok(changed > 0)
    }

    /// Returns `true` when a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool, AppError> {
        let changed = self
            .lock()?
            .execute("DELETE FROM projects WHERE id = ?1", params![id])
            .map_err(|e| AppError::Store(format!("delete project {id}: {e}")))?;
        Ok(changed > 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|_| AppError::Store("project store connection poisoned".into()))
    }
}

// ── Private helpers ───────────────────────────────────────────────────────────

/// Open a SQLite connection and apply WAL + busy-timeout pragmas.
fn open_conn(db_path: &Path) -> Result<Connection, AppError> {
    let conn = Connection::open(db_path)
        .map_err(|e| AppError::Store(format!("open {}: {e}", db_path.display())))?;
    conn.pragma_update(None, "journal_mode", "WAL")
        .map_err(|e| AppError::Store(format!("set journal_mode WAL: {e}")))?;
    conn.pragma_update(None, "busy_timeout", 5000)
        .map_err(|e| AppError::Store(format!("set busy_timeout: {e}")))?;
    Ok(conn)
}

fn init_db(conn: &Connection) -> Result<(), AppError> {
    let version: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| AppError::Store(format!("read user_version: {e}")))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            data TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_projects_updated_at ON projects(updated_at);

        PRAGMA user_version = 1;
        ",
    )
    .map_err(|e| AppError::Store(format!("initialize schema: {e}")))
}

/// Current UTC time, RFC 3339 with millisecond precision.
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, ProjectStore) {
        let temp = TempDir::new().expect("tempdir");
        let store = ProjectStore::open(&temp.path().join("nested/tapestry.db")).expect("open");
        (temp, store)
    }

    #[test]
    fn open_creates_parent_dirs() {
        let (_temp, store) = make_store();
        assert!(store.path().exists());
    }

    #[test]
    fn reopen_keeps_rows() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tapestry.db");
        let id = ProjectStore::open(&path).unwrap().create("kept", None).unwrap().id;
        let store = ProjectStore::open(&path).unwrap();
        assert_eq!(store.get(&id).unwrap().unwrap().name, "kept");
    }

    #[test]
    fn update_without_fields_reports_existence() {
        let (_temp, store) = make_store();
        let p = store.create("x", None).unwrap();
        assert!(store.update(&p.id, None, None).unwrap());
        assert!(!store.update("missing", None, None).unwrap());
        assert_eq!(store.get(&p.id).unwrap().unwrap().updated_at, p.updated_at);
    }

    #[test]
    fn project_data_preserves_unknown_keys() {
        let raw = json!({
            "nodes": [{"id": "n1", "label": "Alice", "type": "Person", "attributes": {}}],
            "edges": [],
            "messages": [{"role": "user", "content": "hi"}],
            "viewport": {"zoom": 2}
        });
        let data = ProjectData::from_value(raw.clone()).unwrap();
        assert_eq!(data.graph.nodes.len(), 1);
        assert_eq!(data.messages.len(), 1);
        assert_eq!(data.extra["viewport"], json!({"zoom": 2}));
        assert_eq!(data.to_value().unwrap(), raw);
    }

    #[test]
    fn empty_or_null_data_is_empty_project() {
        assert!(ProjectData::from_value(json!({})).unwrap().graph.is_empty());
        assert!(ProjectData::from_value(serde_json::Value::Null).unwrap().messages.is_empty());
    }

    #[test]
    fn malformed_graph_in_data_errors() {
        let err = ProjectData::from_value(json!({"nodes": "not a list"})).unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }
}
