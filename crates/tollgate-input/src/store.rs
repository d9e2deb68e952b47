use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rusqlite::{Connection, ErrorCode, OptionalExtension, params, params_from_iter};
use serde_json::Value;

use crate::instance::{ExecutionInputInstance, InputInstanceState};
use crate::storage::InputInstanceStorage;
use crate::{InputError, Result};

mod embedded {
    use refinery::embed_migrations;
    embed_migrations!("migrations");
}

const SELECT_COLUMNS: &str = "SELECT input_instance_id, node_execution_id, template, field_yaml,
        merged_input_template, user_input, state, created_at, updated_at
 FROM execution_input_instances";

/// SQLite-backed store for execution-input instances.
///
/// Thread-safe via internal `Mutex<Connection>`.
pub struct SqliteInputStore {
    conn: Mutex<Connection>,
}

impl SqliteInputStore {
    /// Open (or create) the database at `path` and run pending migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                InputError::Migration(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let mut store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&mut self) -> Result<()> {
        let conn = self.conn.get_mut();
        embedded::migrations::runner()
            .run(conn)
            .map_err(|e| InputError::Migration(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }

    /// List every instance still waiting for input.
    pub fn list_pending(&self) -> Result<Vec<ExecutionInputInstance>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE state = 'pending' ORDER BY created_at"
        ))?;
        let iter = stmt.query_map([], row_to_raw)?;
        let mut instances = Vec::new();
        for raw in iter {
            instances.push(raw?.into_instance()?);
        }
        Ok(instances)
    }

    fn query_one(&self, column: &str, id: &str) -> Result<Option<ExecutionInputInstance>> {
        let raw = self
            .conn()
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE {column} = ?1"),
                params![id],
                row_to_raw,
            )
            .optional()?;
        raw.map(RawInstance::into_instance).transpose()
    }
}

impl InputInstanceStorage for SqliteInputStore {
    fn save(&self, instance: &ExecutionInputInstance) -> Result<()> {
        let merged = instance
            .merged_input_template
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let result = self.conn().execute(
            "INSERT INTO execution_input_instances
                (input_instance_id, node_execution_id, template, field_yaml,
                 merged_input_template, user_input, state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                instance.input_instance_id,
                instance.node_execution_id,
                instance.template,
                instance.field_yaml,
                merged,
                instance.user_input,
                instance.state.as_str(),
                instance.created_at.to_rfc3339(),
                instance.updated_at.to_rfc3339(),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(InputError::Duplicate(instance.node_execution_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn get_by_node_execution_id(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<ExecutionInputInstance>> {
        self.query_one("node_execution_id", node_execution_id)
    }

    fn get_by_instance_id(
        &self,
        input_instance_id: &str,
    ) -> Result<Option<ExecutionInputInstance>> {
        self.query_one("input_instance_id", input_instance_id)
    }

    fn list_by_node_execution_ids(
        &self,
        node_execution_ids: &[String],
    ) -> Result<Vec<ExecutionInputInstance>> {
        if node_execution_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = (1..=node_execution_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");

        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{SELECT_COLUMNS} WHERE node_execution_id IN ({placeholders})
             ORDER BY node_execution_id"
        ))?;
        let iter = stmt.query_map(params_from_iter(node_execution_ids.iter()), row_to_raw)?;
        let mut instances = Vec::new();
        for raw in iter {
            instances.push(raw?.into_instance()?);
        }
        Ok(instances)
    }

    fn resolve(&self, input_instance_id: &str, merged: &Value, user_input: &str) -> Result<bool> {
        let merged = serde_json::to_string(merged)?;
        let updated = self.conn().execute(
            "UPDATE execution_input_instances
             SET state = 'resolved', merged_input_template = ?1, user_input = ?2, updated_at = ?3
             WHERE input_instance_id = ?4 AND state = 'pending'",
            params![merged, user_input, Utc::now().to_rfc3339(), input_instance_id],
        )?;
        Ok(updated == 1)
    }

    fn expire(&self, input_instance_id: &str) -> Result<bool> {
        let updated = self.conn().execute(
            "UPDATE execution_input_instances
             SET state = 'expired', updated_at = ?1
             WHERE input_instance_id = ?2 AND state = 'pending'",
            params![Utc::now().to_rfc3339(), input_instance_id],
        )?;
        Ok(updated == 1)
    }

    fn delete_by_node_execution_ids(&self, node_execution_ids: &[String]) -> Result<usize> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("DELETE FROM execution_input_instances WHERE node_execution_id = ?1")?;
        let mut deleted = 0;
        for id in node_execution_ids {
            deleted += stmt.execute(params![id])?;
        }
        Ok(deleted)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Row as stored; JSON and state columns are decoded outside the rusqlite closure.
struct RawInstance {
    input_instance_id: String,
    node_execution_id: String,
    template: String,
    field_yaml: String,
    merged_input_template: Option<String>,
    user_input: Option<String>,
    state: String,
    created_at: String,
    updated_at: String,
}

impl RawInstance {
    fn into_instance(self) -> Result<ExecutionInputInstance> {
        let state = InputInstanceState::parse(&self.state).ok_or_else(|| {
            InputError::Migration(format!(
                "unknown state '{}' for input instance {}",
                self.state, self.input_instance_id
            ))
        })?;
        let merged_input_template = self
            .merged_input_template
            .as_deref()
            .map(serde_json::from_str::<Value>)
            .transpose()?;

        Ok(ExecutionInputInstance {
            input_instance_id: self.input_instance_id,
            node_execution_id: self.node_execution_id,
            template: self.template,
            field_yaml: self.field_yaml,
            merged_input_template,
            user_input: self.user_input,
            state,
            created_at: parse_dt(&self.created_at),
            updated_at: parse_dt(&self.updated_at),
        })
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawInstance> {
    Ok(RawInstance {
        input_instance_id: row.get(0)?,
        node_execution_id: row.get(1)?,
        template: row.get(2)?,
        field_yaml: row.get(3)?,
        merged_input_template: row.get(4)?,
        user_input: row.get(5)?,
        state: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
