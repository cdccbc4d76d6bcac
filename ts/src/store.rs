//! SQLite-backed collection store

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, params_from_iter};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::filter::{Filter, IndexValue, Order, Patch};
use crate::now_ms;
use crate::record::{Insertable, Record};

/// Database file created inside the store directory
pub const DB_FILE_NAME: &str = "taskstore.db";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_tasks_user_created ON tasks (user_id, created_at);

CREATE TABLE IF NOT EXISTS subtasks (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    task_id TEXT NOT NULL,
    title TEXT NOT NULL,
    is_completed INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_subtasks_task ON subtasks (task_id);
"#;

/// Row store over a single SQLite connection
pub struct Store {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Store {
    /// Open or create a store in the given directory
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let db_path = dir.join(DB_FILE_NAME);
        debug!(db_path = %db_path.display(), "Store::open: called");

        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self {
            conn,
            path: Some(db_path),
        };
        store.migrate()?;
        info!(path = %dir.display(), "Opened task store");
        Ok(store)
    }

    /// Open a throwaway store that lives only as long as this value
    pub fn open_in_memory() -> Result<Self> {
        debug!("Store::open_in_memory: called");
        let store = Self {
            conn: Connection::open_in_memory()?,
            path: None,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Insert a row; the store assigns `id` and `created_at`
    ///
    /// The generated id is deliberately not returned.
    pub fn insert<I: Insertable>(&self, row: I) -> Result<()> {
        let collection = I::Record::collection_name();
        let mut columns = vec!["id", "created_at"];
        let mut values = vec![
            IndexValue::String(Uuid::now_v7().to_string()),
            IndexValue::Int(now_ms()),
        ];
        for (column, value) in row.into_values() {
            check_field::<I::Record>(column)?;
            columns.push(column);
            values.push(value);
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            collection,
            columns.join(", "),
            placeholders
        );
        debug!(%collection, "Store::insert: executing");
        self.conn.execute(&sql, params_from_iter(values.iter()))?;
        Ok(())
    }

    /// Select rows matching all `filters`
    ///
    /// Without an explicit order rows come back in insertion order.
    pub fn select<T: Record>(&self, filters: &[Filter], order: Option<Order>) -> Result<Vec<T>> {
        let (where_sql, params) = where_clause::<T>(filters)?;
        let order_sql = order.map(|o| o.as_sql()).unwrap_or("ORDER BY rowid ASC");
        let sql = format!(
            "SELECT {} FROM {}{} {}",
            T::columns().join(", "),
            T::collection_name(),
            where_sql,
            order_sql
        );
        debug!(collection = T::collection_name(), filter_count = filters.len(), "Store::select: executing");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| T::from_row(row))?
            .collect::<rusqlite::Result<Vec<T>>>()?;
        Ok(rows)
    }

    /// Apply `patch` to every row matching `filters`, returning the count updated
    pub fn update<T: Record>(&self, filters: &[Filter], patch: &Patch) -> Result<usize> {
        if patch.is_empty() {
            return Err(StoreError::EmptyPatch);
        }

        let mut assignments = Vec::with_capacity(patch.sets.len());
        let mut params: Vec<&IndexValue> = Vec::with_capacity(patch.sets.len() + filters.len());
        for (field, value) in &patch.sets {
            check_field::<T>(field)?;
            if field == "id" || field == "created_at" {
                return Err(StoreError::ImmutableField(field.clone()));
            }
            assignments.push(format!("{} = ?", field));
            params.push(value);
        }

        let (where_sql, filter_params) = where_clause::<T>(filters)?;
        params.extend(filter_params);

        let sql = format!(
            "UPDATE {} SET {}{}",
            T::collection_name(),
            assignments.join(", "),
            where_sql
        );
        debug!(collection = T::collection_name(), "Store::update: executing");
        Ok(self.conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    /// Delete every row matching `filters`, returning the count removed
    pub fn delete<T: Record>(&self, filters: &[Filter]) -> Result<usize> {
        let (where_sql, params) = where_clause::<T>(filters)?;
        let sql = format!("DELETE FROM {}{}", T::collection_name(), where_sql);
        debug!(collection = T::collection_name(), "Store::delete: executing");
        Ok(self.conn.execute(&sql, params_from_iter(params.iter()))?)
    }
}

/// Column names are interpolated into SQL, so only known columns pass
fn check_field<T: Record>(field: &str) -> Result<()> {
    if T::columns().contains(&field) {
        Ok(())
    } else {
        Err(StoreError::UnknownField {
            collection: T::collection_name(),
            field: field.to_string(),
        })
    }
}

fn where_clause<T: Record>(filters: &[Filter]) -> Result<(String, Vec<&IndexValue>)> {
    if filters.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut conditions = Vec::with_capacity(filters.len());
    let mut params = Vec::with_capacity(filters.len());
    for filter in filters {
        check_field::<T>(&filter.field)?;
        conditions.push(format!("{} {} ?", filter.field, filter.op.as_sql()));
        params.push(&filter.value);
    }
    Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;
    use crate::record::{NewSubtask, NewTask, SubtaskRow, TaskRow};
    use tempfile::TempDir;

    #[test]
    fn test_insert_and_select_tasks() {
        let store = Store::open_in_memory().unwrap();
        store.insert(NewTask::new("user-1", "Plan trip")).unwrap();

        let tasks: Vec<TaskRow> = store.select(&[], None).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Plan trip");
        assert_eq!(tasks[0].user_id, "user-1");
        assert!(!tasks[0].is_completed);
        assert!(!tasks[0].id.is_empty());
        assert!(tasks[0].created_at > 0);
    }

    #[test]
    fn test_select_newest_first_returns_last_insert() {
        let store = Store::open_in_memory().unwrap();
        for title in ["first", "second", "third"] {
            store.insert(NewTask::new("user-1", title)).unwrap();
        }

        let newest: Vec<TaskRow> = store.select(&[], Some(Order::CreatedDesc)).unwrap();
        let titles: Vec<&str> = newest.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["third", "second", "first"]);

        let oldest: Vec<TaskRow> = store.select(&[], Some(Order::CreatedAsc)).unwrap();
        assert_eq!(oldest[0].title, "first");
    }

    #[test]
    fn test_select_filters_by_user() {
        let store = Store::open_in_memory().unwrap();
        store.insert(NewTask::new("alice", "A task")).unwrap();
        store.insert(NewTask::new("bob", "B task")).unwrap();

        let tasks: Vec<TaskRow> = store.select(&[Filter::eq("user_id", "alice")], None).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "A task");

        let others: Vec<TaskRow> = store
            .select(
                &[Filter {
                    field: "user_id".to_string(),
                    op: FilterOp::Ne,
                    value: "alice".into(),
                }],
                None,
            )
            .unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].user_id, "bob");
    }

    #[test]
    fn test_subtasks_do_not_check_task_id() {
        let store = Store::open_in_memory().unwrap();
        store.insert(NewSubtask::new("no-such-task", "Orphan")).unwrap();

        let subtasks: Vec<SubtaskRow> = store.select(&[Filter::eq("task_id", "no-such-task")], None).unwrap();
        assert_eq!(subtasks.len(), 1);
    }

    #[test]
    fn test_update_and_delete() {
        let store = Store::open_in_memory().unwrap();
        store.insert(NewTask::new("user-1", "Plan trip")).unwrap();
        let id = store.select::<TaskRow>(&[], None).unwrap()[0].id.clone();

        let updated = store
            .update::<TaskRow>(&[Filter::eq("id", id.as_str())], &Patch::new().set("is_completed", true))
            .unwrap();
        assert_eq!(updated, 1);
        assert!(store.select::<TaskRow>(&[], None).unwrap()[0].is_completed);

        let deleted = store.delete::<TaskRow>(&[Filter::eq("id", id.as_str())]).unwrap();
        assert_eq!(deleted, 1);
        assert!(store.select::<TaskRow>(&[], None).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let store = Store::open_in_memory().unwrap();
        let result = store.select::<TaskRow>(&[Filter::eq("user_id; DROP TABLE tasks", "x")], None);
        assert!(matches!(result, Err(StoreError::UnknownField { .. })));
    }

    #[test]
    fn test_patch_rejects_store_assigned_fields() {
        let store = Store::open_in_memory().unwrap();
        let result = store.update::<TaskRow>(&[], &Patch::new().set("id", "forged"));
        assert!(matches!(result, Err(StoreError::ImmutableField(_))));

        let result = store.update::<TaskRow>(&[], &Patch::new());
        assert!(matches!(result, Err(StoreError::EmptyPatch)));
    }

    #[test]
    fn test_open_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        {
            let store = Store::open(temp.path()).unwrap();
            store.insert(NewTask::new("user-1", "Durable")).unwrap();
            assert_eq!(store.path(), Some(temp.path().join(DB_FILE_NAME).as_path()));
        }

        let store = Store::open(temp.path()).unwrap();
        let tasks: Vec<TaskRow> = store.select(&[], None).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Durable");
    }
}
