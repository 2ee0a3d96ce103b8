//! SQLite-backed task store.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, Pool, Sqlite};

use super::entities::{NewTask, Task, TaskFilter, TaskPatch};
use super::error::{StoreError, StoreResult};
use super::TaskStore;

/// SQL schema, applied idempotently at startup.
const SCHEMA_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        description TEXT,
        completed INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks(completed)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at)",
];

/// Database row for Task. Timestamps are stored as RFC 3339 text.
#[derive(Debug, FromRow)]
struct TaskRow {
    id: i64,
    title: String,
    description: Option<String>,
    completed: bool,
    created_at: String,
    updated_at: String,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Task {
            id: row.id,
            title: row.title,
            description: row.description,
            completed: row.completed,
            created_at: chrono::DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: chrono::DateTime::parse_from_rfc3339(&row.updated_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        }
    }
}

const SELECT_COLUMNS: &str = "id, title, description, completed, created_at, updated_at";

/// Task store backed by a SQLite connection pool.
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    pool: Pool<Sqlite>,
}

impl SqliteTaskStore {
    /// Connects to the database at the given URL, creating the file and
    /// the schema if needed. WAL journal mode with relaxed synchronous
    /// durability, suitable for a single-process deployment.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        // Ensure the parent directory exists for file-backed databases
        if let Some(raw) = database_url.strip_prefix("sqlite:") {
            let file = raw.split('?').next().unwrap_or(raw);
            if file != ":memory:" {
                if let Some(parent) = Path::new(file).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).ok();
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Creates an in-memory store. A single connection is used so every
    /// query sees the same database.
    pub async fn in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Closes the connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> StoreResult<()> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

/// WHERE fragment and owned binds for a filter. Column tokens come from
/// closed enums; user input is only ever bound as parameters.
fn where_clause(filter: &TaskFilter) -> (String, Option<String>) {
    let mut conditions: Vec<&'static str> = Vec::new();

    if filter.completed.is_some() {
        conditions.push("completed = ?");
    }

    // SQLite LIKE matches case-insensitively for ASCII
    let pattern = filter
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{q}%"));
    if pattern.is_some() {
        conditions.push("(title LIKE ? OR description LIKE ?)");
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    (sql, pattern)
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<(Vec<Task>, i64)> {
        let (where_sql, pattern) = where_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM tasks {where_sql}");
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
        if let Some(completed) = filter.completed {
            count_query = count_query.bind(completed);
        }
        if let Some(pattern) = &pattern {
            count_query = count_query.bind(pattern).bind(pattern);
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let page_sql = format!(
            "SELECT {SELECT_COLUMNS} FROM tasks {where_sql} ORDER BY {} {} LIMIT ? OFFSET ?",
            filter.sort.column(),
            filter.order.keyword(),
        );
        let mut page_query = sqlx::query_as::<_, TaskRow>(&page_sql);
        if let Some(completed) = filter.completed {
            page_query = page_query.bind(completed);
        }
        if let Some(pattern) = &pattern {
            page_query = page_query.bind(pattern).bind(pattern);
        }
        let rows = page_query
            .bind(i64::from(filter.limit))
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(Task::from).collect(), total))
    }

    async fn get_task(&self, id: i64) -> StoreResult<Option<Task>> {
        let row: Option<TaskRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM tasks WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(Task::from))
    }

    async fn create_task(&self, task: &NewTask) -> StoreResult<Task> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO tasks (title, description, completed, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.completed)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();

        // Re-fetch so the returned representation is exactly what was
        // persisted. A missing row here is a storage failure, not a
        // client-facing not-found.
        self.get_task(id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> StoreResult<Option<Task>> {
        if self.get_task(id).await?.is_none() {
            return Ok(None);
        }

        let mut assignments: Vec<&'static str> = Vec::new();
        if patch.title.is_some() {
            assignments.push("title = ?");
        }
        if patch.description.is_some() {
            assignments.push("description = ?");
        }
        if patch.completed.is_some() {
            assignments.push("completed = ?");
        }
        assignments.push("updated_at = ?");

        let sql = format!("UPDATE tasks SET {} WHERE id = ?", assignments.join(", "));

        let mut query = sqlx::query(&sql);
        if let Some(title) = &patch.title {
            query = query.bind(title);
        }
        if let Some(description) = &patch.description {
            query = query.bind(description.as_deref());
        }
        if let Some(completed) = patch.completed {
            query = query.bind(completed);
        }
        query
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.get_task(id).await
    }

    async fn delete_task(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::{SortKey, SortOrder};

    fn new_task(title: &str) -> NewTask {
        NewTask {
            title: title.to_string(),
            description: None,
            completed: false,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_equal_timestamps() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        let task = store
            .create_task(&NewTask {
                title: "Study AWS".to_string(),
                description: Some("EC2 + Docker".to_string()),
                completed: false,
            })
            .await
            .unwrap();

        assert!(task.id > 0);
        assert_eq!(task.title, "Study AWS");
        assert_eq!(task.description.as_deref(), Some("EC2 + Docker"));
        assert!(!task.completed);
        assert_eq!(task.created_at, task.updated_at);

        let fetched = store.get_task(task.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, task.title);
    }

    #[tokio::test]
    async fn ids_are_monotonically_increasing() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        let first = store.create_task(&new_task("first")).await.unwrap();
        let second = store.create_task(&new_task("second")).await.unwrap();

        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn update_touches_only_present_fields() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        let created = store
            .create_task(&NewTask {
                title: "Old".to_string(),
                description: Some("keep me".to_string()),
                completed: false,
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;

        let patch = TaskPatch {
            title: Some("New".to_string()),
            completed: Some(true),
            ..TaskPatch::default()
        };
        let updated = store
            .update_task(created.id, &patch)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "New");
        assert!(updated.completed);
        assert_eq!(updated.description.as_deref(), Some("keep me"));
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at > created.updated_at);
    }

    #[tokio::test]
    async fn update_with_explicit_null_clears_description() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        let created = store
            .create_task(&NewTask {
                title: "task".to_string(),
                description: Some("to be cleared".to_string()),
                completed: false,
            })
            .await
            .unwrap();

        let patch = TaskPatch {
            description: Some(None),
            ..TaskPatch::default()
        };
        let updated = store
            .update_task(created.id, &patch)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.description, None);
    }

    #[tokio::test]
    async fn update_missing_task_returns_none() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        let patch = TaskPatch {
            title: Some("whatever".to_string()),
            ..TaskPatch::default()
        };
        assert!(store.update_task(9999, &patch).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        let created = store.create_task(&new_task("delete me")).await.unwrap();

        assert!(store.delete_task(created.id).await.unwrap());
        assert!(store.get_task(created.id).await.unwrap().is_none());
        assert!(!store.delete_task(created.id).await.unwrap());
    }

    #[tokio::test]
    async fn list_filters_by_completion_and_text() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        store
            .create_task(&NewTask {
                title: "Study AWS".to_string(),
                description: Some("EC2 + Docker".to_string()),
                completed: true,
            })
            .await
            .unwrap();
        store
            .create_task(&NewTask {
                title: "Buy groceries".to_string(),
                description: None,
                completed: true,
            })
            .await
            .unwrap();
        store
            .create_task(&NewTask {
                title: "Study Rust".to_string(),
                description: None,
                completed: false,
            })
            .await
            .unwrap();

        let filter = TaskFilter {
            completed: Some(true),
            q: Some("study".to_string()),
            ..TaskFilter::default()
        };
        let (tasks, total) = store.list_tasks(&filter).await.unwrap();

        assert_eq!(total, 1);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "Study AWS");
    }

    #[tokio::test]
    async fn list_matches_text_in_description() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        store
            .create_task(&NewTask {
                title: "errands".to_string(),
                description: Some("pick up the Docker book".to_string()),
                completed: false,
            })
            .await
            .unwrap();

        let filter = TaskFilter {
            q: Some("docker".to_string()),
            ..TaskFilter::default()
        };
        let (tasks, total) = store.list_tasks(&filter).await.unwrap();

        assert_eq!(total, 1);
        assert_eq!(tasks[0].title, "errands");
    }

    #[tokio::test]
    async fn list_paginates_and_counts_all_matches() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        for i in 0..5 {
            store.create_task(&new_task(&format!("task {i}"))).await.unwrap();
        }

        let filter = TaskFilter {
            page: 2,
            limit: 2,
            ..TaskFilter::default()
        };
        let (tasks, total) = store.list_tasks(&filter).await.unwrap();

        assert_eq!(total, 5);
        assert_eq!(tasks.len(), 2);

        let beyond = TaskFilter {
            page: 99,
            limit: 2,
            ..TaskFilter::default()
        };
        let (tasks, total) = store.list_tasks(&beyond).await.unwrap();
        assert_eq!(total, 5);
        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn list_sorts_by_allow_listed_columns() {
        let store = SqliteTaskStore::in_memory().await.unwrap();

        let first = store.create_task(&new_task("first")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = store.create_task(&new_task("second")).await.unwrap();

        let filter = TaskFilter {
            sort: SortKey::CreatedAt,
            order: SortOrder::Asc,
            ..TaskFilter::default()
        };
        let (tasks, _) = store.list_tasks(&filter).await.unwrap();
        assert_eq!(tasks[0].id, first.id);

        let filter = TaskFilter {
            sort: SortKey::CreatedAt,
            order: SortOrder::Desc,
            ..TaskFilter::default()
        };
        let (tasks, _) = store.list_tasks(&filter).await.unwrap();
        assert_eq!(tasks[0].id, second.id);
    }
}
