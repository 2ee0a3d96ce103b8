//! Task persistence: entities, storage trait and the SQLite implementation.

pub mod entities;
pub mod error;
pub mod sqlite;

use async_trait::async_trait;

pub use entities::{ListMeta, NewTask, SortKey, SortOrder, Task, TaskFilter, TaskPatch};
pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteTaskStore;

/// Trait for task storage operations.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Lists tasks matching the filter, returning the page of tasks and
    /// the total count of matching rows (ignoring pagination).
    async fn list_tasks(&self, filter: &TaskFilter) -> StoreResult<(Vec<Task>, i64)>;

    /// Gets a task by id.
    async fn get_task(&self, id: i64) -> StoreResult<Option<Task>>;

    /// Creates a new task and returns the persisted row.
    async fn create_task(&self, task: &NewTask) -> StoreResult<Task>;

    /// Applies a partial update to a task and returns the persisted row,
    /// or `None` if no task with that id exists.
    async fn update_task(&self, id: i64, patch: &TaskPatch) -> StoreResult<Option<Task>>;

    /// Deletes a task by id, returning whether a row was removed.
    async fn delete_task(&self, id: i64) -> StoreResult<bool>;
}
