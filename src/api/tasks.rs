//! Task API endpoints.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};
use crate::schemas;
use crate::state::AppState;
use crate::store::{ListMeta, SortKey, SortOrder, Task, TaskFilter, TaskStore};

/// Query parameters for listing tasks. Everything arrives as optional
/// strings and is parsed leniently: invalid values fall back to defaults.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    page: Option<String>,
    limit: Option<String>,
    completed: Option<String>,
    q: Option<String>,
    sort: Option<String>,
    order: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> TaskFilter {
        let page = self
            .page
            .as_deref()
            .and_then(|v| v.parse::<u32>().ok())
            .map_or(1, |p| p.max(1));

        let limit = self
            .limit
            .as_deref()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(20)
            .clamp(1, 100);

        let completed = match self.completed.as_deref() {
            Some("true") => Some(true),
            Some("false") => Some(false),
            _ => None,
        };

        let q = self
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);

        TaskFilter {
            completed,
            q,
            sort: self.sort.as_deref().map(SortKey::parse).unwrap_or_default(),
            order: self
                .order
                .as_deref()
                .map(SortOrder::parse)
                .unwrap_or_default(),
            page,
            limit,
        }
    }
}

/// A single task response body.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub data: Task,
}

/// A page of tasks with pagination metadata.
#[derive(Debug, Serialize)]
pub struct ListTasksResponse {
    pub data: Vec<Task>,
    pub meta: ListMeta,
}

fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::validation("Task id must be an integer"))
}

fn parse_body(body: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::validation(format!("Invalid JSON body: {rejection}")))
}

/// Lists tasks with filtering, sorting and pagination.
pub async fn list_tasks<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListTasksResponse>> {
    let filter = query.into_filter();
    let (tasks, total) = state.store.list_tasks(&filter).await?;

    Ok(Json(ListTasksResponse {
        data: tasks,
        meta: ListMeta::new(&filter, total),
    }))
}

/// Gets a task by id.
pub async fn get_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> ApiResult<Json<TaskResponse>> {
    let id = parse_id(&id)?;

    let task = state
        .store
        .get_task(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(Json(TaskResponse { data: task }))
}

/// Creates a task.
pub async fn create_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let body = parse_body(body)?;
    let new_task = schemas::parse_create(&body).map_err(ApiError::validation_failed)?;

    let task = state.store.create_task(&new_task).await?;

    tracing::info!(task_id = task.id, "Task created");

    Ok((StatusCode::CREATED, Json(TaskResponse { data: task })))
}

/// Applies a partial update to a task.
pub async fn update_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<TaskResponse>> {
    let id = parse_id(&id)?;
    let body = parse_body(body)?;
    let patch = schemas::parse_update(&body).map_err(ApiError::validation_failed)?;

    if patch.is_empty() {
        return Err(ApiError::validation("No fields provided to update"));
    }

    let task = state
        .store
        .update_task(id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    tracing::info!(task_id = task.id, "Task updated");

    Ok(Json(TaskResponse { data: task }))
}

/// Deletes a task.
pub async fn delete_task<S: TaskStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = parse_id(&id)?;

    if !state.store.delete_task(id).await? {
        return Err(ApiError::not_found("Task not found"));
    }

    tracing::info!(task_id = id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
