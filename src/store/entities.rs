//! Entity types for the task store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task record as stored and served over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, assigned by the store.
    pub id: i64,
    /// Task title.
    pub title: String,
    /// Optional free-text description.
    pub description: Option<String>,
    /// Completion flag.
    pub completed: bool,
    /// Created timestamp, immutable after creation.
    pub created_at: DateTime<Utc>,
    /// Updated timestamp, refreshed on every successful mutation.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
}

/// Partial update for a task. Absent fields are left unchanged;
/// `description: Some(None)` clears the stored description.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// Returns true if the patch carries no recognized fields.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.completed.is_none()
    }
}

/// Sort column for the list operation. Closed set: these tokens are the
/// only user-influenced text ever interpolated into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl SortKey {
    /// SQL column name for this sort key.
    pub fn column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }

    /// Parses a sort parameter, falling back to the default for anything
    /// outside the allow-list.
    pub fn parse(s: &str) -> Self {
        match s {
            "updated_at" => Self::UpdatedAt,
            _ => Self::CreatedAt,
        }
    }
}

/// Sort direction for the list operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Parses an order parameter, case-insensitively; anything other
    /// than "asc" sorts descending.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("asc") {
            Self::Asc
        } else {
            Self::Desc
        }
    }
}

/// Filter, sort and pagination parameters for listing tasks.
#[derive(Debug, Clone)]
pub struct TaskFilter {
    /// Tri-state completion filter.
    pub completed: Option<bool>,
    /// Substring match against title or description. Empty after trimming
    /// means no text filter.
    pub q: Option<String>,
    pub sort: SortKey,
    pub order: SortOrder,
    /// 1-based page number.
    pub page: u32,
    /// Page size, clamped to [1, 100].
    pub limit: u32,
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self {
            completed: None,
            q: None,
            sort: SortKey::default(),
            order: SortOrder::default(),
            page: 1,
            limit: 20,
        }
    }
}

impl TaskFilter {
    /// Row offset for the current page.
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

/// Pagination metadata returned alongside a page of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

impl ListMeta {
    /// Builds metadata from a filter and a total row count.
    pub fn new(filter: &TaskFilter, total: i64) -> Self {
        let limit = i64::from(filter.limit);
        Self {
            page: filter.page,
            limit: filter.limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}
