//! Validation of create/update payloads.
//!
//! Payloads are inspected as raw JSON so that every failing field is
//! reported in one pass, not just the first. Violations are collected into
//! a field -> messages map that is surfaced verbatim in the error response.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::store::{NewTask, TaskPatch};

/// Maximum title length in characters, after trimming.
pub const TITLE_MAX: usize = 120;
/// Maximum description length in characters.
pub const DESCRIPTION_MAX: usize = 2000;

/// Field-level validation failures.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

fn push_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

fn require_object(body: &Value) -> Result<&serde_json::Map<String, Value>, FieldErrors> {
    body.as_object().ok_or_else(|| {
        let mut errors = FieldErrors::new();
        push_error(&mut errors, "body", "Expected an object");
        errors
    })
}

/// Checks a title value, returning the accepted string.
fn validate_title(value: &Value, errors: &mut FieldErrors) -> Option<String> {
    let Some(title) = value.as_str() else {
        push_error(errors, "title", "Expected a string");
        return None;
    };

    let length = title.trim().chars().count();
    if length == 0 {
        push_error(errors, "title", "Must not be empty");
        return None;
    }
    if length > TITLE_MAX {
        push_error(errors, "title", format!("Must be at most {TITLE_MAX} characters"));
        return None;
    }

    Some(title.to_string())
}

/// Checks a description value. `allow_null` distinguishes the update
/// contract, where an explicit null clears the field.
fn validate_description(
    value: &Value,
    allow_null: bool,
    errors: &mut FieldErrors,
) -> Option<Option<String>> {
    if value.is_null() {
        if allow_null {
            return Some(None);
        }
        push_error(errors, "description", "Expected a string");
        return None;
    }

    let Some(description) = value.as_str() else {
        push_error(errors, "description", "Expected a string");
        return None;
    };

    if description.chars().count() > DESCRIPTION_MAX {
        push_error(
            errors,
            "description",
            format!("Must be at most {DESCRIPTION_MAX} characters"),
        );
        return None;
    }

    Some(Some(description.to_string()))
}

fn validate_completed(value: &Value, errors: &mut FieldErrors) -> Option<bool> {
    match value.as_bool() {
        Some(completed) => Some(completed),
        None => {
            push_error(errors, "completed", "Expected a boolean");
            None
        }
    }
}

/// Validates a create payload: `title` required, `description` and
/// `completed` optional. Unknown fields are ignored.
pub fn parse_create(body: &Value) -> Result<NewTask, FieldErrors> {
    let object = require_object(body)?;
    let mut errors = FieldErrors::new();

    let title = match object.get("title") {
        Some(value) => validate_title(value, &mut errors),
        None => {
            push_error(&mut errors, "title", "Required");
            None
        }
    };

    let description = match object.get("description") {
        Some(value) => validate_description(value, false, &mut errors).flatten(),
        None => None,
    };

    let completed = match object.get("completed") {
        Some(value) => validate_completed(value, &mut errors).unwrap_or(false),
        None => false,
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewTask {
        // Errors were empty, so title validated
        title: title.unwrap_or_default(),
        description,
        completed,
    })
}

/// Validates an update payload: every field optional, `description` may be
/// explicit null to clear it. Unknown fields are ignored; presence of
/// recognized fields is the handler's concern (`TaskPatch::is_empty`).
pub fn parse_update(body: &Value) -> Result<TaskPatch, FieldErrors> {
    let object = require_object(body)?;
    let mut errors = FieldErrors::new();

    let title = object
        .get("title")
        .and_then(|value| validate_title(value, &mut errors));

    let description = object
        .get("description")
        .and_then(|value| validate_description(value, true, &mut errors));

    let completed = object
        .get("completed")
        .and_then(|value| validate_completed(value, &mut errors));

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(TaskPatch {
        title,
        description,
        completed,
    })
}
