//! Sparse profile updates translated from a camelCase JSON body.

use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::models::profile::dedup_preserving_order;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    List,
    Int,
}

/// External field name, column name, value kind. Columns are only ever taken from here.
const FIELDS: [(&str, &str, FieldKind); 13] = [
    ("firstName", "first_name", FieldKind::Text),
    ("lastName", "last_name", FieldKind::Text),
    ("title", "title", FieldKind::Text),
    ("bio", "bio", FieldKind::Text),
    ("phone", "phone", FieldKind::Text),
    ("location", "location", FieldKind::Text),
    ("linkedinUrl", "linkedin_url", FieldKind::Text),
    ("githubUrl", "github_url", FieldKind::Text),
    ("portfolioUrl", "portfolio_url", FieldKind::Text),
    ("skills", "skills", FieldKind::List),
    ("experienceYears", "experience_years", FieldKind::Int),
    ("preferredJobTypes", "preferred_job_types", FieldKind::List),
    ("preferredLocations", "preferred_locations", FieldKind::List),
];

#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Text(Option<String>),
    List(Vec<String>),
    Int(Option<i32>),
}

/// Column assignments for one profile update, in a fixed column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    changes: Vec<(&'static str, PatchValue)>,
}

impl ProfilePatch {
    /// Unknown fields are ignored. `null` clears a scalar and empties a list.
    pub fn from_json(body: &Map<String, Value>) -> Result<Self, AppError> {
        let mut changes = Vec::new();

        for (field, column, kind) in FIELDS {
            let Some(value) = body.get(field) else {
                continue;
            };
            let patch_value = match kind {
                FieldKind::Text => PatchValue::Text(text_value(field, value)?),
                FieldKind::List => PatchValue::List(list_value(field, value)?),
                FieldKind::Int => PatchValue::Int(int_value(field, value)?),
            };
            changes.push((column, patch_value));
        }

        Ok(Self { changes })
    }

    pub fn changes(&self) -> &[(&'static str, PatchValue)] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn wrong_type(field: &str, expected: &str) -> AppError {
    AppError::Validation(format!("{field} must be {expected}"))
}

fn text_value(field: &str, value: &Value) -> Result<Option<String>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        _ => Err(wrong_type(field, "a string")),
    }
}

fn list_value(field: &str, value: &Value) -> Result<Vec<String>, AppError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => {
            let strings = items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| wrong_type(field, "a list of strings"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(dedup_preserving_order(strings))
        }
        _ => Err(wrong_type(field, "a list of strings")),
    }
}

fn int_value(field: &str, value: &Value) -> Result<Option<i32>, AppError> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .filter(|v| *v >= 0)
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| wrong_type(field, "a non-negative whole number")),
        _ => Err(wrong_type(field, "a non-negative whole number")),
    }
}
