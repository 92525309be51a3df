use serde_json::Value;
use thiserror::Error;

use crate::store::{Projection, ID_FIELD};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProjectionError {
    #[error("Field '{0}' is not present in the run document")]
    FieldAbsent(String),
}

/// Projection that fetches only `field`. The internal id is left out unless it
/// is the field itself.
pub fn project(field: &str) -> Projection {
    Projection {
        field: field.to_string(),
        include_id: field == ID_FIELD,
    }
}

/// Take the value stored under `field` out of a (projected) run document.
///
/// The field is a single top-level key; a dotted name is looked up literally
/// and does not descend into nested sections.
pub fn extract(document: Value, field: &str) -> Result<Value, ProjectionError> {
    match document {
        Value::Object(mut map) => map
            .remove(field)
            .ok_or_else(|| ProjectionError::FieldAbsent(field.to_string())),
        _ => Err(ProjectionError::FieldAbsent(field.to_string())),
    }
}
