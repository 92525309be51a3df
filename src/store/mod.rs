//! Document store boundary.
//!
//! The lookup core talks to the run collection only through [`RunStore`], so the
//! in-memory backend used for fixtures and tests and the PostgreSQL JSONB backend
//! used in production are interchangeable behind an `Arc<dyn RunStore>`.

pub mod memory;
pub mod postgres;
pub mod users;

use std::fmt;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

pub use memory::MemoryRunStore;
pub use postgres::PgRunStore;

/// Name of the internal identifier field carried by every run document.
pub const ID_FIELD: &str = "_id";
/// Run number field.
pub const NUMBER_FIELD: &str = "number";
/// Timestamp name field (`YYMMDD_HHMM`).
pub const NAME_FIELD: &str = "name";

/// Errors raised by a store backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store connection failed: {0}")]
    Connection(String),

    #[error("Store query timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid collection name: {0}")]
    InvalidCollection(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("Already exists: {0}")]
    Conflict(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Equality predicate on one of the three unique run keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFilter {
    /// `{_id == id}`; the id is a normalized lowercase hex token
    Id(String),
    /// `{number == n}`
    Number(i64),
    /// `{name == s}`
    Name(String),
}

impl RunFilter {
    /// Document field the predicate applies to
    pub fn field(&self) -> &'static str {
        match self {
            RunFilter::Id(_) => ID_FIELD,
            RunFilter::Number(_) => NUMBER_FIELD,
            RunFilter::Name(_) => NAME_FIELD,
        }
    }

    pub fn value(&self) -> Value {
        match self {
            RunFilter::Id(id) => Value::String(id.clone()),
            RunFilter::Number(n) => Value::from(*n),
            RunFilter::Name(name) => Value::String(name.clone()),
        }
    }

    /// Filter in document-query form, e.g. `{"number": 7}`
    pub fn to_document(&self) -> Value {
        json!({ self.field(): self.value() })
    }

    /// Whether a stored document satisfies the predicate.
    ///
    /// Ids stored in extended form (`{"$oid": "..."}`) compare by their string
    /// value, case-insensitively. Numbers compare by integer value, whether
    /// stored as `7`, `7.0` or `{"$numberLong": "7"}`.
    pub fn matches(&self, document: &Value) -> bool {
        let Some(stored) = document.get(self.field()) else {
            return false;
        };

        match self {
            RunFilter::Id(id) => stored_id(stored).is_some_and(|s| s.eq_ignore_ascii_case(id)),
            RunFilter::Number(n) => stored_number(stored) == Some(*n),
            RunFilter::Name(name) => stored.as_str() == Some(name.as_str()),
        }
    }

    /// Every unique-key filter that would select `document`
    pub fn keys_of(document: &Value) -> Vec<RunFilter> {
        let mut keys = Vec::with_capacity(3);
        if let Some(id) = document.get(ID_FIELD).and_then(stored_id) {
            keys.push(RunFilter::Id(id.to_ascii_lowercase()));
        }
        if let Some(n) = document.get(NUMBER_FIELD).and_then(stored_number) {
            keys.push(RunFilter::Number(n));
        }
        if let Some(name) = document.get(NAME_FIELD).and_then(Value::as_str) {
            keys.push(RunFilter::Name(name.to_string()));
        }
        keys
    }
}

fn stored_id(stored: &Value) -> Option<&str> {
    match stored {
        Value::Object(map) => map.get("$oid").and_then(Value::as_str),
        other => other.as_str(),
    }
}

fn stored_number(stored: &Value) -> Option<i64> {
    match stored {
        Value::Object(map) => map.get("$numberLong")?.as_str()?.parse().ok(),
        Value::Number(n) => n.as_i64().or_else(|| {
            // jsonb compares numerically, so 7.0 is run 7 there too
            let f = n.as_f64()?;
            let integral = f.is_finite() && f.fract() == 0.0;
            (integral && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
        }),
        _ => None,
    }
}

impl fmt::Display for RunFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_document())
    }
}

/// Store-level projection: keep exactly one top-level field, and drop `_id`
/// unless `_id` is the field being asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub field: String,
    pub include_id: bool,
}

impl Projection {
    /// Projection in document-query form, e.g. `{"_id": 0, "data": 1}`
    pub fn to_document(&self) -> Value {
        if self.field == ID_FIELD {
            json!({ ID_FIELD: 1 })
        } else {
            let id_flag = u8::from(self.include_id);
            json!({ ID_FIELD: id_flag, self.field.as_str(): 1 })
        }
    }

    /// Apply the projection to a full document held in memory
    pub fn apply(&self, document: &Value) -> Value {
        let mut projected = serde_json::Map::new();
        if let Value::Object(map) = document {
            if let Some(v) = map.get(&self.field) {
                projected.insert(self.field.clone(), v.clone());
            }
            if self.include_id && self.field != ID_FIELD {
                if let Some(id) = map.get(ID_FIELD) {
                    projected.insert(ID_FIELD.to_string(), id.clone());
                }
            }
        }
        Value::Object(projected)
    }
}

/// Read access to the run collection
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Return the single document matching `filter`, reduced by `projection`,
    /// or `None` when nothing matches.
    async fn find_one(
        &self,
        filter: &RunFilter,
        projection: &Projection,
    ) -> Result<Option<Value>, StoreError>;

    /// Cheap round trip used by the health endpoint
    async fn ping(&self) -> Result<(), StoreError>;

    /// Human-readable description of the backend, safe to expose
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_documents_name_their_field() {
        assert_eq!(RunFilter::Number(7).to_document(), json!({"number": 7}));
        assert_eq!(
            RunFilter::Name("200101_0101".into()).to_document(),
            json!({"name": "200101_0101"})
        );
        assert_eq!(RunFilter::Id("abc123".into()).to_document(), json!({"_id": "abc123"}));
    }

    #[test]
    fn id_filter_matches_plain_and_extended_ids() {
        let filter = RunFilter::Id("5b8ff2a7e44de8a1e7c9a1f0".into());
        assert!(filter.matches(&json!({"_id": "5B8FF2A7E44DE8A1E7C9A1F0"})));
        assert!(filter.matches(&json!({"_id": {"$oid": "5b8ff2a7e44de8a1e7c9a1f0"}})));
        assert!(!filter.matches(&json!({"_id": "5b8ff2a7e44de8a1e7c9a1f1"})));
        assert!(!filter.matches(&json!({"number": 1})));
    }

    #[test]
    fn number_filter_ignores_non_integers() {
        let filter = RunFilter::Number(7);
        assert!(filter.matches(&json!({"number": 7})));
        assert!(filter.matches(&json!({"number": {"$numberLong": "7"}})));
        assert!(!filter.matches(&json!({"number": "7"})));
        assert!(!filter.matches(&json!({"number": 7.5})));
    }

    #[test]
    fn number_filter_matches_integral_floats() {
        let filter = RunFilter::Number(7);
        assert!(filter.matches(&json!({"number": 7.0})));
        assert!(!filter.matches(&json!({"number": 7.000001})));
        assert!(!RunFilter::Number(8).matches(&json!({"number": 7.0})));
    }

    #[test]
    fn keys_of_normalizes_every_stored_form() {
        let doc = json!({
            "_id": {"$oid": "ABC123"},
            "number": {"$numberLong": "7"},
            "name": "200101_0101"
        });
        assert_eq!(
            RunFilter::keys_of(&doc),
            vec![
                RunFilter::Id("abc123".into()),
                RunFilter::Number(7),
                RunFilter::Name("200101_0101".into()),
            ]
        );
        assert!(RunFilter::keys_of(&json!({"data": 1})).is_empty());
    }

    #[test]
    fn projection_drops_id_and_other_fields() {
        let doc = json!({"_id": "abc123", "number": 7, "data": {"x": 1}});
        let projection = Projection { field: "data".into(), include_id: false };
        assert_eq!(projection.apply(&doc), json!({"data": {"x": 1}}));
        assert_eq!(projection.to_document(), json!({"_id": 0, "data": 1}));
    }

    #[test]
    fn projection_of_id_keeps_id() {
        let doc = json!({"_id": "abc123", "number": 7});
        let projection = Projection { field: "_id".into(), include_id: false };
        assert_eq!(projection.apply(&doc), json!({"_id": "abc123"}));
        assert_eq!(projection.to_document(), json!({"_id": 1}));
    }

    #[test]
    fn projection_of_missing_field_is_empty() {
        let doc = json!({"_id": "abc123", "number": 7});
        let projection = Projection { field: "tags".into(), include_id: false };
        assert_eq!(projection.apply(&doc), json!({}));
    }
}
