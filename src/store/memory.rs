use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use super::{Projection, RunFilter, RunStore, StoreError, ID_FIELD, NAME_FIELD, NUMBER_FIELD};

/// Run collection held in process memory.
///
/// Backs development servers started from a JSON fixture and every test that
/// needs a store double.
#[derive(Default)]
pub struct MemoryRunStore {
    documents: RwLock<Vec<Value>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from documents, rejecting duplicates on any unique key
    pub fn with_documents(documents: Vec<Value>) -> Result<Self, StoreError> {
        for (i, doc) in documents.iter().enumerate() {
            check_document(doc)?;
            if let Some(other) = documents[..i].iter().find(|prev| collides(prev, doc)) {
                return Err(StoreError::Fixture(format!(
                    "duplicate run key between {} and {}",
                    key_summary(other),
                    key_summary(doc)
                )));
            }
        }

        Ok(Self {
            documents: RwLock::new(documents),
        })
    }

    /// Load a JSON array of run documents from disk
    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Fixture(format!("{}: {}", path.display(), e)))?;
        let documents: Vec<Value> = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Fixture(format!("{}: {}", path.display(), e)))?;

        let store = Self::with_documents(documents)?;
        info!("Loaded {} run documents from {}", store.len().await, path.display());
        Ok(store)
    }

    async fn len(&self) -> usize {
        self.documents.read().await.len()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn find_one(
        &self,
        filter: &RunFilter,
        projection: &Projection,
    ) -> Result<Option<Value>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .iter()
            .find(|doc| filter.matches(doc))
            .map(|doc| projection.apply(doc)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

fn check_document(doc: &Value) -> Result<(), StoreError> {
    if !doc.is_object() {
        return Err(StoreError::Fixture(format!("run document is not an object: {}", doc)));
    }
    Ok(())
}

/// Two documents collide when any lookup key of one would also select the other
fn collides(a: &Value, b: &Value) -> bool {
    RunFilter::keys_of(a).iter().any(|key| key.matches(b))
}

fn key_summary(doc: &Value) -> String {
    format!(
        "(_id={}, number={}, name={})",
        doc.get(ID_FIELD).unwrap_or(&Value::Null),
        doc.get(NUMBER_FIELD).unwrap_or(&Value::Null),
        doc.get(NAME_FIELD).unwrap_or(&Value::Null)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(id: &str, number: i64, name: &str) -> Value {
        json!({"_id": id, "number": number, "name": name, "data": {"n": number}})
    }

    #[tokio::test]
    async fn finds_projected_document() {
        let store = MemoryRunStore::with_documents(vec![
            run("aa01", 1, "200101_0101"),
            run("aa02", 2, "200101_0102"),
        ])
        .unwrap();

        let projection = Projection { field: "data".into(), include_id: false };
        let found = store.find_one(&RunFilter::Number(2), &projection).await.unwrap();
        assert_eq!(found, Some(json!({"data": {"n": 2}})));
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let store = MemoryRunStore::new();
        let projection = Projection { field: "data".into(), include_id: false };
        let found = store.find_one(&RunFilter::Number(2), &projection).await.unwrap();
        assert_eq!(found, None);
    }

    #[test]
    fn rejects_duplicate_keys() {
        let result = MemoryRunStore::with_documents(vec![
            run("aa01", 1, "200101_0101"),
            run("aa02", 1, "200101_0102"),
        ]);
        assert!(matches!(result, Err(StoreError::Fixture(_))));
    }

    #[test]
    fn rejects_non_object_documents() {
        let result = MemoryRunStore::with_documents(vec![json!([1, 2, 3])]);
        assert!(matches!(result, Err(StoreError::Fixture(_))));
    }

    #[test]
    fn rejects_ids_equal_after_normalization() {
        let result = MemoryRunStore::with_documents(vec![
            json!({"_id": "abc123", "number": 1, "name": "200101_0101"}),
            json!({"_id": {"$oid": "ABC123"}, "number": 2, "name": "200101_0102"}),
        ]);
        assert!(matches!(result, Err(StoreError::Fixture(_))));
    }

    #[test]
    fn rejects_numbers_equal_after_normalization() {
        for other in [json!({"$numberLong": "7"}), json!(7.0)] {
            let result = MemoryRunStore::with_documents(vec![
                json!({"_id": "aa01", "number": 7, "name": "200101_0101"}),
                json!({"_id": "aa02", "number": other, "name": "200101_0102"}),
            ]);
            assert!(matches!(result, Err(StoreError::Fixture(_))), "accepted {}", other);
        }
    }

    #[test]
    fn documents_without_keys_do_not_collide() {
        let store = MemoryRunStore::with_documents(vec![json!({"data": 1}), json!({"data": 1})]);
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn integral_float_run_number_is_found() {
        let store = MemoryRunStore::with_documents(vec![json!({"_id": "aa01", "number": 7.0, "data": 1})]).unwrap();
        let projection = Projection { field: "data".into(), include_id: false };
        let found = store.find_one(&RunFilter::Number(7), &projection).await.unwrap();
        assert_eq!(found, Some(json!({"data": 1})));
    }

    #[tokio::test]
    async fn loads_fixture_file() {
        let path = std::env::temp_dir().join(format!("runsdb-fixture-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, json!([run("aa01", 1, "200101_0101")]).to_string()).unwrap();

        let store = MemoryRunStore::from_json_file(&path).await.unwrap();
        assert_eq!(store.len().await, 1);

        std::fs::remove_file(&path).ok();
    }
}
