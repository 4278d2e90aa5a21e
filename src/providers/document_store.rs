use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

/// Document store errors. Backend failures pass through unclassified and
/// unretried; callers see them immediately.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found")]
    NotFound,

    #[error("Document store error: {0}")]
    Backend(String),
}

/// A stored document: backend-assigned id plus its JSON fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// A value written to a document field. `ServerTimestamp` is resolved by the
/// store at write time, never by the caller.
#[derive(Debug, Clone)]
pub enum WriteValue {
    Value(Value),
    ServerTimestamp,
}

/// Equality filter on a single field. Documents missing the field do not
/// match.
#[derive(Debug, Clone)]
pub struct FieldFilter {
    pub field: String,
    pub equals: Value,
}

impl FieldFilter {
    pub fn equals(field: &str, value: Value) -> Self {
        Self {
            field: field.to_string(),
            equals: value,
        }
    }
}

/// Sort direction for query results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Ordering applied to query results
#[derive(Debug, Clone)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Ascending,
        }
    }

    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: Direction::Descending,
        }
    }
}

/// Trait defining document store operations
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Add a document to a collection; returns the backend-assigned id
    async fn add(
        &self,
        collection: &str,
        fields: HashMap<String, WriteValue>,
    ) -> Result<String, StoreError>;

    /// Fetch a single document by id
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Query a collection with an equality filter and ordering. An empty
    /// collection yields an empty result, not an error.
    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
        order: &OrderBy,
    ) -> Result<Vec<Document>, StoreError>;

    /// Merge the given fields into an existing document; fields not named
    /// are left untouched
    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: HashMap<String, WriteValue>,
    ) -> Result<(), StoreError>;
}

fn resolve(value: WriteValue) -> Value {
    match value {
        WriteValue::Value(v) => v,
        WriteValue::ServerTimestamp => Value::String(Utc::now().to_rfc3339()),
    }
}

/// Compare two optional field values for ordering. Numbers, strings and
/// booleans order naturally; a missing field sorts before any present one.
fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// In-memory document store for tests and local development. Collections
/// are created implicitly on first write.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<HashMap<String, HashMap<String, Map<String, Value>>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn add(
        &self,
        collection: &str,
        fields: HashMap<String, WriteValue>,
    ) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let resolved: Map<String, Value> = fields
            .into_iter()
            .map(|(name, value)| (name, resolve(value)))
            .collect();

        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.clone(), resolved);

        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
        order: &OrderBy,
    ) -> Result<Vec<Document>, StoreError> {
        let collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut matched: Vec<Document> = collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|(_, fields)| fields.get(&filter.field) == Some(&filter.equals))
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by(|a, b| {
            let ordering = compare_fields(a.fields.get(&order.field), b.fields.get(&order.field));
            match order.direction {
                Direction::Ascending => ordering,
                Direction::Descending => ordering.reverse(),
            }
        });

        Ok(matched)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        fields: HashMap<String, WriteValue>,
    ) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or(StoreError::NotFound)?;

        for (name, value) in fields {
            document.insert(name, resolve(value));
        }

        Ok(())
    }
}
