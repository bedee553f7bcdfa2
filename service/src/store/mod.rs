use std::sync::Arc;

use async_trait::async_trait;
use bb8_redis::{bb8::RunError, redis};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::broadcast;

use libs::{
    record::{EpochMillis, RecordId},
    Collection,
};

use crate::config::ServiceConfig;

pub mod memory;
pub mod redis_json;

pub use memory::MemoryStore;
pub use redis_json::RedisStore;

pub type Fields = Map<String, Value>;

const ID_FIELD: &str = "_id";
const CREATION_TIME_FIELD: &str = "_creationTime";

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Timed out waiting for a store connection")]
    PoolTimedOut,

    #[error("Malformed document: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Field `{0}` is not a boolean")]
    NotBoolean(String),

    #[error("{collection} document `{id}` does not exist")]
    NotFound { collection: Collection, id: RecordId },
}

impl From<RunError<redis::RedisError>> for StoreError {
    fn from(err: RunError<redis::RedisError>) -> Self {
        match err {
            RunError::User(err) => StoreError::Redis(err),
            RunError::TimedOut => StoreError::PoolTimedOut,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
    Delete,
}

/// Emitted once for every successful write.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub collection: Collection,
    pub id: RecordId,
    pub kind: WriteKind,
}

/// A stored document: the store-owned `_id` and `_creationTime` plus the
/// caller's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: RecordId,
    pub creation_time: EpochMillis,
    pub fields: Fields,
}

impl Document {
    pub fn into_value(self) -> Value {
        let mut object = self.fields;
        object.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        object.insert(
            CREATION_TIME_FIELD.to_string(),
            Value::from(self.creation_time),
        );
        Value::Object(object)
    }

    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        let Value::Object(mut object) = value else {
            return Err(StoreError::Malformed(serde::de::Error::custom(
                "expected a JSON object",
            )));
        };
        let id = match object.remove(ID_FIELD) {
            Some(Value::String(id)) => RecordId::from(id),
            _ => {
                return Err(StoreError::Malformed(serde::de::Error::missing_field(
                    ID_FIELD,
                )))
            }
        };
        let creation_time = object
            .remove(CREATION_TIME_FIELD)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| {
                StoreError::Malformed(serde::de::Error::missing_field(CREATION_TIME_FIELD))
            })?;
        Ok(Document {
            id,
            creation_time,
            fields: object,
        })
    }

    /// Overwrites the caller's fields with `fields`, leaving the rest alone.
    pub fn merge(&mut self, fields: Fields) {
        self.fields.extend(without_reserved(fields));
    }

    pub fn into_record<T: DeserializeOwned>(self) -> Result<T, StoreError> {
        Ok(serde_json::from_value(self.into_value())?)
    }
}

/// Drops the store-owned keys from caller-supplied fields.
pub fn without_reserved(mut fields: Fields) -> Fields {
    fields.remove(ID_FIELD);
    fields.remove(CREATION_TIME_FIELD);
    fields
}

/// Next `_creationTime` after `last`: the wall clock, bumped so stamps keep
/// strictly increasing within one store.
pub fn next_creation_time(now: EpochMillis, last: EpochMillis) -> EpochMillis {
    now.max(last + 1)
}

/// Serializes a payload into the field map of a new document.
pub fn to_fields<T: serde::Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::Malformed(serde::ser::Error::custom(
            "expected a JSON object",
        ))),
    }
}

/// The primitives of the hosted document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Stores `fields` as a new document and returns its fresh id.
    async fn insert(&self, collection: Collection, fields: Fields) -> Result<RecordId, StoreError>;

    async fn get(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError>;

    /// Every document of `collection`, in no particular order.
    async fn query(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// Shallow merge of `fields` into an existing document. The store-owned
    /// `_id` and `_creationTime` are never overwritten.
    async fn patch(
        &self,
        collection: Collection,
        id: &RecordId,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Atomically negates a boolean field. `None` when no such document exists.
    async fn toggle(
        &self,
        collection: Collection,
        id: &RecordId,
        field: &str,
    ) -> Result<Option<bool>, StoreError>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool, StoreError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification>;
}

/// Opens the store named by the configuration: Redis when a URL is set,
/// otherwise a process-local memory store.
pub async fn open(config: &ServiceConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match &config.redis_url {
        Some(url) => {
            let store = RedisStore::connect(
                url,
                config.redis_min_idle,
                &config.key_prefix,
                config.change_capacity,
            )
            .await?;
            tracing::info!(prefix = %config.key_prefix, "Check: redis document store reachable.");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("NMC_REDIS_URL not set, records are kept in memory.");
            Ok(Arc::new(MemoryStore::new(config.change_capacity)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_value_round_trip() {
        let mut fields = Fields::new();
        fields.insert("text".to_string(), Value::from("hi"));
        let doc = Document {
            id: RecordId::from("m1"),
            creation_time: 12,
            fields,
        };
        let value = doc.clone().into_value();
        assert_eq!(
            value,
            serde_json::json!({"_id": "m1", "_creationTime": 12, "text": "hi"})
        );
        assert_eq!(Document::from_value(value).unwrap(), doc);
    }

    #[test]
    fn test_merge_keeps_store_fields() {
        let mut doc = Document {
            id: RecordId::from("t1"),
            creation_time: 5,
            fields: serde_json::from_value(serde_json::json!({"title": "a", "isCompleted": false}))
                .unwrap(),
        };
        let patch: Fields = serde_json::from_value(serde_json::json!({
            "_id": "other",
            "_creationTime": 0,
            "isCompleted": true,
        }))
        .unwrap();
        doc.merge(patch);
        assert_eq!(
            doc.into_value(),
            serde_json::json!({"_id": "t1", "_creationTime": 5, "title": "a", "isCompleted": true})
        );
    }

    #[test]
    fn test_next_creation_time_is_strictly_increasing() {
        assert_eq!(next_creation_time(100, 40), 100);
        assert_eq!(next_creation_time(100, 100), 101);
        assert_eq!(next_creation_time(90, 100), 101);
    }

    #[test]
    fn test_document_without_id_is_malformed() {
        let res = Document::from_value(serde_json::json!({"_creationTime": 1}));
        assert!(matches!(res, Err(StoreError::Malformed(_))));
        let res = Document::from_value(serde_json::json!([1, 2]));
        assert!(matches!(res, Err(StoreError::Malformed(_))));
    }
}
