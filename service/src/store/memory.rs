use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use libs::{
    record::{now_millis, EpochMillis, RecordId},
    Collection,
};

use super::{
    next_creation_time, ChangeNotification, Document, DocumentStore, Fields, StoreError, WriteKind,
};

#[derive(Default)]
struct Collections {
    documents: HashMap<Collection, Vec<Document>>,
    last_creation_time: EpochMillis,
}

/// Process-local document store. Every operation runs under one lock, so
/// toggles never interleave.
pub struct MemoryStore {
    inner: Mutex<Collections>,
    change_tx: broadcast::Sender<ChangeNotification>,
}

impl MemoryStore {
    pub fn new(change_capacity: usize) -> Self {
        let (change_tx, _) = broadcast::channel(change_capacity.max(1));
        MemoryStore {
            inner: Mutex::new(Collections::default()),
            change_tx,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, collection: Collection, id: &RecordId, kind: WriteKind) {
        // No subscribers is fine.
        let _ = self.change_tx.send(ChangeNotification {
            collection,
            id: id.clone(),
            kind,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(64)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: Collection, fields: Fields) -> Result<RecordId, StoreError> {
        let id = RecordId::generate();
        {
            let mut inner = self.lock();
            let creation_time = next_creation_time(now_millis(), inner.last_creation_time);
            inner.last_creation_time = creation_time;
            inner
                .documents
                .entry(collection)
                .or_default()
                .push(Document {
                    id: id.clone(),
                    creation_time,
                    fields,
                });
        }
        self.notify(collection, &id, WriteKind::Insert);
        Ok(id)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError> {
        Ok(self
            .lock()
            .documents
            .get(&collection)
            .and_then(|docs| docs.iter().find(|doc| &doc.id == id))
            .cloned())
    }

    async fn query(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .lock()
            .documents
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn patch(
        &self,
        collection: Collection,
        id: &RecordId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        {
            let mut inner = self.lock();
            let Some(document) = inner
                .documents
                .get_mut(&collection)
                .and_then(|docs| docs.iter_mut().find(|doc| &doc.id == id))
            else {
                return Err(StoreError::NotFound {
                    collection,
                    id: id.clone(),
                });
            };
            document.merge(fields);
        }
        self.notify(collection, id, WriteKind::Update);
        Ok(())
    }

    async fn toggle(
        &self,
        collection: Collection,
        id: &RecordId,
        field: &str,
    ) -> Result<Option<bool>, StoreError> {
        let flipped = {
            let mut inner = self.lock();
            let Some(document) = inner
                .documents
                .get_mut(&collection)
                .and_then(|docs| docs.iter_mut().find(|doc| &doc.id == id))
            else {
                return Ok(None);
            };
            let current = match document.fields.get(field) {
                Some(Value::Bool(current)) => *current,
                _ => return Err(StoreError::NotBoolean(field.to_string())),
            };
            document.fields.insert(field.to_string(), Value::Bool(!current));
            !current
        };
        self.notify(collection, id, WriteKind::Update);
        Ok(Some(flipped))
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool, StoreError> {
        let removed = {
            let mut inner = self.lock();
            match inner.documents.get_mut(&collection) {
                Some(docs) => {
                    let before = docs.len();
                    docs.retain(|doc| &doc.id != id);
                    docs.len() != before
                }
                None => false,
            }
        };
        if removed {
            self.notify(collection, id, WriteKind::Delete);
        }
        Ok(removed)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(fields) => fields,
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn test_insert_then_query() {
        let store = MemoryStore::default();
        let first = store
            .insert(Collection::Messages, fields(serde_json::json!({"text": "a"})))
            .await
            .unwrap();
        let second = store
            .insert(Collection::Messages, fields(serde_json::json!({"text": "b"})))
            .await
            .unwrap();
        assert_ne!(first, second);

        let docs = store.query(Collection::Messages).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].creation_time < docs[1].creation_time);
        assert!(store.query(Collection::Tasks).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_flips_and_reports_missing() {
        let store = MemoryStore::default();
        let id = store
            .insert(
                Collection::Tasks,
                fields(serde_json::json!({"isCompleted": false})),
            )
            .await
            .unwrap();
        assert_eq!(
            store.toggle(Collection::Tasks, &id, "isCompleted").await.unwrap(),
            Some(true)
        );
        assert_eq!(
            store.toggle(Collection::Tasks, &id, "isCompleted").await.unwrap(),
            Some(false)
        );
        let missing = RecordId::from("missing");
        assert_eq!(
            store
                .toggle(Collection::Tasks, &missing, "isCompleted")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_get_and_patch() {
        let store = MemoryStore::default();
        let id = store
            .insert(
                Collection::Tasks,
                fields(serde_json::json!({"title": "t", "isCompleted": false})),
            )
            .await
            .unwrap();
        let mut rx = store.subscribe();

        store
            .patch(
                Collection::Tasks,
                &id,
                fields(serde_json::json!({"title": "renamed", "assignedTo": "Sarah"})),
            )
            .await
            .unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.kind, WriteKind::Update);

        let doc = store.get(Collection::Tasks, &id).await.unwrap().unwrap();
        assert_eq!(doc.id, id);
        assert_eq!(doc.fields["title"], "renamed");
        assert_eq!(doc.fields["assignedTo"], "Sarah");
        assert_eq!(doc.fields["isCompleted"], false);

        // Same id, wrong collection.
        assert!(store.get(Collection::Messages, &id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_missing_document() {
        let store = MemoryStore::default();
        let mut rx = store.subscribe();
        let res = store
            .patch(
                Collection::Tasks,
                &RecordId::from("missing"),
                fields(serde_json::json!({"title": "t"})),
            )
            .await;
        assert!(matches!(res, Err(StoreError::NotFound { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_toggle_rejects_non_boolean() {
        let store = MemoryStore::default();
        let id = store
            .insert(Collection::Tasks, fields(serde_json::json!({"title": "t"})))
            .await
            .unwrap();
        assert!(matches!(
            store.toggle(Collection::Tasks, &id, "title").await,
            Err(StoreError::NotBoolean(_))
        ));
    }

    #[tokio::test]
    async fn test_writes_notify_subscribers() {
        let store = MemoryStore::default();
        let mut rx = store.subscribe();
        let id = store
            .insert(Collection::Forms, fields(serde_json::json!({"name": "n"})))
            .await
            .unwrap();
        let change = rx.recv().await.unwrap();
        assert_eq!(change.collection, Collection::Forms);
        assert_eq!(change.id, id);
        assert_eq!(change.kind, WriteKind::Insert);

        assert!(store.delete(Collection::Forms, &id).await.unwrap());
        assert_eq!(rx.recv().await.unwrap().kind, WriteKind::Delete);

        // Nothing removed, nothing announced.
        assert!(!store.delete(Collection::Forms, &id).await.unwrap());
        assert!(rx.try_recv().is_err());
    }
}
