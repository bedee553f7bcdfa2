use async_trait::async_trait;
use bb8_redis::{
    bb8::Pool,
    redis::{self, AsyncCommands, JsonAsyncCommands, Script},
    RedisConnectionManager,
};
use serde_json::Value;
use tokio::sync::broadcast;

use libs::{
    clock_key, collection_pattern, generate_key,
    record::{now_millis, EpochMillis, RecordId},
    Collection, DocumentRedisJsonPath,
};

use super::{
    without_reserved, ChangeNotification, Document, DocumentStore, Fields, StoreError, WriteKind,
};

/// Same rule as `next_creation_time`, applied atomically on the server so
/// concurrent inserts from any process get distinct, increasing stamps.
const CLOCK_SCRIPT: &str = r"
local last = tonumber(redis.call('GET', KEYS[1]) or '0')
local now = tonumber(ARGV[1])
if now <= last then now = last + 1 end
redis.call('SET', KEYS[1], string.format('%d', now))
return now
";

/// RedisJSON-backed document store. Each document lives under
/// `<prefix>:<collection>:<id>` as one JSON value.
///
/// Change notifications are only delivered to subscribers of this process.
pub struct RedisStore {
    redis_pool: Pool<RedisConnectionManager>,
    key_prefix: String,
    clock_script: Script,
    change_tx: broadcast::Sender<ChangeNotification>,
}

/// `JSON.GET <key> $` answers with a one-element array, or nil when the key
/// is gone.
fn decode_root_reply(reply: Option<String>) -> Result<Option<Document>, StoreError> {
    let Some(data_str) = reply else {
        return Ok(None);
    };
    let values: Vec<Value> = serde_json::from_str(&data_str)?;
    values.into_iter().next().map(Document::from_value).transpose()
}

/// `JSON.TOGGLE` answers one entry per matched path: the new value as 1/0,
/// or nil when the value there is not a boolean.
fn decode_toggle_reply(reply: Vec<Option<i64>>, field: &str) -> Result<bool, StoreError> {
    match reply.into_iter().next().flatten() {
        Some(value) => Ok(value == 1),
        None => Err(StoreError::NotBoolean(field.to_string())),
    }
}

/// One `JSON.SET <key> $.<field>` per caller field, applied as a transaction.
fn patch_pipeline(key: &str, fields: Fields) -> Result<redis::Pipeline, StoreError> {
    let mut pipe = redis::pipe();
    pipe.atomic();
    for (name, value) in without_reserved(fields) {
        pipe.cmd("JSON.SET")
            .arg(key)
            .arg(DocumentRedisJsonPath::field(&name))
            .arg(serde_json::to_string(&value)?)
            .ignore();
    }
    Ok(pipe)
}

impl RedisStore {
    pub async fn connect(
        url: &str,
        min_idle: u32,
        key_prefix: &str,
        change_capacity: usize,
    ) -> Result<Self, StoreError> {
        let redis_manager = RedisConnectionManager::new(url)?;
        let redis_pool = Pool::builder()
            .min_idle(Some(min_idle))
            .build(redis_manager)
            .await?;
        let (change_tx, _) = broadcast::channel(change_capacity.max(1));

        Ok(RedisStore {
            redis_pool,
            key_prefix: key_prefix.to_string(),
            clock_script: Script::new(CLOCK_SCRIPT),
            change_tx,
        })
    }

    fn key(&self, collection: Collection, id: &RecordId) -> String {
        generate_key(&self.key_prefix, collection, id.as_str())
    }

    fn notify(&self, collection: Collection, id: &RecordId, kind: WriteKind) {
        let _ = self.change_tx.send(ChangeNotification {
            collection,
            id: id.clone(),
            kind,
        });
    }
}

#[async_trait]
impl DocumentStore for RedisStore {
    async fn insert(&self, collection: Collection, fields: Fields) -> Result<RecordId, StoreError> {
        let mut con = self.redis_pool.get().await?;

        let creation_time: EpochMillis = self
            .clock_script
            .key(clock_key(&self.key_prefix))
            .arg(now_millis())
            .invoke_async(&mut *con)
            .await?;

        let id = RecordId::generate();
        let key = self.key(collection, &id);
        let document = Document {
            id: id.clone(),
            creation_time,
            fields: without_reserved(fields),
        };
        let _: () = con
            .json_set(
                &key,
                DocumentRedisJsonPath::Root.to_string().as_str(),
                &document.into_value(),
            )
            .await?;
        tracing::debug!(%key, creation_time, "inserted");

        self.notify(collection, &id, WriteKind::Insert);
        Ok(id)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &RecordId,
    ) -> Result<Option<Document>, StoreError> {
        let mut con = self.redis_pool.get().await?;
        let key = self.key(collection, id);

        let reply = con
            .json_get::<&str, &str, Option<String>>(
                key.as_str(),
                DocumentRedisJsonPath::Root.to_string().as_str(),
            )
            .await?;
        decode_root_reply(reply)
    }

    async fn query(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        let mut con = self.redis_pool.get().await?;

        let pattern = collection_pattern(&self.key_prefix, collection);
        let mut keys: Vec<String> = vec![];
        {
            let mut iter = con.scan_match::<&str, String>(pattern.as_str()).await?;
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
        }

        let mut documents = Vec::with_capacity(keys.len());
        for key in keys {
            let reply = con
                .json_get::<&str, &str, Option<String>>(
                    key.as_str(),
                    DocumentRedisJsonPath::Root.to_string().as_str(),
                )
                .await?;
            match decode_root_reply(reply)? {
                Some(document) => documents.push(document),
                None => tracing::debug!(%key, "removed between scan and read"),
            }
        }

        Ok(documents)
    }

    async fn patch(
        &self,
        collection: Collection,
        id: &RecordId,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut con = self.redis_pool.get().await?;
        let key = self.key(collection, id);

        let exists: bool = con.exists(&key).await?;
        if !exists {
            return Err(StoreError::NotFound {
                collection,
                id: id.clone(),
            });
        }

        let _: () = patch_pipeline(&key, fields)?
            .query_async(&mut *con)
            .await?;

        self.notify(collection, id, WriteKind::Update);
        Ok(())
    }

    async fn toggle(
        &self,
        collection: Collection,
        id: &RecordId,
        field: &str,
    ) -> Result<Option<bool>, StoreError> {
        let mut con = self.redis_pool.get().await?;
        let key = self.key(collection, id);

        let exists: bool = con.exists(&key).await?;
        if !exists {
            return Ok(None);
        }

        let reply: Vec<Option<i64>> = con
            .json_toggle(&key, DocumentRedisJsonPath::field(field))
            .await?;
        let flipped = decode_toggle_reply(reply, field)?;

        self.notify(collection, id, WriteKind::Update);
        Ok(Some(flipped))
    }

    async fn delete(&self, collection: Collection, id: &RecordId) -> Result<bool, StoreError> {
        let mut con = self.redis_pool.get().await?;
        let key = self.key(collection, id);

        let removed: i64 = con.del(&key).await?;
        if removed > 0 {
            self.notify(collection, id, WriteKind::Delete);
        }
        Ok(removed > 0)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeNotification> {
        self.change_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn test_decode_root_reply() {
        let reply = r#"[{"_id":"t1","_creationTime":7,"title":"a","isCompleted":false}]"#;
        let doc = decode_root_reply(Some(reply.to_string()))
            .unwrap()
            .unwrap();
        assert_eq!(doc.id, RecordId::from("t1"));
        assert_eq!(doc.creation_time, 7);
        assert_eq!(doc.fields["title"], "a");

        assert!(decode_root_reply(None).unwrap().is_none());
        assert!(decode_root_reply(Some("[]".to_string())).unwrap().is_none());
    }

    #[test]
    fn test_decode_root_reply_malformed() {
        assert!(matches!(
            decode_root_reply(Some("not json".to_string())),
            Err(StoreError::Malformed(_))
        ));
        assert!(matches!(
            decode_root_reply(Some(r#"[{"title":"no id"}]"#.to_string())),
            Err(StoreError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_toggle_reply() {
        assert!(decode_toggle_reply(vec![Some(1)], "isCompleted").unwrap());
        assert!(!decode_toggle_reply(vec![Some(0)], "isCompleted").unwrap());
        assert!(matches!(
            decode_toggle_reply(vec![None], "title"),
            Err(StoreError::NotBoolean(field)) if field == "title"
        ));
        assert!(matches!(
            decode_toggle_reply(vec![], "missing"),
            Err(StoreError::NotBoolean(_))
        ));
    }

    #[test]
    fn test_patch_pipeline_skips_store_fields() {
        let fields: Fields = serde_json::from_value(serde_json::json!({
            "_id": "other",
            "_creationTime": 0,
            "title": "renamed",
        }))
        .unwrap();
        let packed = patch_pipeline("nmc:tasks:t1", fields)
            .unwrap()
            .get_packed_pipeline();

        assert!(contains(&packed, "MULTI"));
        assert!(contains(&packed, "$.title"));
        assert!(contains(&packed, "\"renamed\""));
        assert!(!contains(&packed, "_creationTime"));
        assert!(!contains(&packed, "$._id"));
    }
}
