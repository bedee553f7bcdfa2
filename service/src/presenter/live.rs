use std::{marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};

use libs::{
    record::{Message, Task},
    Collection,
};

use super::{
    logic::{perform_get_messages, perform_get_tasks},
    RuntimeError,
};
use crate::store::{ChangeNotification, DocumentStore};

/// A record type whose full, ordered listing can be watched.
#[async_trait]
pub trait Listing: Sized + Send + 'static {
    const COLLECTION: Collection;

    async fn list(store: &dyn DocumentStore) -> Result<Vec<Self>, RuntimeError>;
}

#[async_trait]
impl Listing for Task {
    const COLLECTION: Collection = Collection::Tasks;

    async fn list(store: &dyn DocumentStore) -> Result<Vec<Self>, RuntimeError> {
        perform_get_tasks(store).await
    }
}

#[async_trait]
impl Listing for Message {
    const COLLECTION: Collection = Collection::Messages;

    async fn list(store: &dyn DocumentStore) -> Result<Vec<Self>, RuntimeError> {
        perform_get_messages(store).await
    }
}

/// Yields the current listing once, then a fresh listing after every change
/// to the watched collection.
pub struct LiveQuery<T> {
    store: Arc<dyn DocumentStore>,
    change_rx: broadcast::Receiver<ChangeNotification>,
    primed: bool,
    _records: PhantomData<fn() -> T>,
}

impl<T: Listing> LiveQuery<T> {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        // Subscribe before the first read so no change slips in between.
        let change_rx = store.subscribe();
        LiveQuery {
            store,
            change_rx,
            primed: false,
            _records: PhantomData,
        }
    }

    /// `None` once the store stops publishing changes.
    pub async fn next(&mut self) -> Option<Result<Vec<T>, RuntimeError>> {
        if self.primed {
            loop {
                match self.change_rx.recv().await {
                    Ok(change) if change.collection == T::COLLECTION => {
                        tracing::debug!(
                            collection = %change.collection,
                            id = %change.id,
                            kind = ?change.kind,
                            "live query refresh"
                        );
                        break;
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        // A full listing covers whatever was missed.
                        tracing::warn!(collection = %T::COLLECTION, skipped, "live query lagged");
                        break;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
        self.primed = true;
        Some(T::list(self.store.as_ref()).await)
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<T>, RuntimeError>> + Send {
        futures::stream::unfold(self, |mut live| async move {
            let snapshot = live.next().await?;
            Some((snapshot, live))
        })
    }
}
