// Document store boundary: the hosted database every client reads from and writes to

pub use document::{
    apply_updates, compare_values, server_timestamp_now, Direction, Document, FieldPath,
    FieldUpdates, FieldValue, Filter, FilterOp, Query,
};
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

mod document;
mod error;
mod fanout;
mod memory;
mod postgres;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Current contents of a live query, as `(document id, document)` pairs
pub type QuerySnapshot = Vec<(String, Document)>;

/// Live view of a single document.
/// Yields the current snapshot first, then one snapshot per committed mutation;
/// `Some(None)` means the document was deleted. Dropping it unsubscribes.
pub struct DocumentSubscription {
    receiver: mpsc::UnboundedReceiver<Option<Document>>,
}

impl DocumentSubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<Option<Document>>) -> Self {
        Self { receiver }
    }

    pub async fn next(&mut self) -> Option<Option<Document>> {
        self.receiver.recv().await
    }
}

/// Live result list of a collection query, re-delivered in full on every change
pub struct QuerySubscription {
    receiver: mpsc::UnboundedReceiver<QuerySnapshot>,
}

impl QuerySubscription {
    pub fn new(receiver: mpsc::UnboundedReceiver<QuerySnapshot>) -> Self {
        Self { receiver }
    }

    pub async fn next(&mut self) -> Option<QuerySnapshot> {
        self.receiver.recv().await
    }
}

/// Trait for document store operations
///
/// Updates merge into the stored document field by field with last-write-wins;
/// there is no compare-and-swap across a read and a later write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates a document, generating an id when none is given
    async fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: FieldUpdates,
    ) -> StoreResult<String>;

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>>;

    /// Merges `fields` into an existing document
    async fn update_document(&self, collection: &str, id: &str, fields: FieldUpdates)
        -> StoreResult<()>;

    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()>;

    async fn subscribe(&self, collection: &str, id: &str) -> StoreResult<DocumentSubscription>;

    async fn query(&self, collection: &str, query: Query) -> StoreResult<QuerySubscription>;
}

/// Merges `fields` into a document, creating it when it does not exist yet
pub async fn upsert_document(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    fields: FieldUpdates,
) -> StoreResult<()> {
    match store.update_document(collection, id, fields.clone()).await {
        Err(StoreError::NotFound { .. }) => {
            match store.create_document(collection, Some(id), fields.clone()).await {
                Ok(_) => Ok(()),
                // Lost a create race; merge into the winner
                Err(StoreError::AlreadyExists { .. }) => {
                    store.update_document(collection, id, fields).await
                }
                Err(e) => Err(e),
            }
        }
        other => other,
    }
}
