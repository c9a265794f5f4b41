use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::document::{apply_updates, Document, FieldUpdates, Query};
use super::error::{StoreError, StoreResult};
use super::fanout::SubscriberRegistry;
use super::{DocumentStore, DocumentSubscription, QuerySnapshot, QuerySubscription};

type Collections = HashMap<String, HashMap<String, Document>>;

/// In-memory implementation of DocumentStore for development and testing
///
/// One instance is shared by every simulated client, so a write made through one
/// handle is observed by all subscribers. Data is lost when the process exits.
pub struct InMemoryDocumentStore {
    collections: Mutex<Collections>,
    subscribers: SubscriberRegistry,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Returns the number of documents in a collection (useful for debugging)
    pub fn document_count(&self, collection: &str) -> usize {
        self.lock()
            .map(|collections| collections.get(collection).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Collections>> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".to_string()))
    }

    fn listing(collections: &Collections, collection: &str) -> QuerySnapshot {
        collections
            .get(collection)
            .map(|documents| {
                documents
                    .iter()
                    .map(|(id, document)| (id.clone(), document.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    // Called with the collections lock held so every subscriber sees commits in order
    fn publish(&self, collections: &Collections, collection: &str, id: &str) {
        let snapshot = collections
            .get(collection)
            .and_then(|documents| documents.get(id));
        self.subscribers.notify_document(collection, id, snapshot);

        if self.subscribers.has_query_watchers(collection) {
            let listing = Self::listing(collections, collection);
            self.subscribers.notify_queries(collection, &listing);
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    #[instrument(skip(self, fields))]
    async fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: FieldUpdates,
    ) -> StoreResult<String> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        debug!(collection = %collection, id = %id, "Creating document in memory");

        let mut collections = self.lock()?;
        let documents = collections.entry(collection.to_string()).or_default();
        if documents.contains_key(&id) {
            warn!(collection = %collection, id = %id, "Document already exists in memory");
            return Err(StoreError::already_exists(collection, &id));
        }

        let mut document = Document::new();
        apply_updates(&mut document, &fields);
        documents.insert(id.clone(), document);

        self.publish(&collections, collection, &id);
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let collections = self.lock()?;
        Ok(collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned())
    }

    #[instrument(skip(self, fields))]
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: FieldUpdates,
    ) -> StoreResult<()> {
        debug!(collection = %collection, id = %id, field_count = fields.len(), "Merging document fields");

        let mut collections = self.lock()?;
        let document = collections
            .get_mut(collection)
            .and_then(|documents| documents.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        apply_updates(document, &fields);

        self.publish(&collections, collection, id);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let mut collections = self.lock()?;
        let removed = collections
            .get_mut(collection)
            .and_then(|documents| documents.remove(id));

        if removed.is_some() {
            debug!(collection = %collection, id = %id, "Document deleted from memory");
            self.publish(&collections, collection, id);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, collection: &str, id: &str) -> StoreResult<DocumentSubscription> {
        let collections = self.lock()?;
        let current = collections
            .get(collection)
            .and_then(|documents| documents.get(id))
            .cloned();
        Ok(self.subscribers.watch_document(collection, id, current))
    }

    #[instrument(skip(self, query))]
    async fn query(&self, collection: &str, query: Query) -> StoreResult<QuerySubscription> {
        let collections = self.lock()?;
        let listing = Self::listing(&collections, collection);
        Ok(self.subscribers.watch_query(collection, query, listing))
    }
}
