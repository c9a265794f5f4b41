use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use super::document::{Document, Query};
use super::{DocumentSubscription, QuerySnapshot, QuerySubscription};

struct DocumentWatcher {
    collection: String,
    id: String,
    sender: mpsc::UnboundedSender<Option<Document>>,
}

struct QueryWatcher {
    collection: String,
    query: Query,
    sender: mpsc::UnboundedSender<QuerySnapshot>,
}

#[derive(Default)]
struct Watchers {
    documents: Vec<DocumentWatcher>,
    queries: Vec<QueryWatcher>,
}

/// Pushes full snapshots to live document and query subscribers.
/// Subscribers whose receiving half was dropped are pruned on the next notification.
#[derive(Default)]
pub struct SubscriberRegistry {
    watchers: Mutex<Watchers>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_watchers<R>(&self, f: impl FnOnce(&mut Watchers) -> R) -> R {
        let mut guard = match self.watchers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    /// Registers a document watcher and queues `initial` as its first snapshot
    pub fn watch_document(
        &self,
        collection: &str,
        id: &str,
        initial: Option<Document>,
    ) -> DocumentSubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(initial);
        self.with_watchers(|watchers| {
            watchers.documents.push(DocumentWatcher {
                collection: collection.to_string(),
                id: id.to_string(),
                sender,
            })
        });
        DocumentSubscription::new(receiver)
    }

    /// Registers a query watcher and queues the query result over `current` as its first snapshot
    pub fn watch_query(
        &self,
        collection: &str,
        query: Query,
        current: QuerySnapshot,
    ) -> QuerySubscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(query.apply(current));
        self.with_watchers(|watchers| {
            watchers.queries.push(QueryWatcher {
                collection: collection.to_string(),
                query,
                sender,
            })
        });
        QuerySubscription::new(receiver)
    }

    pub fn notify_document(&self, collection: &str, id: &str, snapshot: Option<&Document>) {
        self.with_watchers(|watchers| {
            watchers.documents.retain(|watcher| {
                if watcher.collection != collection || watcher.id != id {
                    return !watcher.sender.is_closed();
                }
                watcher.sender.send(snapshot.cloned()).is_ok()
            });
        });
        debug!(collection = %collection, id = %id, "Document snapshot published");
    }

    pub fn has_query_watchers(&self, collection: &str) -> bool {
        self.with_watchers(|watchers| {
            watchers
                .queries
                .iter()
                .any(|watcher| watcher.collection == collection && !watcher.sender.is_closed())
        })
    }

    /// Re-runs every live query on `collection` against its current contents
    pub fn notify_queries(&self, collection: &str, current: &QuerySnapshot) {
        self.with_watchers(|watchers| {
            watchers.queries.retain(|watcher| {
                if watcher.collection != collection {
                    return !watcher.sender.is_closed();
                }
                watcher
                    .sender
                    .send(watcher.query.apply(current.iter().cloned()))
                    .is_ok()
            });
        });
    }
}
