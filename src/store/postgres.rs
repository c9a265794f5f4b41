use async_trait::async_trait;
use serde_json::Value;
use sqlx::{types::Json, PgPool, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::document::{apply_updates, Document, FieldUpdates, Query};
use super::error::{StoreError, StoreResult};
use super::fanout::SubscriberRegistry;
use super::{DocumentStore, DocumentSubscription, QuerySnapshot, QuerySubscription};

/// PostgreSQL implementation of DocumentStore
///
/// Documents live as JSONB rows in a single `documents` table. Merges are resolved in
/// Rust inside a row-locking transaction so sentinels behave exactly as in memory.
/// Live subscriptions observe writes made through this process only.
pub struct PostgresDocumentStore {
    pool: PgPool,
    subscribers: SubscriberRegistry,
}

fn backend(error: sqlx::Error) -> StoreError {
    warn!(error = %error, "PostgreSQL document store error");
    StoreError::Backend(error.to_string())
}

fn into_document(value: Value) -> StoreResult<Document> {
    match value {
        Value::Object(document) => Ok(document),
        other => Err(StoreError::Malformed(format!(
            "expected a JSON object, found {}",
            other
        ))),
    }
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Connects and makes sure the documents table exists
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(database_url).await.map_err(backend)?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                data JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        info!("Documents table ready");
        Ok(())
    }

    async fn load_collection(&self, collection: &str) -> StoreResult<QuerySnapshot> {
        let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = $1")
            .bind(collection)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get("id").map_err(backend)?;
                let Json(data): Json<Value> = row.try_get("data").map_err(backend)?;
                Ok((id, into_document(data)?))
            })
            .collect()
    }

    async fn publish(&self, collection: &str, id: &str, snapshot: Option<&Document>) {
        self.subscribers.notify_document(collection, id, snapshot);

        if self.subscribers.has_query_watchers(collection) {
            match self.load_collection(collection).await {
                Ok(listing) => self.subscribers.notify_queries(collection, &listing),
                Err(e) => warn!(collection = %collection, error = %e, "Failed to refresh live queries"),
            }
        }
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
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

        let mut document = Document::new();
        apply_updates(&mut document, &fields);

        let result = sqlx::query(
            "INSERT INTO documents (collection, id, data) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(collection)
        .bind(&id)
        .bind(Json(Value::Object(document.clone())))
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            warn!(collection = %collection, id = %id, "Document already exists in database");
            return Err(StoreError::already_exists(collection, &id));
        }

        debug!(collection = %collection, id = %id, "Document created in database");
        self.publish(collection, &id, Some(&document)).await;
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(row) => {
                let Json(data): Json<Value> = row.try_get("data").map_err(backend)?;
                Ok(Some(into_document(data)?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self, fields))]
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        fields: FieldUpdates,
    ) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query(
            "SELECT data FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?
        .ok_or_else(|| StoreError::not_found(collection, id))?;

        let Json(data): Json<Value> = row.try_get("data").map_err(backend)?;
        let mut document = into_document(data)?;
        apply_updates(&mut document, &fields);

        sqlx::query(
            "UPDATE documents SET data = $3, updated_at = now() WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(Json(Value::Object(document.clone())))
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;

        debug!(collection = %collection, id = %id, field_count = fields.len(), "Document merged in database");
        self.publish(collection, id, Some(&document)).await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_document(&self, collection: &str, id: &str) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() > 0 {
            debug!(collection = %collection, id = %id, "Document deleted from database");
            self.publish(collection, id, None).await;
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, collection: &str, id: &str) -> StoreResult<DocumentSubscription> {
        let current = self.get_document(collection, id).await?;
        Ok(self.subscribers.watch_document(collection, id, current))
    }

    #[instrument(skip(self, query))]
    async fn query(&self, collection: &str, query: Query) -> StoreResult<QuerySubscription> {
        let listing = self.load_collection(collection).await?;
        Ok(self.subscribers.watch_query(collection, query, listing))
    }
}
