// User profile counters touched when a game is won
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::shared::AppError;
use crate::store::{upsert_document, DocumentStore, FieldUpdates};

pub const USERS_COLLECTION: &str = "users";

/// Trait for the user profile side effects of winning
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn award_points(&self, user_id: &str, delta: u64) -> Result<(), AppError>;
    async fn increment_win_count(&self, user_id: &str) -> Result<(), AppError>;
}

/// Profile counters kept as `rewardPoints` / `gameWins` on `users/{userId}`
pub struct DocumentProfileStore {
    store: Arc<dyn DocumentStore>,
}

impl DocumentProfileStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ProfileStore for DocumentProfileStore {
    #[instrument(skip(self))]
    async fn award_points(&self, user_id: &str, delta: u64) -> Result<(), AppError> {
        let delta = i64::try_from(delta)
            .map_err(|_| AppError::BadRequest(format!("Point delta {} too large", delta)))?;
        upsert_document(
            self.store.as_ref(),
            USERS_COLLECTION,
            user_id,
            FieldUpdates::new().increment("rewardPoints", delta),
        )
        .await?;

        info!(user_id = %user_id, delta, "Reward points awarded");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn increment_win_count(&self, user_id: &str) -> Result<(), AppError> {
        upsert_document(
            self.store.as_ref(),
            USERS_COLLECTION,
            user_id,
            FieldUpdates::new().increment("gameWins", 1),
        )
        .await?;

        info!(user_id = %user_id, "Win count incremented");
        Ok(())
    }
}
