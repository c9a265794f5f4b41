use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use petwheel::{AppError, PetSource, ProfileStore, WheelPet};

// ============================================================================
// Mock Infrastructure
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileCall {
    AwardPoints { user_id: String, delta: u64 },
    IncrementWins { user_id: String },
}

/// Profile store that remembers every side effect it was asked for
#[derive(Clone, Default)]
pub struct RecordingProfileStore {
    calls: Arc<Mutex<Vec<ProfileCall>>>,
}

impl RecordingProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ProfileCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn points_for(&self, user_id: &str) -> u64 {
        self.calls()
            .iter()
            .map(|call| match call {
                ProfileCall::AwardPoints { user_id: id, delta } if id == user_id => *delta,
                _ => 0,
            })
            .sum()
    }

    pub fn wins_for(&self, user_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProfileCall::IncrementWins { user_id: id } if id == user_id))
            .count()
    }
}

#[async_trait]
impl ProfileStore for RecordingProfileStore {
    async fn award_points(&self, user_id: &str, delta: u64) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(ProfileCall::AwardPoints {
            user_id: user_id.to_string(),
            delta,
        });
        Ok(())
    }

    async fn increment_win_count(&self, user_id: &str) -> Result<(), AppError> {
        self.calls.lock().unwrap().push(ProfileCall::IncrementWins {
            user_id: user_id.to_string(),
        });
        Ok(())
    }
}

/// Pet source that always offers the same candidates
pub struct FixedPetSource {
    pets: Vec<WheelPet>,
}

impl FixedPetSource {
    pub fn new(pets: Vec<WheelPet>) -> Self {
        Self { pets }
    }
}

impl PetSource for FixedPetSource {
    fn wheel_candidates(&self) -> Vec<WheelPet> {
        self.pets.clone()
    }
}
