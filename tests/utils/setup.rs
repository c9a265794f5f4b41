use std::sync::Arc;
use std::time::Duration;

use petwheel::{GameConfig, GameRoomCoordinator, InMemoryDocumentStore, PetCatalog, PetSource, WheelPet};

use super::mocks::{FixedPetSource, RecordingProfileStore};

// ============================================================================
// Test Setup Infrastructure
// ============================================================================

pub struct TestSetup {
    pub store: Arc<InMemoryDocumentStore>,
    pub profiles: RecordingProfileStore,
    pub coordinator: GameRoomCoordinator,
}

impl TestSetup {
    /// A second client attached to the same store, as another player's device would be
    pub fn second_client(&self) -> GameRoomCoordinator {
        GameRoomCoordinator::new(
            self.store.clone(),
            Arc::new(self.profiles.clone()),
            Arc::new(PetCatalog::builtin()),
            self.coordinator.config().clone(),
        )
    }
}

pub struct TestSetupBuilder {
    config: GameConfig,
    pets: Option<Vec<WheelPet>>,
}

impl TestSetupBuilder {
    pub fn new() -> Self {
        Self {
            config: GameConfig::default(),
            pets: None,
        }
    }

    pub fn with_pets(mut self, pets: Vec<WheelPet>) -> Self {
        self.pets = Some(pets);
        self
    }

    pub fn with_total_rounds(mut self, total_rounds: u32) -> Self {
        self.config.total_rounds = total_rounds;
        self
    }

    /// Millisecond-scale turn timer so watchdog tests run quickly
    pub fn with_fast_watchdog(mut self, turn_timeout_ms: u64, interval_ms: u64) -> Self {
        self.config.turn_timeout = Duration::from_millis(turn_timeout_ms);
        self.config.watchdog_interval = Duration::from_millis(interval_ms);
        self
    }

    pub fn build(self) -> TestSetup {
        let store = Arc::new(InMemoryDocumentStore::new());
        let profiles = RecordingProfileStore::new();
        let pets: Arc<dyn PetSource> = match self.pets {
            Some(pets) => Arc::new(FixedPetSource::new(pets)),
            None => Arc::new(PetCatalog::builtin()),
        };
        let coordinator = GameRoomCoordinator::new(
            store.clone(),
            Arc::new(profiles.clone()),
            pets,
            self.config,
        );
        TestSetup {
            store,
            profiles,
            coordinator,
        }
    }
}
