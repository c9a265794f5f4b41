use rand::seq::IndexedRandom;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One slice of the wheel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WheelPet {
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub value: f64,
}

impl WheelPet {
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && self.value.is_finite() && self.value >= 0.0
    }
}

/// Source of candidate pets for new wheels
pub trait PetSource: Send + Sync {
    fn wheel_candidates(&self) -> Vec<WheelPet>;
}

/// Uniform random sample without replacement; returns fewer pets if there are not enough
pub fn sample_wheel(candidates: &[WheelPet], count: usize) -> Vec<WheelPet> {
    candidates
        .choose_multiple(&mut rand::rng(), count)
        .cloned()
        .collect()
}

/// Picks the slice the wheel lands on
pub fn spin_wheel(wheel: &[WheelPet]) -> Option<WheelPet> {
    wheel.choose(&mut rand::rng()).cloned()
}

/// Pre-filtered pet list loaded from JSON, with a built-in fallback
#[derive(Debug, Clone)]
pub struct PetCatalog {
    pets: Vec<WheelPet>,
}

impl PetCatalog {
    pub fn new(pets: Vec<WheelPet>) -> Self {
        let total = pets.len();
        let pets: Vec<WheelPet> = pets.into_iter().filter(WheelPet::is_valid).collect();
        if pets.len() < total {
            warn!(dropped = total - pets.len(), "Ignoring invalid pets in catalog");
        }
        Self { pets }
    }

    /// Reads a JSON array of pets, falling back to the built-in list on any failure
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Pet catalog unreadable, using built-in pets");
                return Self::builtin();
            }
        };

        match serde_json::from_str::<Vec<WheelPet>>(&contents) {
            Ok(pets) => {
                let catalog = Self::new(pets);
                if catalog.is_empty() {
                    warn!(path = %path.display(), "Pet catalog is empty, using built-in pets");
                    return Self::builtin();
                }
                info!(path = %path.display(), pet_count = catalog.len(), "Pet catalog loaded");
                catalog
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Pet catalog malformed, using built-in pets");
                Self::builtin()
            }
        }
    }

    pub fn builtin() -> Self {
        let pets = [
            ("Shadow Dragon", "shadow_dragon", 1200.0),
            ("Bat Dragon", "bat_dragon", 1000.0),
            ("Giraffe", "giraffe", 850.0),
            ("Frost Dragon", "frost_dragon", 700.0),
            ("Owl", "owl", 550.0),
            ("Parrot", "parrot", 500.0),
            ("Crow", "crow", 420.0),
            ("Evil Unicorn", "evil_unicorn", 380.0),
            ("Arctic Reindeer", "arctic_reindeer", 300.0),
            ("Turtle", "turtle", 260.0),
            ("Kangaroo", "kangaroo", 240.0),
            ("Unicorn", "unicorn", 120.0),
            ("Dragon", "dragon", 110.0),
            ("Griffin", "griffin", 90.0),
            ("Golden Penguin", "golden_penguin", 40.0),
            ("Dog", "dog", 5.0),
        ]
        .into_iter()
        .map(|(name, slug, value)| WheelPet {
            name: name.to_string(),
            image: format!("/pets/{}.png", slug),
            value,
        })
        .collect();

        Self { pets }
    }

    pub fn len(&self) -> usize {
        self.pets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pets.is_empty()
    }
}

impl PetSource for PetCatalog {
    fn wheel_candidates(&self) -> Vec<WheelPet> {
        self.pets.clone()
    }
}
