pub mod builders;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use builders::{identity, pet, PlayingRoomBuilder};
#[allow(unused_imports)]
pub use mocks::{FixedPetSource, RecordingProfileStore};
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder};
