use serde::{Deserialize, Serialize};
use std::sync::Arc;
use strum_macros::{Display, EnumString};
use tokio::sync::watch;
use tracing::debug;

/// Foreground state of a client
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Active,
    Background,
    Inactive,
}

impl LifecycleState {
    pub fn is_away(self) -> bool {
        matches!(self, LifecycleState::Background | LifecycleState::Inactive)
    }
}

/// Broadcasts a client's lifecycle transitions to whoever is watching
#[derive(Debug, Clone)]
pub struct LifecycleSignal {
    sender: Arc<watch::Sender<LifecycleState>>,
}

impl Default for LifecycleSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleSignal {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(LifecycleState::Active);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Records a transition; repeating the current state notifies nobody
    pub fn set(&self, state: LifecycleState) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            debug!(state = %state, "Lifecycle transition");
        }
    }

    pub fn current(&self) -> LifecycleState {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.sender.subscribe()
    }
}
