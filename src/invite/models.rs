use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::room::{EpochMillis, InviteStatus};

/// Collection of per-user invite mirrors
pub const INVITES_COLLECTION: &str = "gameInvites";

/// Invite as seen by the invited user, mirrored from the room's `invites` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInvite {
    #[serde(default)]
    pub id: String,
    pub room_id: String,
    pub to_user_id: String,
    pub from_user_id: String,
    pub from_user_name: String,
    #[serde(default)]
    pub from_user_avatar: Option<String>,
    pub status: InviteStatus,
    #[serde(default)]
    pub timestamp: Option<EpochMillis>,
}

impl UserInvite {
    /// Document id of the mirror for `to_user_id`'s invite into `room_id`
    pub fn mirror_id(room_id: &str, to_user_id: &str) -> String {
        format!("{}_{}", room_id, to_user_id)
    }
}

/// Freshness filter applied to every delivered invite list
#[derive(Debug, Clone, Copy)]
pub struct InviteFilter {
    pub expiry: Duration,
}

impl InviteFilter {
    pub fn new(expiry: Duration) -> Self {
        Self { expiry }
    }

    /// Pending and sent no longer than `expiry` ago
    pub fn is_actionable(&self, invite: &UserInvite, now: EpochMillis) -> bool {
        if invite.status != InviteStatus::Pending {
            return false;
        }
        match invite.timestamp {
            Some(sent) => !now.has_elapsed(sent, self.expiry),
            None => false,
        }
    }

    pub fn actionable(&self, invites: Vec<UserInvite>, now: EpochMillis) -> Vec<UserInvite> {
        invites
            .into_iter()
            .filter(|invite| self.is_actionable(invite, now))
            .collect()
    }
}
