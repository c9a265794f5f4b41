use serde::{Deserialize, Serialize};

use super::models::UserInvite;

/// Request payload for inviting a user into a room
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendInviteRequest {
    pub to_user_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InviteListResponse {
    pub invites: Vec<UserInvite>,
}
