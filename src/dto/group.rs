use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    services::leaderboard_service::LeaderboardRow,
    state::group::{GroupReport, PerPlayerResult},
};

/// Payload linking (or re-linking) a chat member to an oracle handle.
#[derive(Debug, Deserialize, Validate)]
pub struct LinkPlayerRequest {
    /// Chat member identifier.
    pub member_id: i64,
    /// Handle to check on the submission oracle.
    #[validate(length(min = 1, max = 64))]
    pub handle: String,
}

/// Payload setting the group's leaderboard display name.
#[derive(Debug, Deserialize, Validate)]
pub struct SetDisplayNameRequest {
    /// New display name.
    #[validate(length(min = 1, max = 128))]
    pub name: String,
}

/// Acknowledgement returned after a successful link.
#[derive(Debug, Serialize)]
pub struct LinkPlayerResponse {
    pub chat_id: i64,
    pub member_id: i64,
    pub handle: String,
    /// Roster size after the link.
    pub member_count: usize,
}

/// One player's completion result inside a group report.
#[derive(Debug, Serialize)]
pub struct PlayerResult {
    pub member_id: i64,
    pub handle: String,
    pub solved: bool,
    /// Titles of qualifying submissions, if any.
    pub evidence: Vec<String>,
}

impl From<PerPlayerResult> for PlayerResult {
    fn from(value: PerPlayerResult) -> Self {
        Self {
            member_id: value.member_id,
            handle: value.handle,
            solved: value.solved,
            evidence: value.evidence,
        }
    }
}

/// Evaluated state of one group, as rendered by status and close-out
/// endpoints.
#[derive(Debug, Serialize)]
pub struct GroupReportResponse {
    pub chat_id: i64,
    pub display_name: Option<String>,
    pub all_completed: bool,
    pub streak_before: u32,
    pub streak_after: u32,
    /// Whether this call changed the streak state.
    pub mutated: bool,
    /// False when a mutation could not be written back to storage.
    pub persisted: bool,
    /// Per-player breakdown in link order.
    pub players: Vec<PlayerResult>,
}

impl From<GroupReport> for GroupReportResponse {
    fn from(value: GroupReport) -> Self {
        Self {
            chat_id: value.chat_id,
            display_name: value.display_name,
            all_completed: value.all_completed,
            streak_before: value.streak_before,
            streak_after: value.streak_after,
            mutated: value.mutated,
            persisted: value.persisted,
            players: value.per_player.into_iter().map(Into::into).collect(),
        }
    }
}

/// One row of the cross-group leaderboard.
#[derive(Debug, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based positional rank.
    pub rank: usize,
    pub display_name: String,
    pub streak: u32,
    pub member_count: usize,
}

impl From<LeaderboardRow> for LeaderboardEntry {
    fn from(value: LeaderboardRow) -> Self {
        Self {
            rank: value.rank,
            display_name: value.display_name,
            streak: value.streak,
            member_count: value.member_count,
        }
    }
}
