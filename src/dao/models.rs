use serde::{Deserialize, Serialize};

/// Durable representation of one chat group's streak state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupEntity {
    /// Stable external chat identifier the group is keyed by.
    pub chat_id: i64,
    /// Optional display name used by the leaderboard.
    pub display_name: Option<String>,
    /// Current consecutive-day completion streak.
    pub streak: u32,
    /// Calendar day (`YYYY-MM-DD`) that was last tallied, if any.
    pub last_tally_day: Option<String>,
    /// Members linked to the group, in link order.
    pub players: Vec<PlayerLinkEntity>,
}

/// Link between a chat member and the handle checked against the
/// submission oracle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerLinkEntity {
    /// Chat member identifier.
    pub member_id: i64,
    /// Handle queried on the submission oracle.
    pub handle: String,
}
