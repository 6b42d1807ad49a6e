use indexmap::IndexMap;

use crate::dao::models::{GroupEntity, PlayerLinkEntity};

/// Link between a chat member and the handle checked against the
/// submission oracle. Re-linking overwrites the handle; links are never
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerLink {
    /// Chat member identifier.
    pub member_id: i64,
    /// Handle queried on the submission oracle.
    pub handle: String,
}

/// Authoritative in-memory state for one chat group.
///
/// The streak only changes through the evaluator's commit: it increments by
/// one on a fully completed day and resets to exactly zero otherwise.
/// `last_tally_day` marks the calendar day that was last committed, making
/// a replayed commit for the same day a no-op.
#[derive(Debug, Clone)]
pub struct GroupState {
    /// Stable external chat identifier.
    pub chat_id: i64,
    /// Optional display name used by the leaderboard.
    pub display_name: Option<String>,
    /// Roster keyed by member id, iterated in link order.
    pub players: IndexMap<i64, PlayerLink>,
    /// Current consecutive-day completion streak.
    pub streak: u32,
    /// Calendar day (`YYYY-MM-DD`) that was last tallied, if any.
    pub last_tally_day: Option<String>,
    /// Whether the durable copy has been consulted for this slot yet.
    pub(crate) hydrated: bool,
}

impl GroupState {
    /// Empty, not-yet-hydrated state for a chat id.
    pub(crate) fn vacant(chat_id: i64) -> Self {
        Self {
            chat_id,
            display_name: None,
            players: IndexMap::new(),
            streak: 0,
            last_tally_day: None,
            hydrated: false,
        }
    }

    /// Replace this state's content with the durable copy loaded from
    /// storage. Only called during hydration, before any caller has
    /// observed the slot.
    pub(crate) fn absorb(&mut self, entity: GroupEntity) {
        self.display_name = entity.display_name;
        self.streak = entity.streak;
        self.last_tally_day = entity.last_tally_day;
        self.players = entity
            .players
            .into_iter()
            .map(|link| {
                (
                    link.member_id,
                    PlayerLink {
                        member_id: link.member_id,
                        handle: link.handle,
                    },
                )
            })
            .collect();
    }

    /// Link or re-link a member to an oracle handle.
    pub fn link_player(&mut self, member_id: i64, handle: String) {
        self.players
            .entry(member_id)
            .and_modify(|link| link.handle = handle.clone())
            .or_insert(PlayerLink { member_id, handle });
    }

    /// Number of linked members.
    pub fn member_count(&self) -> usize {
        self.players.len()
    }

    /// Leaderboard label: display name when set, chat id otherwise.
    pub fn display_label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.chat_id.to_string())
    }
}

impl From<&GroupState> for GroupEntity {
    fn from(value: &GroupState) -> Self {
        Self {
            chat_id: value.chat_id,
            display_name: value.display_name.clone(),
            streak: value.streak,
            last_tally_day: value.last_tally_day.clone(),
            players: value
                .players
                .values()
                .map(|link| PlayerLinkEntity {
                    member_id: link.member_id,
                    handle: link.handle.clone(),
                })
                .collect(),
        }
    }
}

/// Transient outcome of one player's oracle check; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerPlayerResult {
    /// Chat member identifier.
    pub member_id: i64,
    /// Oracle handle the check ran against.
    pub handle: String,
    /// Whether a qualifying submission landed inside the day window.
    pub solved: bool,
    /// Titles of the qualifying submissions; empty when not solved or when
    /// the oracle was unavailable.
    pub evidence: Vec<String>,
}

/// Everything the notification layer needs to render one evaluated group
/// without re-querying the core.
#[derive(Debug, Clone)]
pub struct GroupReport {
    /// Stable external chat identifier.
    pub chat_id: i64,
    /// Display name, if one was set.
    pub display_name: Option<String>,
    /// Per-player breakdown in link order.
    pub per_player: Vec<PerPlayerResult>,
    /// Whether every linked member solved and the cohort minimum was met.
    pub all_completed: bool,
    /// Streak before the operation.
    pub streak_before: u32,
    /// Streak after the operation (equal to `streak_before` for read-only
    /// status checks and replayed commits).
    pub streak_after: u32,
    /// Whether this operation changed the group state.
    pub mutated: bool,
    /// False only when a mutation could not be written back to storage; the
    /// in-memory state is correct either way.
    pub persisted: bool,
}

/// Leaderboard input snapshot taken from a cached group under its lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSnapshot {
    /// Stable external chat identifier.
    pub chat_id: i64,
    /// Display name, if one was set.
    pub display_name: Option<String>,
    /// Current streak.
    pub streak: u32,
    /// Number of linked members.
    pub member_count: usize,
}

impl From<&GroupState> for GroupSnapshot {
    fn from(value: &GroupState) -> Self {
        Self {
            chat_id: value.chat_id,
            display_name: value.display_name.clone(),
            streak: value.streak,
            member_count: value.member_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relinking_overwrites_handle_and_keeps_order() {
        let mut group = GroupState::vacant(42);
        group.link_player(1, "alice".into());
        group.link_player(2, "bob".into());
        group.link_player(1, "alice_2".into());

        let handles: Vec<_> = group.players.values().map(|l| l.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice_2", "bob"]);
        assert_eq!(group.member_count(), 2);
    }

    #[test]
    fn display_label_falls_back_to_chat_id() {
        let mut group = GroupState::vacant(-100);
        assert_eq!(group.display_label(), "-100");

        group.display_name = Some("Grinders".into());
        assert_eq!(group.display_label(), "Grinders");
    }
}
