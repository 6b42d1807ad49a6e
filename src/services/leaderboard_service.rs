use crate::state::{SharedState, group::GroupSnapshot};

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardRow {
    /// 1-based positional rank. Exact streak ties do not share a rank; the
    /// name tiebreak decides who comes first.
    pub rank: usize,
    /// Display name, falling back to the chat id's string form.
    pub display_name: String,
    /// Current streak.
    pub streak: u32,
    /// Number of linked members.
    pub member_count: usize,
}

/// Deterministically order group snapshots for cross-group display.
///
/// Groups below the cohort minimum are excluded entirely. Ordering is
/// streak descending, then case-insensitive display name ascending, with
/// the chat id string as the name fallback.
pub fn rank(groups: &[GroupSnapshot], min_cohort: usize) -> Vec<LeaderboardRow> {
    let mut eligible: Vec<(String, &GroupSnapshot)> = groups
        .iter()
        .filter(|group| group.member_count >= min_cohort.max(1))
        .map(|group| {
            let label = group
                .display_name
                .clone()
                .unwrap_or_else(|| group.chat_id.to_string());
            (label, group)
        })
        .collect();

    eligible.sort_by(|(label_a, a), (label_b, b)| {
        b.streak
            .cmp(&a.streak)
            .then_with(|| label_a.to_lowercase().cmp(&label_b.to_lowercase()))
    });

    eligible
        .into_iter()
        .enumerate()
        .map(|(index, (display_name, group))| LeaderboardRow {
            rank: index + 1,
            display_name,
            streak: group.streak,
            member_count: group.member_count,
        })
        .collect()
}

/// Snapshot every known group and rank them.
///
/// Each snapshot is taken under that group's own lock (hydrating on first
/// access), so the leaderboard never observes a half-mutated group.
pub async fn leaderboard(state: &SharedState) -> Vec<LeaderboardRow> {
    let mut snapshots = Vec::new();
    for chat_id in state.known_chat_ids().await {
        let group = state.lock_group(chat_id).await;
        snapshots.push(GroupSnapshot::from(&*group));
    }

    rank(&snapshots, state.config().min_cohort)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(chat_id: i64, name: Option<&str>, streak: u32, members: usize) -> GroupSnapshot {
        GroupSnapshot {
            chat_id,
            display_name: name.map(str::to_owned),
            streak,
            member_count: members,
        }
    }

    #[test]
    fn ties_break_on_case_insensitive_name() {
        let groups = vec![
            snapshot(1, Some("Bravo"), 5, 2),
            snapshot(2, Some("Alpha"), 5, 3),
            snapshot(3, Some("zulu"), 9, 2),
        ];

        let rows = rank(&groups, 2);
        let order: Vec<(&str, usize)> = rows
            .iter()
            .map(|row| (row.display_name.as_str(), row.rank))
            .collect();

        assert_eq!(order, vec![("zulu", 1), ("Alpha", 2), ("Bravo", 3)]);
    }

    #[test]
    fn groups_below_cohort_minimum_are_excluded() {
        let groups = vec![
            snapshot(1, Some("Solo"), 30, 1),
            snapshot(2, Some("Duo"), 2, 2),
        ];

        let rows = rank(&groups, 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].display_name, "Duo");
        assert_eq!(rows[0].rank, 1);
    }

    #[test]
    fn unnamed_groups_fall_back_to_chat_id_string() {
        let groups = vec![
            snapshot(-200, None, 4, 2),
            snapshot(7, Some("Named"), 4, 2),
        ];

        let rows = rank(&groups, 2);
        // "-200" sorts before "named" case-insensitively
        assert_eq!(rows[0].display_name, "-200");
        assert_eq!(rows[1].display_name, "Named");
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn empty_roster_groups_never_rank_even_without_a_cohort_policy() {
        let groups = vec![snapshot(1, Some("Ghost"), 3, 0)];
        assert!(rank(&groups, 0).is_empty());
    }
}
