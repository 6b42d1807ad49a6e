use tracing::{info, warn};

use crate::{services::scheduler::SweepKind, state::group::GroupReport};

/// Seam to the external notification layer (the chat bot front-end).
///
/// Receives one report per evaluated group, carrying everything needed to
/// render a status or close-out message without re-querying the core.
pub trait Notifier: Send + Sync {
    fn deliver(&self, kind: SweepKind, report: &GroupReport);
}

/// Default notifier that writes reports to the log stream. Stands in until
/// a chat delivery backend is wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, kind: SweepKind, report: &GroupReport) {
        let solved = report
            .per_player
            .iter()
            .filter(|player| player.solved)
            .count();

        info!(
            ?kind,
            chat_id = report.chat_id,
            display_name = report.display_name.as_deref().unwrap_or(""),
            solved,
            players = report.per_player.len(),
            all_completed = report.all_completed,
            streak_before = report.streak_before,
            streak_after = report.streak_after,
            mutated = report.mutated,
            "group evaluated"
        );

        if !report.persisted {
            warn!(
                chat_id = report.chat_id,
                "group report reflects an unpersisted mutation"
            );
        }
    }
}
