use std::sync::Arc;

use futures::StreamExt;
use time::{OffsetDateTime, Time, UtcOffset};
use tokio::time::sleep;
use tracing::info;

use crate::{
    services::{notifier::Notifier, streak_service},
    state::SharedState,
};

/// Which of the two daily sweeps is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepKind {
    /// Morning read-only check, no commit.
    StatusBroadcast,
    /// End-of-day check + commit + persist.
    CloseOut,
}

/// Drive both daily sweeps forever.
pub async fn run(state: SharedState, notifier: Arc<dyn Notifier>) {
    tokio::join!(
        daily_loop(state.clone(), notifier.clone(), SweepKind::StatusBroadcast),
        daily_loop(state, notifier, SweepKind::CloseOut),
    );
}

async fn daily_loop(state: SharedState, notifier: Arc<dyn Notifier>, kind: SweepKind) {
    loop {
        let config = state.config();
        let at = match kind {
            SweepKind::StatusBroadcast => config.status_broadcast_at,
            SweepKind::CloseOut => config.close_out_at,
        };

        let now = OffsetDateTime::now_utc();
        let wake = next_occurrence(now, at, config.day_offset);
        let pause = (wake - now).try_into().unwrap_or_default();

        info!(?kind, %wake, "next sweep scheduled");
        sleep(pause).await;
        sweep(&state, notifier.as_ref(), kind).await;
    }
}

/// Evaluate the whole fleet once.
///
/// Groups are fanned out over a bounded number of concurrent pipelines.
/// Every group's own pipeline runs under its per-group lock, and whatever
/// happens inside one group (oracle outage, storage failure) is absorbed by
/// the fail-closed evaluator, so the sweep always attempts every known
/// group.
pub async fn sweep(state: &SharedState, notifier: &dyn Notifier, kind: SweepKind) {
    let chat_ids = state.known_chat_ids().await;
    info!(?kind, groups = chat_ids.len(), "starting fleet sweep");

    futures::stream::iter(chat_ids)
        .for_each_concurrent(state.config().sweep_concurrency, |chat_id| async move {
            let report = match kind {
                SweepKind::StatusBroadcast => streak_service::group_status(state, chat_id).await,
                SweepKind::CloseOut => streak_service::close_out_group(state, chat_id).await,
            };
            notifier.deliver(kind, &report);
        })
        .await;

    info!(?kind, "fleet sweep finished");
}

/// Next wall-clock instant at which the given local time of day occurs,
/// strictly after `now`.
fn next_occurrence(now: OffsetDateTime, at: Time, offset: UtcOffset) -> OffsetDateTime {
    let local = now.to_offset(offset);
    let mut candidate = local.date().with_time(at).assume_offset(offset);
    if candidate <= now {
        candidate += time::Duration::days(1);
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{datetime, offset, time};

    #[test]
    fn earlier_today_rolls_to_tomorrow() {
        let now = datetime!(2024-01-15 10:00 +8);
        let next = next_occurrence(now, time!(9:00), offset!(+8));
        assert_eq!(next, datetime!(2024-01-16 9:00 +8));
    }

    #[test]
    fn later_today_stays_today() {
        let now = datetime!(2024-01-15 10:00 +8);
        let next = next_occurrence(now, time!(23:30), offset!(+8));
        assert_eq!(next, datetime!(2024-01-15 23:30 +8));
    }

    #[test]
    fn exactly_now_schedules_tomorrow() {
        let now = datetime!(2024-01-15 9:00 +8);
        let next = next_occurrence(now, time!(9:00), offset!(+8));
        assert_eq!(next, datetime!(2024-01-16 9:00 +8));
    }

    #[test]
    fn utc_now_is_shifted_into_the_configured_zone() {
        // 01:30 UTC is already 09:30 in +8, past the 09:00 slot
        let now = datetime!(2024-01-15 1:30 UTC);
        let next = next_occurrence(now, time!(9:00), offset!(+8));
        assert_eq!(next, datetime!(2024-01-16 9:00 +8));
    }
}
