/// Health check service.
pub mod health_service;
/// Cross-group leaderboard ranking.
pub mod leaderboard_service;
/// Seam to the external notification layer.
pub mod notifier;
/// Time-triggered fleet-wide evaluation sweeps.
pub mod scheduler;
/// Storage reconnect supervision and degraded-mode tracking.
pub mod storage_supervisor;
/// Core streak evaluation: daily check, idempotent commit, roster ops.
pub mod streak_service;
