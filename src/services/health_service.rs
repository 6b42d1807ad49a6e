use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the storage backend and report overall service health.
///
/// The service stays usable without storage, so an unreachable backend
/// only flips the payload to degraded rather than failing the request.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage = match state.group_store().await {
        Some(store) => match store.health_check().await {
            Ok(()) => "ok",
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                "unreachable"
            }
        },
        None => {
            warn!("storage unavailable (degraded mode)");
            "absent"
        }
    };

    HealthResponse {
        status: if storage == "ok" { "ok" } else { "degraded" },
        storage,
        resident_groups: state.resident_group_count(),
    }
}
