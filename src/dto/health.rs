use serde::Serialize;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status, `"ok"` or `"degraded"`.
    pub status: &'static str,
    /// Storage backend reachability, `"ok"`, `"unreachable"`, or `"absent"`.
    pub storage: &'static str,
    /// Number of groups currently cached in memory.
    pub resident_groups: usize,
}
