use axum::Router;

use crate::state::SharedState;

pub mod groups;
pub mod health;

/// Compose all route trees, wiring in the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router().merge(groups::router()).with_state(state)
}
