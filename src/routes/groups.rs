use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use axum_valid::Valid;

use crate::{
    dto::group::{
        GroupReportResponse, LeaderboardEntry, LinkPlayerRequest, LinkPlayerResponse,
        SetDisplayNameRequest,
    },
    error::AppError,
    services::{leaderboard_service, streak_service},
    state::SharedState,
};

/// Routes exposing the group streak core to the chat dispatcher.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/groups/{chat_id}/players", post(link_player))
        .route("/groups/{chat_id}/name", put(set_display_name))
        .route("/groups/{chat_id}/status", get(group_status))
        .route("/groups/{chat_id}/closeout", post(close_out))
        .route("/leaderboard", get(leaderboard))
}

/// Link or re-link a chat member to an oracle handle.
pub async fn link_player(
    State(state): State<SharedState>,
    Path(chat_id): Path<i64>,
    Valid(Json(payload)): Valid<Json<LinkPlayerRequest>>,
) -> Result<Json<LinkPlayerResponse>, AppError> {
    let member_count =
        streak_service::link_player(&state, chat_id, payload.member_id, &payload.handle).await?;

    Ok(Json(LinkPlayerResponse {
        chat_id,
        member_id: payload.member_id,
        handle: payload.handle,
        member_count,
    }))
}

/// Set the group's leaderboard display name.
pub async fn set_display_name(
    State(state): State<SharedState>,
    Path(chat_id): Path<i64>,
    Valid(Json(payload)): Valid<Json<SetDisplayNameRequest>>,
) -> Result<(), AppError> {
    streak_service::set_display_name(&state, chat_id, &payload.name).await?;
    Ok(())
}

/// Run the read-only completion check for today and return the breakdown.
pub async fn group_status(
    State(state): State<SharedState>,
    Path(chat_id): Path<i64>,
) -> Json<GroupReportResponse> {
    let report = streak_service::group_status(&state, chat_id).await;
    Json(report.into())
}

/// Evaluate and commit today's tally for one group.
pub async fn close_out(
    State(state): State<SharedState>,
    Path(chat_id): Path<i64>,
) -> Json<GroupReportResponse> {
    let report = streak_service::close_out_group(&state, chat_id).await;
    Json(report.into())
}

/// Rank every known group for cross-group display.
pub async fn leaderboard(State(state): State<SharedState>) -> Json<Vec<LeaderboardEntry>> {
    let rows = leaderboard_service::leaderboard(&state).await;
    Json(rows.into_iter().map(Into::into).collect())
}
