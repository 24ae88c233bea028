use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{GroupMatch, MatchDecision},
};

use super::AppState;

/// Handler reporting where a group stands on a title
pub async fn get_match(
    State(state): State<AppState>,
    Path((group_id, title_id)): Path<(Uuid, i64)>,
) -> AppResult<Json<MatchDecision>> {
    let decision = state.matcher.try_check_for_match(group_id, title_id).await?;
    Ok(Json(decision))
}

/// Handler listing a group's match history, newest first
pub async fn list_matches(
    State(state): State<AppState>,
    Path(group_id): Path<Uuid>,
) -> AppResult<Json<Vec<GroupMatch>>> {
    let matches = state.matches.list_matches(group_id).await?;
    Ok(Json(matches))
}
