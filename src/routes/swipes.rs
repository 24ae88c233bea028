use axum::{extract::State, http::StatusCode, Json};

use crate::{error::AppResult, models::NewSwipe, services::SwipeOutcome};

use super::AppState;

/// Handler for recording a swipe
///
/// Cached feed pages are left in place. The feed route filters swiped titles
/// out of a cached page before serving it.
pub async fn create_swipe(
    State(state): State<AppState>,
    Json(swipe): Json<NewSwipe>,
) -> AppResult<(StatusCode, Json<SwipeOutcome>)> {
    state.swipe_gate.try_acquire(swipe.user_id).await?;
    let outcome = state.swipes.record_swipe(swipe).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
