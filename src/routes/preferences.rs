use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Preference,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct PreferenceParams {
    pub user_id: Uuid,
    pub group_id: Uuid,
}

/// Handler returning a user's preferences within a group
pub async fn get_preferences(
    State(state): State<AppState>,
    Query(params): Query<PreferenceParams>,
) -> AppResult<Json<Preference>> {
    state
        .preferences
        .get_preference(params.user_id, params.group_id)
        .await?
        .map(Json)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "No preferences for user {} in group {}",
                params.user_id, params.group_id
            ))
        })
}

/// Handler that creates or replaces a user's preferences within a group
pub async fn put_preferences(
    State(state): State<AppState>,
    Json(preference): Json<Preference>,
) -> AppResult<Json<Preference>> {
    let stored = state.preferences.upsert_preference(&preference).await?;
    tracing::info!(
        user_id = %stored.user_id,
        group_id = %stored.group_id,
        genres = stored.genres.len(),
        moods = stored.moods.len(),
        "Preferences saved"
    );
    Ok(Json(stored))
}
