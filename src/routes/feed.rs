use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{FeedItem, SessionKey},
    services::FeedRequest,
};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct FeedParams {
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
    /// Drop the session's cached pages and rank from scratch
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
}

/// One page of the feed
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub offset: i64,
    /// Offset to request next
    pub next_offset: i64,
    /// Nothing left to show in this context
    pub exhausted: bool,
    /// Served from the page cache
    pub cached: bool,
}

impl FeedPage {
    /// `span` is how many items the page stood for when it was built, which
    /// exceeds `items.len()` once swiped titles are filtered out of a cached page
    fn new(items: Vec<FeedItem>, offset: i64, span: usize, cached: bool) -> Self {
        Self {
            next_offset: offset + span as i64,
            exhausted: items.is_empty(),
            items,
            offset,
            cached,
        }
    }
}

/// Handler for the feed endpoint
///
/// Pages past the first are cached per session and offset. A cached page is
/// re-checked against the session's swipes before it is served, and one that
/// has been swiped through is rebuilt. Offset 0 starts the session over, so it
/// always drops the cached pages and ranks from scratch. Cache failures only
/// cost a recomputation and never fail the request.
pub async fn get_feed(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
) -> AppResult<Json<FeedPage>> {
    let session = SessionKey::new(params.user_id, params.group_id);
    let limit = params.limit.unwrap_or(state.default_page_size);

    if params.refresh || params.offset == 0 {
        if let Err(e) = state.page_cache.clear(&session).await {
            tracing::warn!(error = %e, %session, "Failed to clear feed cache");
        }
    } else if let Some(page) = cached_page(&state, &session, &params, limit).await {
        return Ok(Json(page));
    }

    let items = state
        .feed
        .generate_feed(&FeedRequest {
            user_id: params.user_id,
            group_id: params.group_id,
            limit,
            offset: params.offset,
        })
        .await?;

    if !items.is_empty() {
        if let Err(e) = state
            .page_cache
            .put_page(&session, params.offset, limit, &items)
            .await
        {
            tracing::warn!(error = %e, %session, "Feed cache write failed");
        }
    }

    let span = items.len();
    Ok(Json(FeedPage::new(items, params.offset, span, false)))
}

/// Cached page with swiped titles removed, or `None` when it must be rebuilt
async fn cached_page(
    state: &AppState,
    session: &SessionKey,
    params: &FeedParams,
    limit: i64,
) -> Option<FeedPage> {
    let items = match state.page_cache.get_page(session, params.offset, limit).await {
        Ok(Some(items)) => items,
        Ok(None) => return None,
        Err(e) => {
            tracing::warn!(error = %e, %session, "Feed cache read failed");
            return None;
        }
    };

    let span = items.len();
    let unseen = match state
        .feed
        .drop_swiped(params.user_id, params.group_id, items)
        .await
    {
        Ok(unseen) => unseen,
        Err(e) => {
            tracing::warn!(error = %e, %session, "Failed to filter cached feed page");
            return None;
        }
    };

    if unseen.is_empty() {
        tracing::debug!(%session, offset = params.offset, "Cached feed page fully swiped");
        return None;
    }

    tracing::debug!(
        %session,
        offset = params.offset,
        dropped = span - unseen.len(),
        "Feed page served from cache"
    );
    Some(FeedPage::new(unseen, params.offset, span, true))
}

/// Handler that forgets every cached page of a session
pub async fn clear_feed_cache(
    State(state): State<AppState>,
    Query(params): Query<SessionParams>,
) -> AppResult<StatusCode> {
    let session = SessionKey::new(params.user_id, params.group_id);
    state.page_cache.clear(&session).await?;
    Ok(StatusCode::NO_CONTENT)
}
