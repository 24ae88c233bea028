use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{MatchDecision, NewSwipe, Swipe},
    services::{matching::MatchChecker, stores::SwipeStore},
};

/// Stored swipe plus the match check it triggered
#[derive(Debug, Clone, Serialize)]
pub struct SwipeOutcome {
    pub swipe: Swipe,
    /// `None` for solo swipes and for checks that could not complete
    #[serde(rename = "match")]
    pub match_decision: Option<MatchDecision>,
}

/// Records swipes and runs the follow-up match check
#[derive(Clone)]
pub struct SwipeService {
    swipes: Arc<dyn SwipeStore>,
    matcher: MatchChecker,
}

impl SwipeService {
    pub fn new(swipes: Arc<dyn SwipeStore>, matcher: MatchChecker) -> Self {
        Self { swipes, matcher }
    }

    /// Stores the swipe, then checks the group for a match.
    ///
    /// The write is the durable fact and its failure propagates. The match
    /// check runs after any group swipe, since a "no" can be the vote that
    /// completes participation, and it never fails the call.
    pub async fn record_swipe(&self, swipe: NewSwipe) -> AppResult<SwipeOutcome> {
        let stored = self.swipes.insert_swipe(&swipe).await.map_err(|e| {
            tracing::error!(
                error = %e,
                user_id = %swipe.user_id,
                title_id = swipe.title_id,
                decision = swipe.decision.as_str(),
                "Error saving swipe"
            );
            e
        })?;

        tracing::info!(
            user_id = %stored.user_id,
            group_id = ?stored.group_id,
            title_id = stored.title_id,
            decision = stored.decision.as_str(),
            "Swipe recorded"
        );

        let match_decision = match stored.group_id {
            Some(group_id) => self.matcher.check_for_match(group_id, stored.title_id).await,
            None => None,
        };

        Ok(SwipeOutcome {
            swipe: stored,
            match_decision,
        })
    }
}

/// Per-user minimum interval between swipes
pub struct SwipeGate {
    min_interval: Duration,
    last_swipe: Mutex<HashMap<Uuid, Instant>>,
}

impl SwipeGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_swipe: Mutex::new(HashMap::new()),
        }
    }

    /// Admits the swipe or reports how long the user still has to wait
    pub async fn try_acquire(&self, user_id: Uuid) -> AppResult<()> {
        let now = Instant::now();
        let mut last_swipe = self.last_swipe.lock().await;

        // Entries past the interval can no longer block anyone
        last_swipe.retain(|_, previous| now.duration_since(*previous) < self.min_interval);

        if let Some(previous) = last_swipe.get(&user_id) {
            let elapsed = now.duration_since(*previous);
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                tracing::debug!(%user_id, remaining_ms = remaining.as_millis(), "Swipe cooldown");
                return Err(AppError::RateLimited(format!(
                    "Slow down, next swipe allowed in {} ms",
                    remaining.as_millis()
                )));
            }
        }

        last_swipe.insert(user_id, now);
        Ok(())
    }
}
