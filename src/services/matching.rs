use std::sync::Arc;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Decision, MatchDecision, MatchThreshold},
    services::stores::{GroupStore, MatchStore, ProfileStore, SwipeStore},
};

/// Shown for a yes voter whose profile cannot be read
pub const UNKNOWN_VOTER: &str = "Unknown";

/// Groups smaller than this can never match
pub const MIN_MATCH_MEMBERS: usize = 2;

/// Decides whether a group has matched on a title.
///
/// A decision is only rendered once every member has swiped. An early
/// majority is not announced because a later "no" could not retract a match
/// other members have already been shown.
#[derive(Clone)]
pub struct MatchChecker {
    swipes: Arc<dyn SwipeStore>,
    groups: Arc<dyn GroupStore>,
    profiles: Arc<dyn ProfileStore>,
    matches: Arc<dyn MatchStore>,
}

impl MatchChecker {
    pub fn new(
        swipes: Arc<dyn SwipeStore>,
        groups: Arc<dyn GroupStore>,
        profiles: Arc<dyn ProfileStore>,
        matches: Arc<dyn MatchStore>,
    ) -> Self {
        Self {
            swipes,
            groups,
            profiles,
            matches,
        }
    }

    /// Best-effort check run after a swipe has been stored.
    ///
    /// A match is added to the group's history. Failures are logged and
    /// reported as `None`; they must never fail the swipe that triggered the
    /// check. A failed history write keeps the decision.
    pub async fn check_for_match(&self, group_id: Uuid, title_id: i64) -> Option<MatchDecision> {
        match self.try_check_for_match(group_id, title_id).await {
            Ok(decision) => {
                if decision.is_match {
                    self.record(group_id, title_id, &decision).await;
                }
                Some(decision)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    %group_id,
                    title_id,
                    "Error checking for match"
                );
                None
            }
        }
    }

    /// Evaluates the group's votes on a title, propagating store failures
    pub async fn try_check_for_match(
        &self,
        group_id: Uuid,
        title_id: i64,
    ) -> AppResult<MatchDecision> {
        let members = self.groups.group_members(group_id).await?;
        let total_members = members.len();

        if total_members < MIN_MATCH_MEMBERS {
            tracing::debug!(%group_id, total_members, "Group too small to match");
            return Ok(MatchDecision::pending(
                MatchThreshold::default(),
                total_members,
                0,
                Vec::new(),
            ));
        }

        let threshold = self
            .groups
            .get_group(group_id)
            .await?
            .map(|group| group.match_threshold)
            .unwrap_or_default();

        let votes = self.swipes.title_votes(group_id, title_id).await?;
        let total_swipes = votes.len();
        let yes_voter_ids: Vec<Uuid> = votes
            .iter()
            .filter(|vote| vote.decision == Decision::Yes)
            .map(|vote| vote.user_id)
            .collect();
        let yes_votes = yes_voter_ids.len();

        if total_swipes != total_members {
            tracing::debug!(
                %group_id,
                title_id,
                total_swipes,
                total_members,
                "Waiting for every member to swipe"
            );
            return Ok(MatchDecision::pending(
                threshold,
                total_members,
                total_swipes,
                yes_voter_ids,
            ));
        }

        if !threshold.is_met(yes_votes, total_members) {
            tracing::debug!(
                %group_id,
                title_id,
                yes_votes,
                total_members,
                threshold = threshold.as_str(),
                "Vote closed without a match"
            );
            return Ok(MatchDecision::pending(
                threshold,
                total_members,
                total_swipes,
                yes_voter_ids,
            ));
        }

        let yes_voter_names = self.resolve_names(&yes_voter_ids).await;

        tracing::info!(
            %group_id,
            title_id,
            yes_votes,
            total_members,
            threshold = threshold.as_str(),
            "Match found"
        );

        Ok(MatchDecision {
            is_match: true,
            total_members,
            total_swipes,
            yes_votes,
            yes_voter_ids,
            yes_voter_names,
            threshold,
        })
    }

    async fn record(&self, group_id: Uuid, title_id: i64, decision: &MatchDecision) {
        let recorded = self
            .matches
            .record_match(group_id, title_id, decision.threshold, &decision.yes_voter_ids)
            .await;

        match recorded {
            Ok(stored) => {
                tracing::debug!(match_id = %stored.id, %group_id, title_id, "Match recorded")
            }
            Err(e) => {
                tracing::error!(error = %e, %group_id, title_id, "Failed to record match")
            }
        }
    }

    /// One name per voter, in voter order
    async fn resolve_names(&self, voter_ids: &[Uuid]) -> Vec<String> {
        let mut names = Vec::with_capacity(voter_ids.len());

        for user_id in voter_ids {
            let name = match self.profiles.get_profile(*user_id).await {
                Ok(Some(profile)) => profile.display_name,
                Ok(None) => UNKNOWN_VOTER.to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, %user_id, "Failed to load voter profile");
                    UNKNOWN_VOTER.to_string()
                }
            };
            names.push(name);
        }

        names
    }
}
