use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// How many yes votes a group needs before a title becomes a match
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchThreshold {
    /// Strictly more than half of the members
    #[default]
    Majority,
    /// Every member
    Unanimous,
}

impl MatchThreshold {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchThreshold::Majority => "majority",
            MatchThreshold::Unanimous => "unanimous",
        }
    }

    /// Whether `yes_votes` out of `total_members` satisfies this threshold.
    /// Exactly half is not a majority.
    pub fn is_met(&self, yes_votes: usize, total_members: usize) -> bool {
        match self {
            MatchThreshold::Unanimous => yes_votes == total_members,
            MatchThreshold::Majority => yes_votes * 2 > total_members,
        }
    }
}

impl FromStr for MatchThreshold {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "majority" => Ok(MatchThreshold::Majority),
            "unanimous" => Ok(MatchThreshold::Unanimous),
            other => Err(AppError::DataAccess(format!(
                "Unknown match threshold: {}",
                other
            ))),
        }
    }
}

/// A watch group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub match_threshold: MatchThreshold,
}

/// Public profile of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: String,
}

/// Result of evaluating a group's votes on one title
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchDecision {
    pub is_match: bool,
    pub total_members: usize,
    pub total_swipes: usize,
    pub yes_votes: usize,
    pub yes_voter_ids: Vec<Uuid>,
    /// Display names of the yes voters, filled only for a match
    pub yes_voter_names: Vec<String>,
    pub threshold: MatchThreshold,
}

/// A match recorded in a group's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupMatch {
    pub id: Uuid,
    pub group_id: Uuid,
    pub title_id: i64,
    /// `None` when the title has left the catalog
    pub title_name: Option<String>,
    /// Threshold the group used when the match was found
    pub rule: MatchThreshold,
    /// Members who voted yes, in vote order
    pub member_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl MatchDecision {
    /// A decision that cannot be a match yet
    pub fn pending(
        threshold: MatchThreshold,
        total_members: usize,
        total_swipes: usize,
        yes_voter_ids: Vec<Uuid>,
    ) -> Self {
        Self {
            is_match: false,
            total_members,
            total_swipes,
            yes_votes: yes_voter_ids.len(),
            yes_voter_ids,
            yes_voter_names: Vec::new(),
            threshold,
        }
    }
}
