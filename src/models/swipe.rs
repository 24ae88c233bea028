use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

/// A user's verdict on a title
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Yes,
    No,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Yes => "yes",
            Decision::No => "no",
        }
    }
}

impl FromStr for Decision {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Decision::Yes),
            "no" => Ok(Decision::No),
            other => Err(AppError::DataAccess(format!("Unknown decision: {}", other))),
        }
    }
}

/// A recorded swipe. `group_id` is `None` for solo browsing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Swipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
    pub title_id: i64,
    pub decision: Decision,
    pub created_at: DateTime<Utc>,
}

/// Swipe submitted by a client, before it is stored
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSwipe {
    pub user_id: Uuid,
    #[serde(default)]
    pub group_id: Option<Uuid>,
    pub title_id: i64,
    pub decision: Decision,
}

/// A groupmate's "yes" on a title
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupLike {
    pub title_id: i64,
    pub user_id: Uuid,
}

/// One member's vote on a title inside a group
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vote {
    pub user_id: Uuid,
    pub decision: Decision,
}
