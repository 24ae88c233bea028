mod group;
mod preference;
mod swipe;
mod title;

pub use group::{Group, GroupMatch, MatchDecision, MatchThreshold, Profile};
pub use preference::Preference;
pub use swipe::{Decision, GroupLike, NewSwipe, Swipe, Vote};
pub use title::{FeedItem, Title, TitleKind};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a browsing session: a user either inside a group or solo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub user_id: Uuid,
    pub group_id: Option<Uuid>,
}

impl SessionKey {
    pub fn new(user_id: Uuid, group_id: Option<Uuid>) -> Self {
        Self { user_id, group_id }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.group_id {
            Some(group_id) => write!(f, "{}:{}", self.user_id, group_id),
            None => write!(f, "{}:solo", self.user_id),
        }
    }
}
