//! Store abstractions the feed and match logic read from.
//!
//! Every method maps onto one simple predicate query against the backing
//! store. None of them span a transaction, so two reads made while swipes
//! are arriving can observe slightly different states.

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        Group, GroupLike, GroupMatch, MatchThreshold, NewSwipe, Preference, Profile, Swipe,
        Title, Vote,
    },
};

/// Candidate title query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TitleQuery {
    /// Titles that must not be returned
    pub exclude_ids: Vec<i64>,
    /// Keep only titles with a known runtime at or under this many minutes
    pub max_runtime_min: Option<i32>,
    pub range_start: usize,
    /// Exclusive
    pub range_end: usize,
}

impl TitleQuery {
    pub fn len(&self) -> usize {
        self.range_end.saturating_sub(self.range_start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `title` passes the exclusion and runtime filters
    pub fn accepts(&self, title: &Title) -> bool {
        if self.exclude_ids.contains(&title.id) {
            return false;
        }
        match self.max_runtime_min {
            Some(max) => title.runtime_min.is_some_and(|runtime| runtime <= max),
            None => true,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait TitleStore: Send + Sync {
    /// Titles matching the query, ordered by id
    async fn query_titles(&self, query: &TitleQuery) -> AppResult<Vec<Title>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait SwipeStore: Send + Sync {
    /// Titles the user already swiped in exactly this context. `None` means
    /// the solo context, not "any context".
    async fn swiped_title_ids(&self, user_id: Uuid, group_id: Option<Uuid>)
        -> AppResult<Vec<i64>>;

    /// Every "yes" in the group except the ones cast by `exclude_user_id`
    async fn group_yes_swipes(
        &self,
        group_id: Uuid,
        exclude_user_id: Uuid,
    ) -> AppResult<Vec<GroupLike>>;

    /// All votes cast on a title inside a group
    async fn title_votes(&self, group_id: Uuid, title_id: i64) -> AppResult<Vec<Vote>>;

    /// Persists a swipe. A second swipe on the same title in the same context
    /// fails with `Conflict`.
    async fn insert_swipe(&self, swipe: &NewSwipe) -> AppResult<Swipe>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_preference(&self, user_id: Uuid, group_id: Uuid)
        -> AppResult<Option<Preference>>;

    async fn upsert_preference(&self, preference: &Preference) -> AppResult<Preference>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GroupStore: Send + Sync {
    /// User ids of every member of the group
    async fn group_members(&self, group_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn get_group(&self, group_id: Uuid) -> AppResult<Option<Group>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MatchStore: Send + Sync {
    /// Records a group's match on a title. Recording the same group and
    /// title again returns the stored match unchanged.
    async fn record_match(
        &self,
        group_id: Uuid,
        title_id: i64,
        rule: MatchThreshold,
        member_ids: &[Uuid],
    ) -> AppResult<GroupMatch>;

    /// The group's matches, newest first
    async fn list_matches(&self, group_id: Uuid) -> AppResult<Vec<GroupMatch>>;
}
