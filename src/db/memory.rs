//! In-process store used by `STORAGE=memory` and the integration tests.

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Decision, Group, GroupLike, GroupMatch, MatchThreshold, NewSwipe, Preference, Profile,
        Swipe, Title, Vote,
    },
    services::stores::{
        GroupStore, MatchStore, PreferenceStore, ProfileStore, SwipeStore, TitleQuery,
        TitleStore,
    },
};

/// Shared in-memory data. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryStoreInner>>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Keyed by id so iteration follows id order
    titles: BTreeMap<i64, Title>,
    /// Insertion order doubles as swipe time order
    swipes: Vec<Swipe>,
    preferences: HashMap<(Uuid, Uuid), Preference>,
    groups: HashMap<Uuid, Group>,
    members: HashMap<Uuid, Vec<Uuid>>,
    profiles: HashMap<Uuid, Profile>,
    /// Recording order, oldest first
    matches: Vec<GroupMatch>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a catalog title
    pub async fn add_title(&self, title: Title) {
        self.inner.write().await.titles.insert(title.id, title);
    }

    pub async fn add_titles(&self, titles: impl IntoIterator<Item = Title>) {
        let mut inner = self.inner.write().await;
        for title in titles {
            inner.titles.insert(title.id, title);
        }
    }

    /// Adds a group together with its members
    pub async fn add_group(&self, group: Group, members: Vec<Uuid>) {
        let mut inner = self.inner.write().await;
        inner.members.insert(group.id, members);
        inner.groups.insert(group.id, group);
    }

    pub async fn add_profile(&self, profile: Profile) {
        self.inner.write().await.profiles.insert(profile.id, profile);
    }

    pub async fn swipe_count(&self) -> usize {
        self.inner.read().await.swipes.len()
    }
}

#[async_trait::async_trait]
impl TitleStore for MemoryStore {
    async fn query_titles(&self, query: &TitleQuery) -> AppResult<Vec<Title>> {
        let inner = self.inner.read().await;
        Ok(inner
            .titles
            .values()
            .filter(|title| query.accepts(title))
            .skip(query.range_start)
            .take(query.len())
            .cloned()
            .collect())
    }
}

#[async_trait::async_trait]
impl SwipeStore for MemoryStore {
    async fn swiped_title_ids(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
    ) -> AppResult<Vec<i64>> {
        let inner = self.inner.read().await;
        Ok(inner
            .swipes
            .iter()
            .filter(|swipe| swipe.user_id == user_id && swipe.group_id == group_id)
            .map(|swipe| swipe.title_id)
            .collect())
    }

    async fn group_yes_swipes(
        &self,
        group_id: Uuid,
        exclude_user_id: Uuid,
    ) -> AppResult<Vec<GroupLike>> {
        let inner = self.inner.read().await;
        Ok(inner
            .swipes
            .iter()
            .filter(|swipe| {
                swipe.group_id == Some(group_id)
                    && swipe.decision == Decision::Yes
                    && swipe.user_id != exclude_user_id
            })
            .map(|swipe| GroupLike {
                title_id: swipe.title_id,
                user_id: swipe.user_id,
            })
            .collect())
    }

    async fn title_votes(&self, group_id: Uuid, title_id: i64) -> AppResult<Vec<Vote>> {
        let inner = self.inner.read().await;
        Ok(inner
            .swipes
            .iter()
            .filter(|swipe| swipe.group_id == Some(group_id) && swipe.title_id == title_id)
            .map(|swipe| Vote {
                user_id: swipe.user_id,
                decision: swipe.decision,
            })
            .collect())
    }

    async fn insert_swipe(&self, swipe: &NewSwipe) -> AppResult<Swipe> {
        let mut inner = self.inner.write().await;

        let duplicate = inner.swipes.iter().any(|existing| {
            existing.user_id == swipe.user_id
                && existing.group_id == swipe.group_id
                && existing.title_id == swipe.title_id
        });
        if duplicate {
            return Err(AppError::Conflict(format!(
                "Title {} already swiped in this context",
                swipe.title_id
            )));
        }

        let stored = Swipe {
            id: Uuid::new_v4(),
            user_id: swipe.user_id,
            group_id: swipe.group_id,
            title_id: swipe.title_id,
            decision: swipe.decision,
            created_at: Utc::now(),
        };
        inner.swipes.push(stored.clone());

        Ok(stored)
    }
}

#[async_trait::async_trait]
impl PreferenceStore for MemoryStore {
    async fn get_preference(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> AppResult<Option<Preference>> {
        let inner = self.inner.read().await;
        Ok(inner.preferences.get(&(user_id, group_id)).cloned())
    }

    async fn upsert_preference(&self, preference: &Preference) -> AppResult<Preference> {
        let mut inner = self.inner.write().await;
        inner.preferences.insert(
            (preference.user_id, preference.group_id),
            preference.clone(),
        );
        Ok(preference.clone())
    }
}

#[async_trait::async_trait]
impl GroupStore for MemoryStore {
    async fn group_members(&self, group_id: Uuid) -> AppResult<Vec<Uuid>> {
        let inner = self.inner.read().await;
        Ok(inner.members.get(&group_id).cloned().unwrap_or_default())
    }

    async fn get_group(&self, group_id: Uuid) -> AppResult<Option<Group>> {
        Ok(self.inner.read().await.groups.get(&group_id).cloned())
    }
}

#[async_trait::async_trait]
impl ProfileStore for MemoryStore {
    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        Ok(self.inner.read().await.profiles.get(&user_id).cloned())
    }
}

#[async_trait::async_trait]
impl MatchStore for MemoryStore {
    async fn record_match(
        &self,
        group_id: Uuid,
        title_id: i64,
        rule: MatchThreshold,
        member_ids: &[Uuid],
    ) -> AppResult<GroupMatch> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner
            .matches
            .iter()
            .find(|m| m.group_id == group_id && m.title_id == title_id)
        {
            return Ok(existing.clone());
        }

        let stored = GroupMatch {
            id: Uuid::new_v4(),
            group_id,
            title_id,
            title_name: inner.titles.get(&title_id).map(|title| title.name.clone()),
            rule,
            member_ids: member_ids.to_vec(),
            created_at: Utc::now(),
        };
        inner.matches.push(stored.clone());

        Ok(stored)
    }

    async fn list_matches(&self, group_id: Uuid) -> AppResult<Vec<GroupMatch>> {
        let inner = self.inner.read().await;
        Ok(inner
            .matches
            .iter()
            .rev()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }
}
