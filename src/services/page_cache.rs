//! Caller-side cache of feed pages.
//!
//! Pages are keyed by browsing session and the offset they were requested
//! at. The ranking behind them drifts over time, so a forced refresh must
//! clear the whole session rather than individual pages.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::{
    error::AppResult,
    models::{FeedItem, SessionKey},
};

#[async_trait::async_trait]
pub trait PageCache: Send + Sync {
    async fn get_page(
        &self,
        session: &SessionKey,
        offset: i64,
        limit: i64,
    ) -> AppResult<Option<Vec<FeedItem>>>;

    async fn put_page(
        &self,
        session: &SessionKey,
        offset: i64,
        limit: i64,
        page: &[FeedItem],
    ) -> AppResult<()>;

    /// Drops every page cached for the session
    async fn clear(&self, session: &SessionKey) -> AppResult<()>;
}

struct CachedPage {
    items: Vec<FeedItem>,
    expires_at: Instant,
}

/// In-process page cache used when no Redis is configured
pub struct MemoryPageCache {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionKey, HashMap<(i64, i64), CachedPage>>>,
}

impl MemoryPageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl PageCache for MemoryPageCache {
    async fn get_page(
        &self,
        session: &SessionKey,
        offset: i64,
        limit: i64,
    ) -> AppResult<Option<Vec<FeedItem>>> {
        let sessions = self.sessions.read().await;
        let page = sessions
            .get(session)
            .and_then(|pages| pages.get(&(offset, limit)))
            .filter(|page| page.expires_at > Instant::now())
            .map(|page| page.items.clone());
        Ok(page)
    }

    async fn put_page(
        &self,
        session: &SessionKey,
        offset: i64,
        limit: i64,
        page: &[FeedItem],
    ) -> AppResult<()> {
        let mut sessions = self.sessions.write().await;
        sessions.entry(*session).or_default().insert(
            (offset, limit),
            CachedPage {
                items: page.to_vec(),
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn clear(&self, session: &SessionKey) -> AppResult<()> {
        let removed = self.sessions.write().await.remove(session);
        tracing::debug!(
            session = %session,
            pages = removed.map(|pages| pages.len()).unwrap_or(0),
            "Feed cache cleared"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Title, TitleKind};
    use uuid::Uuid;

    fn page(ids: &[i64]) -> Vec<FeedItem> {
        ids.iter()
            .map(|id| FeedItem {
                title: Title::new(*id, TitleKind::Show, "Cached"),
                priority_score: 1.0,
                group_interest: 0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_pages_are_keyed_by_session_and_offset() {
        let cache = MemoryPageCache::new(Duration::from_secs(60));
        let user_id = Uuid::new_v4();
        let solo = SessionKey::new(user_id, None);
        let grouped = SessionKey::new(user_id, Some(Uuid::new_v4()));

        cache.put_page(&solo, 0, 50, &page(&[1, 2])).await.unwrap();

        let hit = cache.get_page(&solo, 0, 50).await.unwrap().unwrap();
        assert_eq!(hit.len(), 2);
        assert!(cache.get_page(&solo, 50, 50).await.unwrap().is_none());
        assert!(cache.get_page(&solo, 0, 10).await.unwrap().is_none());
        assert!(cache.get_page(&grouped, 0, 50).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_drops_only_that_session() {
        let cache = MemoryPageCache::new(Duration::from_secs(60));
        let first = SessionKey::new(Uuid::new_v4(), None);
        let second = SessionKey::new(Uuid::new_v4(), None);

        cache.put_page(&first, 0, 50, &page(&[1])).await.unwrap();
        cache.put_page(&first, 50, 50, &page(&[2])).await.unwrap();
        cache.put_page(&second, 0, 50, &page(&[3])).await.unwrap();

        cache.clear(&first).await.unwrap();

        assert!(cache.get_page(&first, 0, 50).await.unwrap().is_none());
        assert!(cache.get_page(&first, 50, 50).await.unwrap().is_none());
        assert!(cache.get_page(&second, 0, 50).await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_expire() {
        let cache = MemoryPageCache::new(Duration::from_secs(5));
        let session = SessionKey::new(Uuid::new_v4(), None);

        cache.put_page(&session, 0, 50, &page(&[1])).await.unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;

        assert!(cache.get_page(&session, 0, 50).await.unwrap().is_none());
    }
}
