use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    services::{
        FeedGenerator, GroupStore, MatchChecker, MatchStore, PageCache, PreferenceStore,
        ProfileStore, SwipeGate, SwipeService, SwipeStore, TieBreak, TitleStore,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub feed: FeedGenerator,
    pub matcher: MatchChecker,
    pub swipes: SwipeService,
    pub preferences: Arc<dyn PreferenceStore>,
    pub matches: Arc<dyn MatchStore>,
    pub page_cache: Arc<dyn PageCache>,
    pub swipe_gate: Arc<SwipeGate>,
    /// Page size used when a feed request carries no limit
    pub default_page_size: i64,
}

impl AppState {
    /// Wires every service over one backing store
    pub fn new<S>(store: S, page_cache: Arc<dyn PageCache>, config: &Config) -> Self
    where
        S: TitleStore
            + SwipeStore
            + PreferenceStore
            + GroupStore
            + ProfileStore
            + MatchStore
            + 'static,
    {
        let store = Arc::new(store);
        let titles: Arc<dyn TitleStore> = store.clone();
        let swipes: Arc<dyn SwipeStore> = store.clone();
        let preferences: Arc<dyn PreferenceStore> = store.clone();
        let groups: Arc<dyn GroupStore> = store.clone();
        let profiles: Arc<dyn ProfileStore> = store.clone();
        let matches: Arc<dyn MatchStore> = store;

        let tie_break = if config.feed_shuffle_ties {
            TieBreak::Shuffle
        } else {
            TieBreak::Stable
        };

        let feed = FeedGenerator::new(titles, swipes.clone(), preferences.clone())
            .with_pool_cap(config.feed_pool_cap)
            .with_tie_break(tie_break);
        let matcher = MatchChecker::new(swipes.clone(), groups, profiles, matches.clone());
        let swipe_service = SwipeService::new(swipes, matcher.clone());

        Self {
            feed,
            matcher,
            swipes: swipe_service,
            preferences,
            matches,
            page_cache,
            swipe_gate: Arc::new(SwipeGate::new(Duration::from_millis(
                config.swipe_cooldown_ms,
            ))),
            default_page_size: config.feed_page_size,
        }
    }
}
