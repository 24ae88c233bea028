use rand::{seq::SliceRandom, Rng};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{FeedItem, GroupLike, Preference, Title},
    services::{
        pagination::{page_slice, pool_size, DEFAULT_POOL_CAP},
        stores::{PreferenceStore, SwipeStore, TitleQuery, TitleStore},
    },
};

/// Score added per groupmate who already liked the title
pub const GROUP_INTEREST_WEIGHT: f64 = 1000.0;
/// Score added per genre shared with the preference profile
pub const GENRE_MATCH_WEIGHT: f64 = 100.0;
/// Score added per vibe found among the profile's moods
pub const MOOD_MATCH_WEIGHT: f64 = 50.0;
/// Scores closer than this to the top of their band count as tied
pub const TIE_BAND: f64 = 100.0;

/// How titles inside one tie band are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TieBreak {
    /// Random order, re-drawn on every request
    Shuffle,
    /// Score, then title id. Pages become reproducible but the deck stops
    /// reshuffling near-equal titles between requests.
    Stable,
}

/// One page request
#[derive(Debug, Clone, Deserialize)]
pub struct FeedRequest {
    pub user_id: Uuid,
    /// `None` browses solo
    #[serde(default)]
    pub group_id: Option<Uuid>,
    pub limit: i64,
    /// Items already delivered to this session, not a row offset
    #[serde(default)]
    pub offset: i64,
}

/// Builds ranked pages of unseen titles for a user.
///
/// Every call recomputes the ranking from the stores, so the offset only
/// moves a pointer through a ranking that is stable within one call. A title
/// can shift between calls because of the tie-band shuffle and because
/// swipes landing in between change the exclusions and group interest.
#[derive(Clone)]
pub struct FeedGenerator {
    titles: Arc<dyn TitleStore>,
    swipes: Arc<dyn SwipeStore>,
    preferences: Arc<dyn PreferenceStore>,
    pool_cap: usize,
    tie_break: TieBreak,
}

impl FeedGenerator {
    pub fn new(
        titles: Arc<dyn TitleStore>,
        swipes: Arc<dyn SwipeStore>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            titles,
            swipes,
            preferences,
            pool_cap: DEFAULT_POOL_CAP,
            tie_break: TieBreak::Shuffle,
        }
    }

    pub fn with_pool_cap(mut self, pool_cap: usize) -> Self {
        self.pool_cap = pool_cap;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Generates one page of the feed.
    ///
    /// Store failures propagate unchanged. An empty result means the user
    /// has seen everything the catalog can offer in this context.
    pub async fn generate_feed(&self, request: &FeedRequest) -> AppResult<Vec<FeedItem>> {
        let start = Instant::now();

        tracing::info!(
            user_id = %request.user_id,
            group_id = ?request.group_id,
            limit = request.limit,
            offset = request.offset,
            "Generating feed"
        );

        if request.limit <= 0 || request.offset < 0 {
            tracing::debug!("Empty page requested");
            return Ok(Vec::new());
        }

        let candidates = self.score_candidates(request).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let total_scored = candidates.len();
        let ranked = rank_feed(candidates, self.tie_break, &mut rand::rng());
        let page = page_slice(ranked, request.offset, request.limit);

        tracing::info!(
            user_id = %request.user_id,
            total_scored,
            returned = page.len(),
            top_score = page.first().map(|item| item.priority_score),
            with_group_interest = page.iter().filter(|item| item.group_interest > 0).count(),
            processing_time_ms = start.elapsed().as_millis(),
            "Feed generated"
        );

        Ok(page)
    }

    /// Removes items the user has swiped in this context since the page was built
    pub async fn drop_swiped(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
        items: Vec<FeedItem>,
    ) -> AppResult<Vec<FeedItem>> {
        let swiped: HashSet<i64> = self
            .swipes
            .swiped_title_ids(user_id, group_id)
            .await?
            .into_iter()
            .collect();

        Ok(items
            .into_iter()
            .filter(|item| !swiped.contains(&item.id()))
            .collect())
    }

    /// Loads the candidate pool and scores it, unsorted
    async fn score_candidates(&self, request: &FeedRequest) -> AppResult<Vec<FeedItem>> {
        let user_id = request.user_id;
        let group_id = request.group_id;

        let preference = match group_id {
            Some(group_id) => self
                .preferences
                .get_preference(user_id, group_id)
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, %user_id, %group_id, "Failed to fetch preferences");
                    e
                })?,
            None => None,
        };

        if group_id.is_some() && preference.is_none() {
            tracing::debug!(%user_id, "No preferences for user in group");
        }

        let swiped = self
            .swipes
            .swiped_title_ids(user_id, group_id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, %user_id, ?group_id, "Failed to fetch user swipes");
                e
            })?;

        tracing::debug!(count = swiped.len(), "User has already swiped on titles");

        let interest = match group_id {
            Some(group_id) => {
                let likes = self
                    .swipes
                    .group_yes_swipes(group_id, user_id)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, %group_id, "Failed to fetch group likes");
                        e
                    })?;
                tally_group_interest(&likes)
            }
            None => HashMap::new(),
        };

        if !interest.is_empty() {
            tracing::debug!(
                titles_with_interest = interest.len(),
                max_interest = interest.values().max().copied().unwrap_or(0),
                "Group interest calculated"
            );
        }

        let query = TitleQuery {
            max_runtime_min: preference.as_ref().and_then(Preference::runtime_cap),
            range_start: 0,
            range_end: pool_size(request.limit, self.pool_cap),
            exclude_ids: swiped,
        };

        let titles = self.titles.query_titles(&query).await.map_err(|e| {
            tracing::error!(error = %e, %user_id, ?group_id, "Failed to fetch titles");
            e
        })?;

        if titles.is_empty() {
            tracing::warn!(
                %user_id,
                ?group_id,
                swiped_count = query.exclude_ids.len(),
                "No titles available for feed"
            );
            return Ok(Vec::new());
        }

        tracing::debug!(count = titles.len(), "Fetched title pool");

        // Swiped titles never reach a page, whatever the backend returned.
        let excluded: HashSet<i64> = query.exclude_ids.iter().copied().collect();

        Ok(titles
            .into_iter()
            .filter(|title| !excluded.contains(&title.id))
            .map(|title| {
                let group_interest = interest.get(&title.id).copied().unwrap_or(0);
                score_title(title, group_interest, preference.as_ref())
            })
            .collect())
    }
}

/// Counts groupmate yes votes per title
pub fn tally_group_interest(likes: &[GroupLike]) -> HashMap<i64, u32> {
    let mut interest = HashMap::new();
    for like in likes {
        *interest.entry(like.title_id).or_insert(0) += 1;
    }
    interest
}

/// Computes a title's priority score.
///
/// Group interest dominates, then genre and mood overlap with the
/// preference profile, with raw popularity as the baseline.
pub fn score_title(title: Title, group_interest: u32, preference: Option<&Preference>) -> FeedItem {
    let mut score = GROUP_INTEREST_WEIGHT * f64::from(group_interest);

    if let Some(preference) = preference {
        score += GENRE_MATCH_WEIGHT * preference.genre_matches(&title.genres) as f64;
        score += MOOD_MATCH_WEIGHT * preference.mood_matches(&title.vibes) as f64;
    }

    if title.popularity.is_finite() {
        score += title.popularity;
    }

    FeedItem {
        title,
        priority_score: score,
        group_interest,
    }
}

/// Orders scored items highest first.
///
/// The sorted list is cut into bands: a band starts at the highest remaining
/// score and takes every following item less than `TIE_BAND` below it. Items
/// in different bands keep their order; items inside a band are ordered by
/// `tie_break`.
pub fn rank_feed<R: Rng + ?Sized>(
    mut items: Vec<FeedItem>,
    tie_break: TieBreak,
    rng: &mut R,
) -> Vec<FeedItem> {
    items.sort_by(|a, b| {
        b.priority_score
            .total_cmp(&a.priority_score)
            .then_with(|| a.id().cmp(&b.id()))
    });

    if tie_break == TieBreak::Stable {
        return items;
    }

    let mut band_start = 0;
    while band_start < items.len() {
        let anchor = items[band_start].priority_score;
        let band_end = items[band_start..]
            .iter()
            .position(|item| anchor - item.priority_score >= TIE_BAND)
            .map_or(items.len(), |len| band_start + len);

        items[band_start..band_end].shuffle(rng);
        band_start = band_end;
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::TitleKind;
    use crate::services::stores::{MockPreferenceStore, MockSwipeStore, MockTitleStore};
    use mockall::predicate::eq;
    use rand::{rngs::StdRng, SeedableRng};
    use tokio_test::{assert_err, assert_ok};

    fn title(id: i64, popularity: f64) -> Title {
        Title::new(id, TitleKind::Movie, format!("Title {}", id)).with_popularity(popularity)
    }

    fn item(id: i64, score: f64) -> FeedItem {
        FeedItem {
            title: title(id, 0.0),
            priority_score: score,
            group_interest: 0,
        }
    }

    fn generator(
        titles: MockTitleStore,
        swipes: MockSwipeStore,
        preferences: MockPreferenceStore,
    ) -> FeedGenerator {
        FeedGenerator::new(Arc::new(titles), Arc::new(swipes), Arc::new(preferences))
            .with_tie_break(TieBreak::Stable)
    }

    fn ids(page: &[FeedItem]) -> Vec<i64> {
        page.iter().map(FeedItem::id).collect()
    }

    #[test]
    fn test_score_title_weights() {
        let user_id = Uuid::new_v4();
        let group_id = Uuid::new_v4();
        let mut preference = Preference::new(user_id, group_id);
        preference.genres = vec!["Comedy".to_string(), "Drama".to_string()];
        preference.moods = vec!["Cozy".to_string()];

        let candidate = title(1, 12.5)
            .with_genres(&["Comedy", "Drama", "Horror"])
            .with_vibes(&["Cozy", "Dark"]);

        let scored = score_title(candidate, 2, Some(&preference));
        assert_eq!(scored.priority_score, 2000.0 + 200.0 + 50.0 + 12.5);
        assert_eq!(scored.group_interest, 2);
    }

    #[test]
    fn test_score_title_without_preferences_is_popularity() {
        let scored = score_title(title(1, 42.0).with_genres(&["Comedy"]), 0, None);
        assert_eq!(scored.priority_score, 42.0);
    }

    #[test]
    fn test_score_title_ignores_non_finite_popularity() {
        let scored = score_title(title(1, f64::NAN), 1, None);
        assert_eq!(scored.priority_score, 1000.0);
    }

    #[test]
    fn test_group_interest_outscores_popularity() {
        let liked = score_title(title(1, 0.0), 1, None);
        let popular = score_title(title(2, 999.0), 0, None);
        assert!(liked.priority_score - popular.priority_score >= 1.0);
    }

    #[test]
    fn test_tally_group_interest() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let likes = vec![
            GroupLike { title_id: 7, user_id: alice },
            GroupLike { title_id: 7, user_id: bob },
            GroupLike { title_id: 9, user_id: bob },
        ];

        let interest = tally_group_interest(&likes);
        assert_eq!(interest.get(&7), Some(&2));
        assert_eq!(interest.get(&9), Some(&1));
        assert_eq!(interest.get(&1), None);
    }

    #[test]
    fn test_rank_stable_orders_by_score_then_id() {
        let ranked = rank_feed(
            vec![item(3, 10.0), item(1, 500.0), item(2, 10.0)],
            TieBreak::Stable,
            &mut StdRng::seed_from_u64(7),
        );
        assert_eq!(ids(&ranked), vec![1, 2, 3]);
    }

    #[test]
    fn test_rank_shuffle_never_crosses_band_gap() {
        for seed in 0..50 {
            let ranked = rank_feed(
                vec![
                    item(1, 2050.0),
                    item(2, 2000.0),
                    item(3, 1200.0),
                    item(4, 1150.0),
                    item(5, 40.0),
                ],
                TieBreak::Shuffle,
                &mut StdRng::seed_from_u64(seed),
            );

            let order = ids(&ranked);
            let mut top: Vec<i64> = order[..2].to_vec();
            let mut middle: Vec<i64> = order[2..4].to_vec();
            top.sort();
            middle.sort();
            assert_eq!(top, vec![1, 2]);
            assert_eq!(middle, vec![3, 4]);
            assert_eq!(order[4], 5);
        }
    }

    #[test]
    fn test_rank_shuffle_varies_inside_band() {
        let pool: Vec<FeedItem> = (0..20).map(|id| item(id, 50.0)).collect();
        let orders: HashSet<Vec<i64>> = (0..10)
            .map(|seed| {
                ids(&rank_feed(
                    pool.clone(),
                    TieBreak::Shuffle,
                    &mut StdRng::seed_from_u64(seed),
                ))
            })
            .collect();
        assert!(orders.len() > 1);
    }

    #[test]
    fn test_rank_band_is_anchored_at_top() {
        // 99 is within the band of 150, 0 is not, even though 99 and 0 are
        // less than a band apart.
        for seed in 0..20 {
            let ranked = rank_feed(
                vec![item(1, 150.0), item(2, 99.0), item(3, 0.0)],
                TieBreak::Shuffle,
                &mut StdRng::seed_from_u64(seed),
            );
            assert_eq!(ranked[2].id(), 3);
        }
    }

    #[tokio::test]
    async fn test_solo_feed_skips_group_reads() {
        let user_id = Uuid::new_v4();

        let mut titles = MockTitleStore::new();
        titles
            .expect_query_titles()
            .withf(|query: &TitleQuery| {
                query.max_runtime_min.is_none() && query.range_start == 0 && query.range_end == 40
            })
            .times(1)
            .returning(|_| Ok(vec![title(1, 10.0), title(2, 500.0), title(3, 250.0)]));

        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .with(eq(user_id), eq(None))
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        swipes.expect_group_yes_swipes().times(0);

        let mut preferences = MockPreferenceStore::new();
        preferences.expect_get_preference().times(0);

        let feed = generator(titles, swipes, preferences);
        let page = feed
            .generate_feed(&FeedRequest {
                user_id,
                group_id: None,
                limit: 10,
                offset: 0,
            })
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![2, 3, 1]);
        assert!(page.iter().all(|item| item.group_interest == 0));
    }

    #[tokio::test]
    async fn test_group_feed_boosts_liked_and_preferred_titles() {
        let user_id = Uuid::new_v4();
        let group_id = Uuid::new_v4();
        let friend = Uuid::new_v4();

        let mut preference = Preference::new(user_id, group_id);
        preference.genres = vec!["Comedy".to_string()];
        preference.max_runtime_min = Some(120);

        let mut preferences = MockPreferenceStore::new();
        preferences
            .expect_get_preference()
            .with(eq(user_id), eq(group_id))
            .returning(move |_, _| Ok(Some(preference.clone())));

        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .with(eq(user_id), eq(Some(group_id)))
            .returning(|_, _| Ok(vec![99]));
        swipes
            .expect_group_yes_swipes()
            .with(eq(group_id), eq(user_id))
            .returning(move |_, _| {
                Ok(vec![GroupLike {
                    title_id: 3,
                    user_id: friend,
                }])
            });

        let mut titles = MockTitleStore::new();
        titles
            .expect_query_titles()
            .withf(|query: &TitleQuery| {
                query.exclude_ids == vec![99] && query.max_runtime_min == Some(120)
            })
            .returning(|_| {
                Ok(vec![
                    title(1, 900.0),
                    title(2, 0.0).with_genres(&["Comedy"]),
                    title(3, 0.0),
                ])
            });

        let feed = generator(titles, swipes, preferences);
        let page = feed
            .generate_feed(&FeedRequest {
                user_id,
                group_id: Some(group_id),
                limit: 50,
                offset: 0,
            })
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![3, 1, 2]);
        assert_eq!(page[0].group_interest, 1);
        assert_eq!(page[0].priority_score, 1000.0);
        assert_eq!(page[2].priority_score, 100.0);
    }

    #[tokio::test]
    async fn test_missing_preferences_do_not_filter() {
        let user_id = Uuid::new_v4();
        let group_id = Uuid::new_v4();

        let mut preferences = MockPreferenceStore::new();
        preferences
            .expect_get_preference()
            .returning(|_, _| Ok(None));

        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .returning(|_, _| Ok(Vec::new()));
        swipes
            .expect_group_yes_swipes()
            .returning(|_, _| Ok(Vec::new()));

        let mut titles = MockTitleStore::new();
        titles
            .expect_query_titles()
            .withf(|query: &TitleQuery| query.max_runtime_min.is_none())
            .returning(|_| Ok(vec![title(1, 1.0)]));

        let feed = generator(titles, swipes, preferences);
        let page = assert_ok!(
            feed.generate_feed(&FeedRequest {
                user_id,
                group_id: Some(group_id),
                limit: 5,
                offset: 0,
            })
            .await
        );
        assert_eq!(ids(&page), vec![1]);
    }

    #[tokio::test]
    async fn test_swiped_titles_never_returned() {
        let user_id = Uuid::new_v4();

        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .returning(|_, _| Ok(vec![1, 2]));

        // A backend that ignores the exclusion list
        let mut titles = MockTitleStore::new();
        titles
            .expect_query_titles()
            .returning(|_| Ok(vec![title(1, 5.0), title(2, 4.0), title(3, 3.0)]));

        let feed = generator(titles, swipes, MockPreferenceStore::new());
        let page = feed
            .generate_feed(&FeedRequest {
                user_id,
                group_id: None,
                limit: 50,
                offset: 0,
            })
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![3]);
    }

    #[tokio::test]
    async fn test_drop_swiped_filters_stale_page() {
        let user_id = Uuid::new_v4();
        let group_id = Uuid::new_v4();

        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .with(eq(user_id), eq(Some(group_id)))
            .times(1)
            .returning(|_, _| Ok(vec![2]));

        let feed = generator(MockTitleStore::new(), swipes, MockPreferenceStore::new());
        let page = feed
            .drop_swiped(user_id, Some(group_id), vec![item(1, 3.0), item(2, 2.0), item(3, 1.0)])
            .await
            .unwrap();

        assert_eq!(ids(&page), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_empty_pool_returns_empty_page() {
        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .returning(|_, _| Ok(Vec::new()));

        let mut titles = MockTitleStore::new();
        titles.expect_query_titles().returning(|_| Ok(Vec::new()));

        let feed = generator(titles, swipes, MockPreferenceStore::new());
        let page = feed
            .generate_feed(&FeedRequest {
                user_id: Uuid::new_v4(),
                group_id: None,
                limit: 50,
                offset: 0,
            })
            .await
            .unwrap();

        assert!(page.is_empty());
    }

    #[tokio::test]
    async fn test_offset_slices_ranked_pool() {
        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .returning(|_, _| Ok(Vec::new()));

        let mut titles = MockTitleStore::new();
        titles.expect_query_titles().returning(|_| {
            Ok((1..=6).map(|id| title(id, (7 - id) as f64 * 200.0)).collect())
        });

        let feed = generator(titles, swipes, MockPreferenceStore::new());
        let request = FeedRequest {
            user_id: Uuid::new_v4(),
            group_id: None,
            limit: 2,
            offset: 2,
        };

        assert_eq!(ids(&feed.generate_feed(&request).await.unwrap()), vec![3, 4]);

        let past_end = FeedRequest {
            offset: 10,
            ..request
        };
        assert!(feed.generate_feed(&past_end).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_out_of_range_arguments_skip_stores() {
        // Mocks without expectations panic if called
        let feed = generator(
            MockTitleStore::new(),
            MockSwipeStore::new(),
            MockPreferenceStore::new(),
        );

        for (limit, offset) in [(0, 0), (-5, 0), (10, -1)] {
            let page = feed
                .generate_feed(&FeedRequest {
                    user_id: Uuid::new_v4(),
                    group_id: None,
                    limit,
                    offset,
                })
                .await
                .unwrap();
            assert!(page.is_empty());
        }
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .returning(|_, _| Err(AppError::DataAccess("connection reset".to_string())));

        let feed = generator(MockTitleStore::new(), swipes, MockPreferenceStore::new());
        let err = assert_err!(
            feed.generate_feed(&FeedRequest {
                user_id: Uuid::new_v4(),
                group_id: None,
                limit: 10,
                offset: 0,
            })
            .await
        );
        assert!(err.is_data_access());
    }

    #[tokio::test]
    async fn test_pool_cap_limits_query() {
        let mut swipes = MockSwipeStore::new();
        swipes
            .expect_swiped_title_ids()
            .returning(|_, _| Ok(Vec::new()));

        let mut titles = MockTitleStore::new();
        titles
            .expect_query_titles()
            .withf(|query: &TitleQuery| query.range_end == 30)
            .returning(|_| Ok(Vec::new()));

        let feed = generator(titles, swipes, MockPreferenceStore::new()).with_pool_cap(30);
        let page = feed
            .generate_feed(&FeedRequest {
                user_id: Uuid::new_v4(),
                group_id: None,
                limit: 50,
                offset: 0,
            })
            .await
            .unwrap();
        assert!(page.is_empty());
    }
}
