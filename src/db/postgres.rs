use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        Decision, Group, GroupLike, GroupMatch, MatchThreshold, NewSwipe, Preference, Profile,
        Swipe, Title, TitleKind, Vote,
    },
    services::stores::{
        GroupStore, MatchStore, PreferenceStore, ProfileStore, SwipeStore, TitleQuery,
        TitleStore,
    },
};

/// Creates a PostgreSQL connection pool
///
/// Establishes a pool of database connections for efficient reuse.
/// The pool automatically manages connection lifecycle and limits.
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    Ok(pool)
}

/// Applies the schema in `migrations/`
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}

const TITLE_COLUMNS: &str = "id, type AS kind, name, year, runtime_min, poster_url, trailer_url, \
     overview, genres, vibes, popularity, rating, adult";

const SWIPE_COLUMNS: &str = "id, user_id, group_id, title_id, decision, created_at";

const PREFERENCE_COLUMNS: &str = "user_id, group_id, genres, moods, services, max_runtime_min";

#[derive(Debug, sqlx::FromRow)]
struct TitleRow {
    id: i64,
    kind: String,
    name: String,
    year: Option<i32>,
    runtime_min: Option<i32>,
    poster_url: Option<String>,
    trailer_url: Option<String>,
    overview: Option<String>,
    genres: Vec<String>,
    vibes: Vec<String>,
    popularity: Option<f64>,
    rating: Option<f64>,
    adult: bool,
}

impl TryFrom<TitleRow> for Title {
    type Error = AppError;

    fn try_from(row: TitleRow) -> Result<Self, Self::Error> {
        Ok(Title {
            id: row.id,
            kind: row.kind.parse::<TitleKind>()?,
            name: row.name,
            year: row.year,
            runtime_min: row.runtime_min,
            poster_url: row.poster_url,
            trailer_url: row.trailer_url,
            overview: row.overview.unwrap_or_default(),
            genres: row.genres,
            vibes: row.vibes,
            popularity: row.popularity.unwrap_or(0.0),
            rating: row.rating.unwrap_or(0.0),
            adult: row.adult,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SwipeRow {
    id: Uuid,
    user_id: Uuid,
    group_id: Option<Uuid>,
    title_id: i64,
    decision: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl TryFrom<SwipeRow> for Swipe {
    type Error = AppError;

    fn try_from(row: SwipeRow) -> Result<Self, Self::Error> {
        Ok(Swipe {
            id: row.id,
            user_id: row.user_id,
            group_id: row.group_id,
            title_id: row.title_id,
            decision: row.decision.parse::<Decision>()?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PreferenceRow {
    user_id: Uuid,
    group_id: Uuid,
    genres: Vec<String>,
    moods: Vec<String>,
    services: Vec<String>,
    max_runtime_min: Option<i32>,
}

impl From<PreferenceRow> for Preference {
    fn from(row: PreferenceRow) -> Self {
        Preference {
            user_id: row.user_id,
            group_id: row.group_id,
            genres: row.genres,
            moods: row.moods,
            services: row.services,
            max_runtime_min: row.max_runtime_min,
        }
    }
}

/// Match with its title name and yes voters folded in
const MATCH_SELECT: &str = "SELECT m.id, m.group_id, m.title_id, t.name AS title_name, m.rule, \
        m.created_at, \
        COALESCE(array_agg(mm.user_id ORDER BY mm.position) \
            FILTER (WHERE mm.user_id IS NOT NULL), '{}') AS member_ids \
     FROM matches m \
     LEFT JOIN titles t ON t.id = m.title_id \
     LEFT JOIN match_members mm ON mm.match_id = m.id";

#[derive(Debug, sqlx::FromRow)]
struct MatchRow {
    id: Uuid,
    group_id: Uuid,
    title_id: i64,
    title_name: Option<String>,
    rule: String,
    created_at: chrono::DateTime<chrono::Utc>,
    member_ids: Vec<Uuid>,
}

impl TryFrom<MatchRow> for GroupMatch {
    type Error = AppError;

    fn try_from(row: MatchRow) -> Result<Self, Self::Error> {
        Ok(GroupMatch {
            id: row.id,
            group_id: row.group_id,
            title_id: row.title_id,
            title_name: row.title_name,
            rule: row.rule.parse()?,
            member_ids: row.member_ids,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: Uuid,
    name: String,
    match_threshold: String,
}

impl TryFrom<GroupRow> for Group {
    type Error = AppError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        Ok(Group {
            id: row.id,
            name: row.name,
            match_threshold: row.match_threshold.parse()?,
        })
    }
}

/// Postgres implementation of every store trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TitleStore for PgStore {
    async fn query_titles(&self, query: &TitleQuery) -> AppResult<Vec<Title>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {TITLE_COLUMNS} FROM titles \
             WHERE NOT (id = ANY($1)) \
               AND ($2::INT IS NULL OR runtime_min <= $2) \
             ORDER BY id \
             LIMIT $3 OFFSET $4"
        );

        let rows = sqlx::query_as::<_, TitleRow>(&sql)
            .bind(&query.exclude_ids)
            .bind(query.max_runtime_min)
            .bind(query.len() as i64)
            .bind(query.range_start as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Title::try_from).collect()
    }
}

#[async_trait::async_trait]
impl SwipeStore for PgStore {
    async fn swiped_title_ids(
        &self,
        user_id: Uuid,
        group_id: Option<Uuid>,
    ) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT title_id FROM swipes \
             WHERE user_id = $1 AND group_id IS NOT DISTINCT FROM $2",
        )
        .bind(user_id)
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn group_yes_swipes(
        &self,
        group_id: Uuid,
        exclude_user_id: Uuid,
    ) -> AppResult<Vec<GroupLike>> {
        let rows = sqlx::query_as::<_, (i64, Uuid)>(
            "SELECT title_id, user_id FROM swipes \
             WHERE group_id = $1 AND decision = 'yes' AND user_id <> $2",
        )
        .bind(group_id)
        .bind(exclude_user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(title_id, user_id)| GroupLike { title_id, user_id })
            .collect())
    }

    async fn title_votes(&self, group_id: Uuid, title_id: i64) -> AppResult<Vec<Vote>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT user_id, decision FROM swipes \
             WHERE group_id = $1 AND title_id = $2 \
             ORDER BY created_at, id",
        )
        .bind(group_id)
        .bind(title_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(user_id, decision)| -> AppResult<Vote> {
                Ok(Vote {
                    user_id,
                    decision: decision.parse()?,
                })
            })
            .collect()
    }

    async fn insert_swipe(&self, swipe: &NewSwipe) -> AppResult<Swipe> {
        let sql = format!(
            "INSERT INTO swipes (user_id, group_id, title_id, decision) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {SWIPE_COLUMNS}"
        );

        let row = sqlx::query_as::<_, SwipeRow>(&sql)
            .bind(swipe.user_id)
            .bind(swipe.group_id)
            .bind(swipe.title_id)
            .bind(swipe.decision.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => AppError::Conflict(
                    format!("Title {} already swiped in this context", swipe.title_id),
                ),
                other => AppError::Database(other),
            })?;

        Swipe::try_from(row)
    }
}

#[async_trait::async_trait]
impl PreferenceStore for PgStore {
    async fn get_preference(
        &self,
        user_id: Uuid,
        group_id: Uuid,
    ) -> AppResult<Option<Preference>> {
        let sql = format!(
            "SELECT {PREFERENCE_COLUMNS} FROM preferences WHERE user_id = $1 AND group_id = $2"
        );

        let row = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(user_id)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Preference::from))
    }

    async fn upsert_preference(&self, preference: &Preference) -> AppResult<Preference> {
        let sql = format!(
            "INSERT INTO preferences (user_id, group_id, genres, moods, services, max_runtime_min) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (user_id, group_id) DO UPDATE SET \
                genres = EXCLUDED.genres, \
                moods = EXCLUDED.moods, \
                services = EXCLUDED.services, \
                max_runtime_min = EXCLUDED.max_runtime_min, \
                updated_at = now() \
             RETURNING {PREFERENCE_COLUMNS}"
        );

        let row = sqlx::query_as::<_, PreferenceRow>(&sql)
            .bind(preference.user_id)
            .bind(preference.group_id)
            .bind(&preference.genres)
            .bind(&preference.moods)
            .bind(&preference.services)
            .bind(preference.max_runtime_min)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }
}

#[async_trait::async_trait]
impl GroupStore for PgStore {
    async fn group_members(&self, group_id: Uuid) -> AppResult<Vec<Uuid>> {
        let members = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM group_members WHERE group_id = $1 ORDER BY joined_at, user_id",
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(members)
    }

    async fn get_group(&self, group_id: Uuid) -> AppResult<Option<Group>> {
        let row = sqlx::query_as::<_, GroupRow>(
            "SELECT id, name, match_threshold FROM groups WHERE id = $1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Group::try_from).transpose()
    }
}

#[async_trait::async_trait]
impl ProfileStore for PgStore {
    async fn get_profile(&self, user_id: Uuid) -> AppResult<Option<Profile>> {
        let row = sqlx::query_as::<_, (Uuid, String)>(
            "SELECT id, display_name FROM profiles WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, display_name)| Profile { id, display_name }))
    }
}

#[async_trait::async_trait]
impl MatchStore for PgStore {
    async fn record_match(
        &self,
        group_id: Uuid,
        title_id: i64,
        rule: MatchThreshold,
        member_ids: &[Uuid],
    ) -> AppResult<GroupMatch> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO matches (group_id, title_id, rule) VALUES ($1, $2, $3) \
             ON CONFLICT (group_id, title_id) DO NOTHING \
             RETURNING id",
        )
        .bind(group_id)
        .bind(title_id)
        .bind(rule.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(match_id) = inserted {
            sqlx::query(
                "INSERT INTO match_members (match_id, user_id, position) \
                 SELECT $1, voter.user_id, voter.position::INT \
                 FROM UNNEST($2::UUID[]) WITH ORDINALITY AS voter(user_id, position)",
            )
            .bind(match_id)
            .bind(member_ids)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let sql = format!(
            "{MATCH_SELECT} WHERE m.group_id = $1 AND m.title_id = $2 GROUP BY m.id, t.name"
        );
        let row = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(group_id)
            .bind(title_id)
            .fetch_one(&self.pool)
            .await?;

        GroupMatch::try_from(row)
    }

    async fn list_matches(&self, group_id: Uuid) -> AppResult<Vec<GroupMatch>> {
        let sql = format!(
            "{MATCH_SELECT} WHERE m.group_id = $1 GROUP BY m.id, t.name \
             ORDER BY m.created_at DESC, m.id"
        );
        let rows = sqlx::query_as::<_, MatchRow>(&sql)
            .bind(group_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(GroupMatch::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_row(kind: &str) -> TitleRow {
        TitleRow {
            id: 550,
            kind: kind.to_string(),
            name: "Fight Club".to_string(),
            year: Some(1999),
            runtime_min: Some(139),
            poster_url: None,
            trailer_url: None,
            overview: None,
            genres: vec!["Drama".to_string()],
            vibes: Vec::new(),
            popularity: None,
            rating: Some(8.4),
            adult: false,
        }
    }

    #[test]
    fn test_title_row_fills_missing_numbers() {
        let title = Title::try_from(title_row("movie")).unwrap();
        assert_eq!(title.kind, TitleKind::Movie);
        assert_eq!(title.popularity, 0.0);
        assert_eq!(title.overview, "");
        assert_eq!(title.rating, 8.4);
    }

    #[test]
    fn test_title_row_rejects_unknown_kind() {
        let err = Title::try_from(title_row("podcast")).unwrap_err();
        assert!(err.is_data_access());
    }

    #[test]
    fn test_group_row_parses_threshold() {
        let group = Group::try_from(GroupRow {
            id: Uuid::new_v4(),
            name: "Roommates".to_string(),
            match_threshold: "unanimous".to_string(),
        })
        .unwrap();
        assert_eq!(group.match_threshold, MatchThreshold::Unanimous);
    }

    #[test]
    fn test_match_row_parses_rule() {
        let voters = vec![Uuid::new_v4(), Uuid::new_v4()];
        let stored = GroupMatch::try_from(MatchRow {
            id: Uuid::new_v4(),
            group_id: Uuid::new_v4(),
            title_id: 550,
            title_name: Some("Fight Club".to_string()),
            rule: "majority".to_string(),
            created_at: chrono::Utc::now(),
            member_ids: voters.clone(),
        })
        .unwrap();
        assert_eq!(stored.rule, MatchThreshold::Majority);
        assert_eq!(stored.member_ids, voters);
    }

    #[test]
    fn test_swipe_row_parses_decision() {
        let swipe = Swipe::try_from(SwipeRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            group_id: None,
            title_id: 1,
            decision: "no".to_string(),
            created_at: chrono::Utc::now(),
        })
        .unwrap();
        assert_eq!(swipe.decision, Decision::No);
    }
}
