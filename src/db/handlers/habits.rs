//! Database repository for habits.
//!
//! Visibility and ownership rules are pushed down into SQL: list queries
//! carry a [`HabitScope`] predicate, and mutations are constrained to the
//! owner in the `WHERE` clause so a non-owner can never tell a foreign
//! habit apart from a missing one.

use crate::types::{abbrev_uuid, HabitId, UserId};
use crate::db::{
    errors::{DbError, Result},
    models::habits::{HabitCreateDBRequest, HabitDBResponse, HabitUpdateDBRequest},
};
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;

/// Which habits a query is allowed to see.
#[derive(Debug, Clone, Copy)]
pub enum HabitScope {
    /// Only habits owned by the given user.
    Mine(UserId),
    /// Only published habits, regardless of owner.
    Published,
    /// Habits owned by the given user, plus anything published.
    MineOrPublished(UserId),
}

/// Filter for listing habits. Every stored column has an equality filter.
#[derive(Debug, Clone)]
pub struct HabitFilter {
    pub scope: HabitScope,
    pub owner_id: Option<UserId>,
    pub place: Option<String>,
    pub time: Option<NaiveTime>,
    pub action: Option<String>,
    pub is_pleasant: Option<bool>,
    pub related_habit_id: Option<HabitId>,
    pub periodicity_days: Option<i32>,
    pub reward: Option<String>,
    pub duration_seconds: Option<i32>,
    pub is_published: Option<bool>,
    /// Case-insensitive substring match over place, action, and reward.
    pub search: Option<String>,
    pub order_desc: bool,
    pub skip: i64,
    pub limit: i64,
}

impl HabitFilter {
    pub fn new(scope: HabitScope, skip: i64, limit: i64) -> Self {
        Self {
            scope,
            owner_id: None,
            place: None,
            time: None,
            action: None,
            is_pleasant: None,
            related_habit_id: None,
            periodicity_days: None,
            reward: None,
            duration_seconds: None,
            is_published: None,
            search: None,
            order_desc: false,
            skip,
            limit,
        }
    }
}

// Database entity model
#[derive(Debug, Clone, FromRow)]
struct Habit {
    pub id: HabitId,
    pub owner_id: UserId,
    pub place: String,
    pub time: NaiveTime,
    pub action: String,
    pub is_pleasant: bool,
    pub related_habit_id: Option<HabitId>,
    pub periodicity_days: i32,
    pub reward: Option<String>,
    pub duration_seconds: i32,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Habit> for HabitDBResponse {
    fn from(habit: Habit) -> Self {
        Self {
            id: habit.id,
            owner_id: habit.owner_id,
            place: habit.place,
            time: habit.time,
            action: habit.action,
            is_pleasant: habit.is_pleasant,
            related_habit_id: habit.related_habit_id,
            periodicity_days: habit.periodicity_days,
            reward: habit.reward,
            duration_seconds: habit.duration_seconds,
            is_published: habit.is_published,
            created_at: habit.created_at,
            updated_at: habit.updated_at,
        }
    }
}

pub struct Habits<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Habits<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(owner_id = %abbrev_uuid(&request.owner_id)), err)]
    pub async fn create(&mut self, request: &HabitCreateDBRequest) -> Result<HabitDBResponse> {
        let habit_id = Uuid::new_v4();

        let habit = sqlx::query_as::<_, Habit>(
            r#"
            INSERT INTO habits (
                id, owner_id, place, time, action, is_pleasant,
                related_habit_id, periodicity_days, reward, duration_seconds, is_published
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(habit_id)
        .bind(request.owner_id)
        .bind(&request.place)
        .bind(request.time)
        .bind(&request.action)
        .bind(request.is_pleasant)
        .bind(request.related_habit_id)
        .bind(request.periodicity_days)
        .bind(&request.reward)
        .bind(request.duration_seconds)
        .bind(request.is_published)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(HabitDBResponse::from(habit))
    }

    /// Fetch a habit with no visibility restriction.
    ///
    /// Internal lookups only (e.g. checking a related habit before linking);
    /// request handlers must use [`Habits::get_visible`] instead.
    #[instrument(skip(self), fields(habit_id = %abbrev_uuid(&id)), err)]
    pub async fn get_by_id(&mut self, id: HabitId) -> Result<Option<HabitDBResponse>> {
        let habit = sqlx::query_as::<_, Habit>("SELECT * FROM habits WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(habit.map(HabitDBResponse::from))
    }

    /// Fetch a habit the requester is allowed to see: their own, or published.
    #[instrument(skip(self), fields(habit_id = %abbrev_uuid(&id), requester = %abbrev_uuid(&requester)), err)]
    pub async fn get_visible(&mut self, id: HabitId, requester: UserId) -> Result<Option<HabitDBResponse>> {
        let mut query = QueryBuilder::new("SELECT * FROM habits WHERE ");
        push_scope(&mut query, HabitScope::MineOrPublished(requester));
        query.push(" AND id = ");
        query.push_bind(id);

        let habit = query.build_query_as::<Habit>().fetch_optional(&mut *self.db).await?;

        Ok(habit.map(HabitDBResponse::from))
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    pub async fn list(&mut self, filter: &HabitFilter) -> Result<Vec<HabitDBResponse>> {
        let mut query = QueryBuilder::new("SELECT * FROM habits WHERE ");
        push_filter(&mut query, filter);

        query.push(if filter.order_desc { " ORDER BY id DESC" } else { " ORDER BY id ASC" });
        query.push(" LIMIT ");
        query.push_bind(filter.limit);
        query.push(" OFFSET ");
        query.push_bind(filter.skip);

        let habits = query.build_query_as::<Habit>().fetch_all(&mut *self.db).await?;

        Ok(habits.into_iter().map(HabitDBResponse::from).collect())
    }

    /// Number of habits matching the filter, ignoring pagination.
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &HabitFilter) -> Result<i64> {
        let mut query = QueryBuilder::new("SELECT COUNT(*) FROM habits WHERE ");
        push_filter(&mut query, filter);

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;

        Ok(count)
    }

    /// Update a habit, restricted to its owner.
    ///
    /// Returns [`DbError::NotFound`] when the habit does not exist or belongs
    /// to someone else; the two cases are indistinguishable on purpose.
    #[instrument(skip(self, request), fields(habit_id = %abbrev_uuid(&id), owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn update_owned(
        &mut self,
        id: HabitId,
        owner_id: UserId,
        request: &HabitUpdateDBRequest,
    ) -> Result<HabitDBResponse> {
        let mut query = QueryBuilder::new("UPDATE habits SET updated_at = NOW()");

        if let Some(place) = &request.place {
            query.push(", place = ");
            query.push_bind(place.as_str());
        }
        if let Some(time) = request.time {
            query.push(", time = ");
            query.push_bind(time);
        }
        if let Some(action) = &request.action {
            query.push(", action = ");
            query.push_bind(action.as_str());
        }
        if let Some(is_pleasant) = request.is_pleasant {
            query.push(", is_pleasant = ");
            query.push_bind(is_pleasant);
        }
        if let Some(related_habit_id) = request.related_habit_id {
            // Inner None clears the link
            query.push(", related_habit_id = ");
            query.push_bind(related_habit_id);
        }
        if let Some(periodicity_days) = request.periodicity_days {
            query.push(", periodicity_days = ");
            query.push_bind(periodicity_days);
        }
        if let Some(reward) = &request.reward {
            query.push(", reward = ");
            query.push_bind(reward.as_deref());
        }
        if let Some(duration_seconds) = request.duration_seconds {
            query.push(", duration_seconds = ");
            query.push_bind(duration_seconds);
        }
        if let Some(is_published) = request.is_published {
            query.push(", is_published = ");
            query.push_bind(is_published);
        }

        query.push(" WHERE id = ");
        query.push_bind(id);
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);
        query.push(" RETURNING *");

        let habit = query
            .build_query_as::<Habit>()
            .fetch_optional(&mut *self.db)
            .await?
            .ok_or(DbError::NotFound)?;

        Ok(HabitDBResponse::from(habit))
    }

    /// Delete a habit, restricted to its owner. Returns whether a row was removed.
    #[instrument(skip(self), fields(habit_id = %abbrev_uuid(&id), owner_id = %abbrev_uuid(&owner_id)), err)]
    pub async fn delete_owned(&mut self, id: HabitId, owner_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM habits WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Append the visibility predicate for a scope.
fn push_scope(query: &mut QueryBuilder<'_, Postgres>, scope: HabitScope) {
    match scope {
        HabitScope::Mine(owner_id) => {
            query.push("owner_id = ");
            query.push_bind(owner_id);
        }
        HabitScope::Published => {
            query.push("is_published");
        }
        HabitScope::MineOrPublished(owner_id) => {
            query.push("(is_published OR owner_id = ");
            query.push_bind(owner_id);
            query.push(")");
        }
    }
}

/// Escape `%`, `_`, and `\` so user input matches literally under ILIKE.
fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Append the WHERE predicates for a filter (scope plus optional field matches).
fn push_filter<'a>(query: &mut QueryBuilder<'a, Postgres>, filter: &'a HabitFilter) {
    push_scope(query, filter.scope);

    if let Some(owner_id) = filter.owner_id {
        query.push(" AND owner_id = ");
        query.push_bind(owner_id);
    }
    if let Some(place) = &filter.place {
        query.push(" AND place = ");
        query.push_bind(place.as_str());
    }
    if let Some(time) = filter.time {
        query.push(" AND time = ");
        query.push_bind(time);
    }
    if let Some(action) = &filter.action {
        query.push(" AND action = ");
        query.push_bind(action.as_str());
    }
    if let Some(is_pleasant) = filter.is_pleasant {
        query.push(" AND is_pleasant = ");
        query.push_bind(is_pleasant);
    }
    if let Some(related_habit_id) = filter.related_habit_id {
        query.push(" AND related_habit_id = ");
        query.push_bind(related_habit_id);
    }
    if let Some(periodicity_days) = filter.periodicity_days {
        query.push(" AND periodicity_days = ");
        query.push_bind(periodicity_days);
    }
    if let Some(reward) = &filter.reward {
        query.push(" AND reward = ");
        query.push_bind(reward.as_str());
    }
    if let Some(duration_seconds) = filter.duration_seconds {
        query.push(" AND duration_seconds = ");
        query.push_bind(duration_seconds);
    }
    if let Some(is_published) = filter.is_published {
        query.push(" AND is_published = ");
        query.push_bind(is_published);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", escape_like(search));
        query.push(" AND (place ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR action ILIKE ");
        query.push_bind(pattern.clone());
        query.push(" OR reward ILIKE ");
        query.push_bind(pattern);
        query.push(")");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::handlers::{Repository, Users};
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    async fn create_user(conn: &mut PgConnection, username: &str) -> UserId {
        let user = Users::new(conn)
            .create(&UserCreateDBRequest {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "$argon2id$fake-hash-for-tests".to_string(),
                display_name: None,
                telegram_chat_id: None,
            })
            .await
            .unwrap();
        user.id
    }

    fn habit_request(owner_id: UserId, action: &str) -> HabitCreateDBRequest {
        HabitCreateDBRequest {
            owner_id,
            place: "home".to_string(),
            time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            action: action.to_string(),
            is_pleasant: false,
            related_habit_id: None,
            periodicity_days: 1,
            reward: Some("coffee".to_string()),
            duration_seconds: 60,
            is_published: false,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_and_get(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;

        let mut repo = Habits::new(&mut conn);
        let habit = repo.create(&habit_request(owner, "stretch")).await.unwrap();
        assert_eq!(habit.owner_id, owner);
        assert_eq!(habit.action, "stretch");

        let fetched = repo.get_by_id(habit.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, habit.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_visible_hides_private_foreign_habits(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;
        let stranger = create_user(&mut conn, "stranger").await;

        let mut repo = Habits::new(&mut conn);
        let private = repo.create(&habit_request(owner, "journal")).await.unwrap();
        let published = repo
            .create(&HabitCreateDBRequest {
                is_published: true,
                ..habit_request(owner, "run")
            })
            .await
            .unwrap();

        // Owner sees both, stranger only the published one
        assert!(repo.get_visible(private.id, owner).await.unwrap().is_some());
        assert!(repo.get_visible(private.id, stranger).await.unwrap().is_none());
        assert!(repo.get_visible(published.id, stranger).await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_scopes(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let alice = create_user(&mut conn, "alice").await;
        let bob = create_user(&mut conn, "bob").await;

        let mut repo = Habits::new(&mut conn);
        repo.create(&habit_request(alice, "alice private")).await.unwrap();
        repo.create(&HabitCreateDBRequest {
            is_published: true,
            ..habit_request(alice, "alice public")
        })
        .await
        .unwrap();
        repo.create(&habit_request(bob, "bob private")).await.unwrap();

        let mine = repo.list(&HabitFilter::new(HabitScope::Mine(alice), 0, 50)).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|h| h.owner_id == alice));

        let published = repo.list(&HabitFilter::new(HabitScope::Published, 0, 50)).await.unwrap();
        assert_eq!(published.len(), 1);
        assert!(published[0].is_published);

        let visible_to_bob = repo
            .list(&HabitFilter::new(HabitScope::MineOrPublished(bob), 0, 50))
            .await
            .unwrap();
        assert_eq!(visible_to_bob.len(), 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_and_search(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;

        let mut repo = Habits::new(&mut conn);
        repo.create(&HabitCreateDBRequest {
            is_pleasant: true,
            reward: None,
            ..habit_request(owner, "read a novel")
        })
        .await
        .unwrap();
        repo.create(&HabitCreateDBRequest {
            periodicity_days: 3,
            ..habit_request(owner, "water the plants")
        })
        .await
        .unwrap();

        let mut filter = HabitFilter::new(HabitScope::Mine(owner), 0, 50);
        filter.is_pleasant = Some(true);
        let pleasant = repo.list(&filter).await.unwrap();
        assert_eq!(pleasant.len(), 1);
        assert_eq!(pleasant[0].action, "read a novel");

        let mut filter = HabitFilter::new(HabitScope::Mine(owner), 0, 50);
        filter.periodicity_days = Some(3);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);

        let mut filter = HabitFilter::new(HabitScope::Mine(owner), 0, 50);
        filter.search = Some("PLANTS".to_string());
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].action, "water the plants");

        assert_eq!(repo.count(&filter).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_count_ignores_pagination(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;

        let mut repo = Habits::new(&mut conn);
        for i in 0..4 {
            repo.create(&habit_request(owner, &format!("habit {i}"))).await.unwrap();
        }

        let filter = HabitFilter::new(HabitScope::Mine(owner), 0, 2);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 2);
        assert_eq!(repo.count(&filter).await.unwrap(), 4);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_owned(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;
        let stranger = create_user(&mut conn, "stranger").await;

        let mut repo = Habits::new(&mut conn);
        let habit = repo.create(&habit_request(owner, "meditate")).await.unwrap();

        let updated = repo
            .update_owned(
                habit.id,
                owner,
                &HabitUpdateDBRequest {
                    place: Some("office".to_string()),
                    reward: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.place, "office");
        assert_eq!(updated.reward, None);
        // Untouched fields survive
        assert_eq!(updated.action, "meditate");

        // A non-owner gets NotFound, not a permission error
        let err = repo
            .update_owned(habit.id, stranger, &HabitUpdateDBRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::NotFound));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_owned(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;
        let stranger = create_user(&mut conn, "stranger").await;

        let mut repo = Habits::new(&mut conn);
        let habit = repo.create(&habit_request(owner, "floss")).await.unwrap();

        assert!(!repo.delete_owned(habit.id, stranger).await.unwrap());
        assert!(repo.get_by_id(habit.id).await.unwrap().is_some());

        assert!(repo.delete_owned(habit.id, owner).await.unwrap());
        assert!(repo.get_by_id(habit.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_related_habit_link_and_clear(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;

        let mut repo = Habits::new(&mut conn);
        let pleasant = repo
            .create(&HabitCreateDBRequest {
                is_pleasant: true,
                reward: None,
                ..habit_request(owner, "hot bath")
            })
            .await
            .unwrap();
        let useful = repo
            .create(&HabitCreateDBRequest {
                reward: None,
                related_habit_id: Some(pleasant.id),
                ..habit_request(owner, "exercise")
            })
            .await
            .unwrap();
        assert_eq!(useful.related_habit_id, Some(pleasant.id));

        let cleared = repo
            .update_owned(
                useful.id,
                owner,
                &HabitUpdateDBRequest {
                    related_habit_id: Some(None),
                    reward: Some(Some("smoothie".to_string())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(cleared.related_habit_id, None);
        assert_eq!(cleared.reward, Some("smoothie".to_string()));
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), r"100\%");
        assert_eq!(escape_like("a_b"), r"a\_b");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_search_matches_metacharacters_literally(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let owner = create_user(&mut conn, "owner").await;

        let mut repo = Habits::new(&mut conn);
        repo.create(&habit_request(owner, "give 100% effort")).await.unwrap();
        repo.create(&habit_request(owner, "give 1000 thanks")).await.unwrap();

        // An unescaped `%` would match both rows
        let mut filter = HabitFilter::new(HabitScope::Mine(owner), 0, 50);
        filter.search = Some("100%".to_string());
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].action, "give 100% effort");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_filters_on_remaining_columns(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let alice = create_user(&mut conn, "alice").await;
        let bob = create_user(&mut conn, "bob").await;

        let mut repo = Habits::new(&mut conn);
        let target = repo
            .create(&HabitCreateDBRequest {
                is_pleasant: true,
                reward: None,
                is_published: true,
                ..habit_request(alice, "nap")
            })
            .await
            .unwrap();
        repo.create(&HabitCreateDBRequest {
            time: NaiveTime::from_hms_opt(21, 0, 0).unwrap(),
            reward: Some("tea".to_string()),
            related_habit_id: Some(target.id),
            is_published: true,
            ..habit_request(alice, "tidy desk")
        })
        .await
        .unwrap();
        repo.create(&HabitCreateDBRequest {
            is_published: true,
            ..habit_request(bob, "tidy desk")
        })
        .await
        .unwrap();

        let mut filter = HabitFilter::new(HabitScope::Published, 0, 50);
        filter.reward = Some("tea".to_string());
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].action, "tidy desk");

        let mut filter = HabitFilter::new(HabitScope::Published, 0, 50);
        filter.time = Some(NaiveTime::from_hms_opt(21, 0, 0).unwrap());
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);

        let mut filter = HabitFilter::new(HabitScope::Published, 0, 50);
        filter.related_habit_id = Some(target.id);
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].related_habit_id, Some(target.id));

        let mut filter = HabitFilter::new(HabitScope::Published, 0, 50);
        filter.owner_id = Some(bob);
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].owner_id, bob);
    }
}
