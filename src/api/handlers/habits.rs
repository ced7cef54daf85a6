//! Habit endpoints.
//!
//! Every route requires an access token. Ownership is never taken from the
//! request body: creates are stamped with the authenticated user, and writes
//! are scoped to the owner in SQL so a non-owner sees 404 rather than 403.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::models::{
        habits::{HabitCreate, HabitResponse, HabitUpdate, ListHabitsQuery},
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        errors::DbError,
        handlers::{HabitFilter, HabitScope, Habits},
    },
    errors::{Error, FieldError},
    types::{HabitId, UserId},
    AppState,
};

/// Translate the `ordering` query parameter into a sort direction.
fn parse_ordering(ordering: Option<&str>) -> Result<bool, Error> {
    match ordering {
        None | Some("id") => Ok(false),
        Some("-id") => Ok(true),
        Some(other) => Err(Error::BadRequest {
            message: format!("Unknown ordering '{other}'; expected 'id' or '-id'"),
        }),
    }
}

fn build_filter(scope: HabitScope, query: ListHabitsQuery) -> Result<HabitFilter, Error> {
    let (skip, limit) = query.pagination.params();
    let mut filter = HabitFilter::new(scope, skip, limit);
    filter.owner_id = query.owner_id;
    filter.place = query.place;
    filter.time = query.time;
    filter.action = query.action;
    filter.is_pleasant = query.is_pleasant_habit;
    filter.related_habit_id = query.related_habit_id;
    filter.periodicity_days = query.periodicity_days;
    filter.reward = query.reward;
    filter.duration_seconds = query.duration_seconds;
    filter.is_published = query.is_published;
    filter.search = query.search;
    filter.order_desc = parse_ordering(query.ordering.as_deref())?;
    Ok(filter)
}

/// The target of a `related_habit_id` link must be visible to the requester
/// (their own, or published) and must itself be a pleasant habit.
async fn check_related_habit(habits: &mut Habits<'_>, related_id: HabitId, requester: UserId) -> Result<(), Error> {
    match habits.get_visible(related_id, requester).await? {
        None => Err(Error::Validation {
            errors: vec![FieldError::new("related_habit_id", "related habit does not exist or is not visible")],
        }),
        Some(related) if !related.is_pleasant => Err(Error::Validation {
            errors: vec![FieldError::new("related_habit_id", "related habit must be a pleasant habit")],
        }),
        Some(_) => Ok(()),
    }
}

fn habit_not_found(id: HabitId) -> Error {
    Error::NotFound {
        resource: "habit".to_string(),
        id: id.to_string(),
    }
}

/// Create a habit owned by the authenticated user
#[utoipa::path(
    post,
    path = "/habits/",
    request_body = HabitCreate,
    tag = "habits",
    responses(
        (status = 201, description = "Habit created", body = HabitResponse),
        (status = 400, description = "Payload rejected by validation"),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_habit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(request): Json<HabitCreate>,
) -> Result<(StatusCode, Json<HabitResponse>), Error> {
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut habits = Habits::new(&mut conn);

    if let Some(related_id) = request.related_habit_id {
        check_related_habit(&mut habits, related_id, current_user.id).await?;
    }

    let created = habits.create(&request.into_db_request(current_user.id)).await?;
    Ok((StatusCode::CREATED, Json(HabitResponse::from(created))))
}

/// List the authenticated user's habits
#[utoipa::path(
    get,
    path = "/habits/",
    params(ListHabitsQuery),
    tag = "habits",
    responses(
        (status = 200, description = "Paginated list of the user's habits", body = PaginatedResponse<HabitResponse>),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_my_habits(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ListHabitsQuery>,
) -> Result<Json<PaginatedResponse<HabitResponse>>, Error> {
    let filter = build_filter(HabitScope::Mine(current_user.id), query)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut habits = Habits::new(&mut conn);

    let data = habits.list(&filter).await?;
    let total_count = habits.count(&filter).await?;

    let data = data.into_iter().map(HabitResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, filter.skip, filter.limit)))
}

/// List published habits from all users
#[utoipa::path(
    get,
    path = "/habits/public/",
    params(ListHabitsQuery),
    tag = "habits",
    responses(
        (status = 200, description = "Paginated list of published habits", body = PaginatedResponse<HabitResponse>),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_public_habits(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListHabitsQuery>,
) -> Result<Json<PaginatedResponse<HabitResponse>>, Error> {
    let filter = build_filter(HabitScope::Published, query)?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut habits = Habits::new(&mut conn);

    let data = habits.list(&filter).await?;
    let total_count = habits.count(&filter).await?;

    let data = data.into_iter().map(HabitResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, filter.skip, filter.limit)))
}

/// Get a habit by ID
#[utoipa::path(
    get,
    path = "/habits/{id}/",
    params(("id" = String, Path, description = "Habit ID")),
    tag = "habits",
    responses(
        (status = 200, description = "Habit details", body = HabitResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Habit not found or not visible"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_habit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<HabitId>,
) -> Result<Json<HabitResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut habits = Habits::new(&mut conn);

    let habit = habits
        .get_visible(id, current_user.id)
        .await?
        .ok_or_else(|| habit_not_found(id))?;

    Ok(Json(HabitResponse::from(habit)))
}

/// Update a habit owned by the authenticated user
#[utoipa::path(
    put,
    path = "/habits/{id}/",
    params(("id" = String, Path, description = "Habit ID")),
    request_body = HabitUpdate,
    tag = "habits",
    responses(
        (status = 200, description = "Updated habit", body = HabitResponse),
        (status = 400, description = "Payload rejected by validation"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Habit not found or not owned by the user"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_habit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<HabitId>,
    Json(request): Json<HabitUpdate>,
) -> Result<Json<HabitResponse>, Error> {
    let errors = request.validate();
    if !errors.is_empty() {
        return Err(Error::Validation { errors });
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut habits = Habits::new(&mut conn);

    if let Some(Some(related_id)) = request.related_habit_id {
        check_related_habit(&mut habits, related_id, current_user.id).await?;
    }

    let updated = habits
        .update_owned(id, current_user.id, &request.into_db_request())
        .await
        .map_err(|e| match e {
            DbError::NotFound => habit_not_found(id),
            other => Error::Database(other),
        })?;

    Ok(Json(HabitResponse::from(updated)))
}

/// Delete a habit owned by the authenticated user
#[utoipa::path(
    delete,
    path = "/habits/{id}/",
    params(("id" = String, Path, description = "Habit ID")),
    tag = "habits",
    responses(
        (status = 204, description = "Habit deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Habit not found or not owned by the user"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_habit(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(id): Path<HabitId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut habits = Habits::new(&mut conn);

    if !habits.delete_owned(id, current_user.id).await? {
        return Err(habit_not_found(id));
    }

    Ok(StatusCode::NO_CONTENT)
}
