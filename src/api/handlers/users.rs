//! User account endpoints.
//!
//! Registration is the only unauthenticated write in the API; every other
//! user operation requires a valid access token.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::models::{
        pagination::PaginatedResponse,
        users::{CurrentUser, ListUsersQuery, UserCreate, UserResponse, UserUpdate},
    },
    auth::password::{self, Argon2Params},
    config::Config,
    db::{
        errors::DbError,
        handlers::{Repository, UserFilter, Users},
        models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    },
    errors::Error,
    types::UserId,
    AppState,
};

fn check_password_policy(config: &Config, password: &str) -> Result<(), Error> {
    let rules = &config.auth.password;
    if password.len() < rules.min_length {
        return Err(Error::BadRequest {
            message: format!("Password must be at least {} characters", rules.min_length),
        });
    }
    if password.len() > rules.max_length {
        return Err(Error::BadRequest {
            message: format!("Password must be no more than {} characters", rules.max_length),
        });
    }
    Ok(())
}

/// Hash on a blocking thread with the configured Argon2 cost.
async fn hash_password(config: &Config, password: String) -> Result<String, Error> {
    let params = Argon2Params {
        memory_kib: config.auth.password.argon2_memory_kib,
        iterations: config.auth.password.argon2_iterations,
        parallelism: config.auth.password.argon2_parallelism,
    };
    tokio::task::spawn_blocking(move || password::hash_password_with_params(&password, Some(params)))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/users/create/",
    request_body = UserCreate,
    tag = "users",
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 400, description = "Password rejected by policy"),
        (status = 409, description = "Username or email already taken"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<UserCreate>,
) -> Result<(StatusCode, Json<UserResponse>), Error> {
    check_password_policy(&state.config, &request.password)?;

    let password_hash = hash_password(&state.config, request.password).await?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    // Uniqueness is enforced by the database; a duplicate surfaces as 409
    let created = users
        .create(&UserCreateDBRequest {
            username: request.username,
            email: request.email,
            password_hash,
            display_name: request.display_name,
            telegram_chat_id: request.telegram_chat_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(created))))
}

/// List user accounts
#[utoipa::path(
    get,
    path = "/users/",
    params(ListUsersQuery),
    tag = "users",
    responses(
        (status = 200, description = "Paginated list of users", body = PaginatedResponse<UserResponse>),
        (status = 401, description = "Not authenticated"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_users(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, Error> {
    let (skip, limit) = query.pagination.params();

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let data = users.list(&UserFilter::new(skip, limit)).await?;
    let total_count = users.count().await?;

    let data = data.into_iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

/// Get a user account by ID
#[utoipa::path(
    get,
    path = "/users/{id}/",
    params(("id" = String, Path, description = "User ID")),
    tag = "users",
    responses(
        (status = 200, description = "User details", body = UserResponse),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_user(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<Json<UserResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let user = users.get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "user".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(UserResponse::from(user)))
}

/// Update a user account
#[utoipa::path(
    put,
    path = "/users/update/{id}/",
    params(("id" = String, Path, description = "User ID")),
    request_body = UserUpdate,
    tag = "users",
    responses(
        (status = 200, description = "Updated user", body = UserResponse),
        (status = 400, description = "Password rejected by policy"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn update_user(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<UserId>,
    Json(request): Json<UserUpdate>,
) -> Result<Json<UserResponse>, Error> {
    let password_hash = match request.password {
        Some(password) => {
            check_password_policy(&state.config, &password)?;
            Some(hash_password(&state.config, password).await?)
        }
        None => None,
    };

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let updated = users
        .update(
            id,
            &UserUpdateDBRequest {
                email: request.email,
                display_name: request.display_name,
                telegram_chat_id: request.telegram_chat_id,
                password_hash,
            },
        )
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "user".to_string(),
                id: id.to_string(),
            },
            other => Error::Database(other),
        })?;

    Ok(Json(UserResponse::from(updated)))
}

/// Delete a user account
#[utoipa::path(
    delete,
    path = "/users/delete/{id}/",
    params(("id" = String, Path, description = "User ID")),
    tag = "users",
    responses(
        (status = 204, description = "User deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn delete_user(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<UserId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    if !users.delete(id).await? {
        return Err(Error::NotFound {
            resource: "user".to_string(),
            id: id.to_string(),
        });
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::test_utils::*;
    use axum::http::StatusCode;
    use serde_json::json;
    use sqlx::PgPool;

    #[sqlx::test]
    #[test_log::test]
    async fn test_registration(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server
            .post("/users/create/")
            .json(&json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "long-enough-password",
                "display_name": "Alice",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: serde_json::Value = response.json();
        assert_eq!(body["username"], "alice");
        assert_eq!(body["display_name"], "Alice");
        assert!(body.get("password").is_none());
        assert!(body.get("password_hash").is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_registration_rejects_short_password(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server
            .post("/users/create/")
            .json(&json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "short",
            }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_username_conflicts(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        create_test_user(&pool, "alice").await;

        let response = server
            .post("/users/create/")
            .json(&json!({
                "username": "alice",
                "email": "other@example.com",
                "password": "long-enough-password",
            }))
            .await;

        response.assert_status(StatusCode::CONFLICT);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_requires_auth(pool: PgPool) {
        let server = create_test_app(pool).await;

        let response = server.get("/users/").await;

        response.assert_status(StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_and_get(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, "alice").await;
        create_test_user(&pool, "bob").await;
        let token = access_token(&alice);

        let response = server.get("/users/").authorization_bearer(&token).await;
        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["total_count"], 2);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let response = server.get(&format!("/users/{}/", alice.id)).authorization_bearer(&token).await;
        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["username"], "alice");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_get_unknown_user_is_404(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, "alice").await;
        let token = access_token(&alice);

        let response = server
            .get(&format!("/users/{}/", uuid::Uuid::new_v4()))
            .authorization_bearer(&token)
            .await;

        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_profile(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, "alice").await;
        let token = access_token(&alice);

        let response = server
            .patch(&format!("/users/update/{}/", alice.id))
            .authorization_bearer(&token)
            .json(&json!({"display_name": "Alice A."}))
            .await;

        response.assert_status(StatusCode::OK);
        let body: serde_json::Value = response.json();
        assert_eq!(body["display_name"], "Alice A.");
        // Untouched fields survive the partial update
        assert_eq!(body["email"], alice.email);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_password_change_takes_effect(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, "alice").await;
        let token = access_token(&alice);

        let response = server
            .patch(&format!("/users/update/{}/", alice.id))
            .authorization_bearer(&token)
            .json(&json!({"password": "brand-new-password"}))
            .await;
        response.assert_status(StatusCode::OK);

        let old_login = server
            .post("/users/token/")
            .json(&json!({"username": "alice", "password": TEST_PASSWORD}))
            .await;
        old_login.assert_status(StatusCode::UNAUTHORIZED);

        let new_login = server
            .post("/users/token/")
            .json(&json!({"username": "alice", "password": "brand-new-password"}))
            .await;
        new_login.assert_status(StatusCode::OK);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_user(pool: PgPool) {
        let server = create_test_app(pool.clone()).await;
        let alice = create_test_user(&pool, "alice").await;
        let bob = create_test_user(&pool, "bob").await;
        let token = access_token(&alice);

        let response = server
            .delete(&format!("/users/delete/{}/", bob.id))
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::NO_CONTENT);

        let response = server
            .delete(&format!("/users/delete/{}/", bob.id))
            .authorization_bearer(&token)
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }
}
