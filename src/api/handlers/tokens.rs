//! Token issuance endpoints: login and refresh.

use axum::{extract::State, Json};

use crate::{
    api::models::tokens::{TokenObtainRequest, TokenPairResponse, TokenRefreshRequest, TokenRefreshResponse},
    auth::{
        password,
        token::{self, TokenKind},
    },
    db::handlers::Users,
    errors::Error,
    AppState,
};

/// One message for both unknown-username and wrong-password, so the endpoint
/// cannot be used to probe which usernames exist.
fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid username or password".to_string()),
    }
}

/// Exchange username/password credentials for an access/refresh token pair
#[utoipa::path(
    post,
    path = "/users/token/",
    request_body = TokenObtainRequest,
    tag = "tokens",
    responses(
        (status = 200, description = "Token pair issued", body = TokenPairResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn obtain_token_pair(
    State(state): State<AppState>,
    Json(request): Json<TokenObtainRequest>,
) -> Result<Json<TokenPairResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut users = Users::new(&mut conn);

    let user = match users.get_by_username(&request.username).await? {
        Some(user) => user,
        None => {
            // Unknown usernames burn the same verification cost as known
            // ones, keeping response timing uniform across the two cases
            let password = request.password;
            let _ = tokio::task::spawn_blocking(move || password::verify_password(&password, password::decoy_hash()))
                .await;
            return Err(invalid_credentials());
        }
    };

    // Verify on a blocking thread to avoid stalling the async runtime
    let password = request.password;
    let password_hash = user.password_hash.clone();
    let valid = tokio::task::spawn_blocking(move || password::verify_password(&password, &password_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !valid {
        return Err(invalid_credentials());
    }

    let pair = token::create_token_pair(&user.into(), &state.config)?;
    Ok(Json(pair))
}

/// Exchange a refresh token for a fresh access token
#[utoipa::path(
    post,
    path = "/users/token/refresh/",
    request_body = TokenRefreshRequest,
    tag = "tokens",
    responses(
        (status = 200, description = "New access token issued", body = TokenRefreshResponse),
        (status = 401, description = "Invalid or expired refresh token"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(request): Json<TokenRefreshRequest>,
) -> Result<Json<TokenRefreshResponse>, Error> {
    // An access token presented here is rejected by the kind check
    let user = token::verify_token(&request.refresh, TokenKind::Refresh, &state.config)?;

    let access = token::create_token(&user, TokenKind::Access, &state.config)?;
    Ok(Json(TokenRefreshResponse { access }))
}
