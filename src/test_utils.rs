//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    api::models::users::CurrentUser,
    auth::{
        password,
        token::{self, TokenKind},
    },
    config::Config,
    db::{handlers::Users, models::users::UserCreateDBRequest},
    db::{handlers::Repository, models::users::UserDBResponse},
};
use axum_test::TestServer;
use sqlx::PgPool;

/// Password every [`create_test_user`] account is created with.
pub const TEST_PASSWORD: &str = "correct-horse-battery-staple";

pub fn create_test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        ..Default::default()
    }
}

/// Build a test server backed by an existing pool; migrations are applied by
/// the `#[sqlx::test]` harness before the pool is handed over.
pub async fn create_test_app(pool: PgPool) -> TestServer {
    let config = create_test_config();

    let app = crate::Application::new_with_pool(config, Some(pool))
        .await
        .expect("Failed to create application");

    app.into_test_server()
}

/// Insert a user with [`TEST_PASSWORD`] and an email derived from the username.
pub async fn create_test_user(pool: &PgPool, username: &str) -> UserDBResponse {
    let password_hash = password::hash_password(TEST_PASSWORD).expect("Failed to hash test password");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    let mut users = Users::new(&mut conn);

    users
        .create(&UserCreateDBRequest {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash,
            display_name: None,
            telegram_chat_id: None,
        })
        .await
        .expect("Failed to create test user")
}

/// Mint a valid access token for a user, signed with the test secret.
pub fn access_token(user: &UserDBResponse) -> String {
    let config = create_test_config();
    let current_user = CurrentUser::from(user.clone());
    token::create_token(&current_user, TokenKind::Access, &config).expect("Failed to create access token")
}
