//! OpenAPI documentation for the habit-tracking API.
//!
//! The generated spec is served interactively at `/docs`.

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::api;

/// Security scheme for the API (Bearer access token).
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "BearerAuth".to_string(),
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "JWT access token authentication. Obtain a token pair from \
                             `POST /users/token/` and include the access token in the \
                             `Authorization` header:\n\n```\nAuthorization: Bearer YOUR_ACCESS_TOKEN\n```",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "habitctl API",
        description = "Habit tracking service with JWT authentication, owner-scoped habit \
                       records, and an opt-in public catalogue of published habits."
    ),
    paths(
        api::handlers::users::create_user,
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
        api::handlers::tokens::obtain_token_pair,
        api::handlers::tokens::refresh_token,
        api::handlers::habits::create_habit,
        api::handlers::habits::list_my_habits,
        api::handlers::habits::list_public_habits,
        api::handlers::habits::get_habit,
        api::handlers::habits::update_habit,
        api::handlers::habits::delete_habit,
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "users", description = "Account registration and user management"),
        (name = "tokens", description = "Credential login and token refresh"),
        (name = "habits", description = "Habit records with owner/public visibility"),
    )
)]
pub struct ApiDoc;
