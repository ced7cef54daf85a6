//! Extractor for the authenticated user.

use crate::{
    api::models::users::CurrentUser,
    auth::token::{self, TokenKind},
    errors::{Error, Result},
    AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::{instrument, trace};

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    /// Authenticate from an `Authorization: Bearer <access-token>` header.
    ///
    /// A missing header, a non-Bearer scheme, and an invalid or expired token
    /// are all rejected with 401; the response does not say which it was.
    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let auth_header = match parts.headers.get(axum::http::header::AUTHORIZATION) {
            Some(header) => header,
            None => {
                trace!("No authentication credentials found in request");
                return Err(Error::Unauthenticated { message: None });
            }
        };

        let auth_str = auth_header.to_str().map_err(|_| {
            trace!("Authorization header is not valid UTF-8");
            Error::Unauthenticated { message: None }
        })?;

        let bearer = auth_str.strip_prefix("Bearer ").ok_or(Error::Unauthenticated { message: None })?;

        token::verify_token(bearer, TokenKind::Access, &state.config)
    }
}
