//! JWT creation and verification.
//!
//! Two token kinds share one claims layout: short-lived access tokens gate
//! every protected route, longer-lived refresh tokens are only accepted by
//! the refresh endpoint. The kind is baked into the claims so one can never
//! stand in for the other.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    api::models::{tokens::TokenPairResponse, users::CurrentUser},
    config::Config,
    errors::Error,
    types::UserId,
};

/// Which role a token plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: UserId,      // Subject (user ID)
    pub username: String, // Username
    pub email: String,    // User email
    pub kind: TokenKind,  // Access or refresh
    pub exp: i64,         // Expiration time
    pub iat: i64,         // Issued at
}

impl TokenClaims {
    /// Create new claims for a user, with the lifetime configured for the kind
    pub fn new(user: &CurrentUser, kind: TokenKind, config: &Config) -> Self {
        let now = Utc::now();
        let ttl = match kind {
            TokenKind::Access => config.auth.access_token_ttl,
            TokenKind::Refresh => config.auth.refresh_token_ttl,
        };
        let exp = now + ttl;

        Self {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            kind,
            exp: exp.timestamp(),
            iat: now.timestamp(),
        }
    }
}

impl From<TokenClaims> for CurrentUser {
    fn from(claims: TokenClaims) -> Self {
        Self {
            id: claims.sub,
            username: claims.username,
            email: claims.email,
            display_name: None, // Not stored in JWT
        }
    }
}

fn secret_key(config: &Config) -> Result<&str, Error> {
    config.secret_key.as_deref().ok_or_else(|| Error::Internal {
        operation: "JWT: secret_key is required".to_string(),
    })
}

/// Create a JWT of the given kind for a user
pub fn create_token(user: &CurrentUser, kind: TokenKind, config: &Config) -> Result<String, Error> {
    let claims = TokenClaims::new(user, kind, config);
    let key = EncodingKey::from_secret(secret_key(config)?.as_bytes());

    encode(&Header::default(), &claims, &key).map_err(|e| Error::Internal {
        operation: format!("create JWT: {e}"),
    })
}

/// Create the access/refresh pair issued on login
pub fn create_token_pair(user: &CurrentUser, config: &Config) -> Result<TokenPairResponse, Error> {
    Ok(TokenPairResponse {
        access: create_token(user, TokenKind::Access, config)?,
        refresh: create_token(user, TokenKind::Refresh, config)?,
    })
}

/// Verify and decode a JWT, requiring it to be of the expected kind
pub fn verify_token(token: &str, expected_kind: TokenKind, config: &Config) -> Result<CurrentUser, Error> {
    let key = DecodingKey::from_secret(secret_key(config)?.as_bytes());
    let validation = Validation::default();

    let token_data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        // Client errors (401) - malformed tokens, invalid claims, expired tokens
        jsonwebtoken::errors::ErrorKind::InvalidToken
        | jsonwebtoken::errors::ErrorKind::InvalidSignature
        | jsonwebtoken::errors::ErrorKind::ExpiredSignature
        | jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(_)
        | jsonwebtoken::errors::ErrorKind::InvalidIssuer
        | jsonwebtoken::errors::ErrorKind::InvalidAudience
        | jsonwebtoken::errors::ErrorKind::InvalidSubject
        | jsonwebtoken::errors::ErrorKind::ImmatureSignature
        | jsonwebtoken::errors::ErrorKind::Base64(_)
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithm => Error::Unauthenticated { message: None },

        // Server errors (500) - key issues, internal failures
        jsonwebtoken::errors::ErrorKind::InvalidEcdsaKey
        | jsonwebtoken::errors::ErrorKind::InvalidRsaKey(_)
        | jsonwebtoken::errors::ErrorKind::RsaFailedSigning
        | jsonwebtoken::errors::ErrorKind::InvalidAlgorithmName
        | jsonwebtoken::errors::ErrorKind::InvalidKeyFormat
        | jsonwebtoken::errors::ErrorKind::MissingAlgorithm
        | jsonwebtoken::errors::ErrorKind::Json(_)
        | jsonwebtoken::errors::ErrorKind::Utf8(_)
        | jsonwebtoken::errors::ErrorKind::Crypto(_) => Error::Internal {
            operation: format!("JWT verification: {e}"),
        },

        // Catch-all for any future error variants (default to server error for safety)
        _ => Error::Internal {
            operation: format!("JWT verification (unknown error): {e}"),
        },
    })?;

    if token_data.claims.kind != expected_kind {
        return Err(Error::Unauthenticated {
            message: Some(format!("not an {} token", expected_kind.as_str())),
        });
    }

    Ok(CurrentUser::from(token_data.claims))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AuthConfig;
    use std::time::Duration;
    use uuid::Uuid;

    fn create_test_config() -> Config {
        Config {
            secret_key: Some("test-secret-key-for-jwt".to_string()),
            auth: AuthConfig {
                access_token_ttl: Duration::from_secs(1800),
                refresh_token_ttl: Duration::from_secs(86400),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn create_test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            email: "test@example.com".to_string(),
            display_name: Some("Test User".to_string()),
        }
    }

    #[test]
    fn test_create_and_verify_access_token() {
        let config = create_test_config();
        let user = create_test_user();

        let token = create_token(&user, TokenKind::Access, &config).unwrap();
        assert!(!token.is_empty());

        let verified_user = verify_token(&token, TokenKind::Access, &config).unwrap();
        assert_eq!(verified_user.id, user.id);
        assert_eq!(verified_user.username, user.username);
        assert_eq!(verified_user.email, user.email);
    }

    #[test]
    fn test_token_pair_kinds() {
        let config = create_test_config();
        let user = create_test_user();

        let pair = create_token_pair(&user, &config).unwrap();

        // Each token only verifies as its own kind
        assert!(verify_token(&pair.access, TokenKind::Access, &config).is_ok());
        assert!(verify_token(&pair.refresh, TokenKind::Refresh, &config).is_ok());

        let err = verify_token(&pair.refresh, TokenKind::Access, &config).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
        let err = verify_token(&pair.access, TokenKind::Refresh, &config).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_invalid_token() {
        let config = create_test_config();

        let result = verify_token("invalid.token.here", TokenKind::Access, &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_token_wrong_secret() {
        let mut config = create_test_config();
        let user = create_test_user();

        let token = create_token(&user, TokenKind::Access, &config).unwrap();

        config.secret_key = Some("different-secret".to_string());
        let result = verify_token(&token, TokenKind::Access, &config);
        assert!(result.is_err());
        // Should be Unauthenticated (InvalidSignature), not Internal error
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_expired_token() {
        let config = create_test_config();
        let user = create_test_user();

        // Manually create an expired token by setting exp in the past
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            kind: TokenKind::Access,
            exp: (now - chrono::Duration::seconds(3600)).timestamp(), // 1 hour ago
            iat: now.timestamp(),
        };

        let secret_key = config.secret_key.as_ref().unwrap();
        let key = EncodingKey::from_secret(secret_key.as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        let result = verify_token(&token, TokenKind::Access, &config);
        assert!(result.is_err());
        // Should be Unauthenticated (ExpiredSignature), not Internal error
        assert!(matches!(result.unwrap_err(), Error::Unauthenticated { .. }));
    }

    #[test]
    fn test_verify_malformed_token() {
        let config = create_test_config();

        let malformed_tokens = vec!["not.a.token", "invalid", "", "too.many.parts.in.this.token"];

        for token in malformed_tokens {
            let result = verify_token(token, TokenKind::Access, &config);
            assert!(result.is_err());
            // Should be Unauthenticated (InvalidToken/Base64), not Internal error
            assert!(
                matches!(result.unwrap_err(), Error::Unauthenticated { .. }),
                "Expected Unauthenticated error for token: {}",
                token
            );
        }
    }
}
