//! API request/response models for token issuance.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Credentials exchanged for a token pair.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenObtainRequest {
    pub username: String,
    pub password: String,
}

/// Access/refresh token pair returned on successful login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

/// Refresh token exchanged for a fresh access token.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenRefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenRefreshResponse {
    pub access: String,
}
