//! Authentication for the HTTP API.
//!
//! All protected routes authenticate with a JWT access token passed in an
//! `Authorization: Bearer <token>` header. Tokens are issued as an
//! access/refresh pair by `POST /users/token/` against username/password
//! credentials, and refreshed via `POST /users/token/refresh/`.
//!
//! # Modules
//!
//! - [`current_user`]: Extractor for getting the authenticated user in handlers
//! - [`password`]: Password hashing and verification using Argon2
//! - [`token`]: JWT creation and verification for both token kinds
//!
//! # Usage in Handlers
//!
//! ```ignore
//! use habitctl::api::models::users::CurrentUser;
//!
//! async fn protected_handler(user: CurrentUser) -> String {
//!     format!("Hello, {}!", user.username)
//! }
//! ```

pub mod current_user;
pub mod password;
pub mod token;
